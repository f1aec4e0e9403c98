use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notification, NotificationChannel, NotificationError};
use crate::alerts::Severity;
use crate::config::EmailConfig;

/// HTML e-mail over SMTP with STARTTLS.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

impl core::fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmailChannel")
            .field("sender", &self.sender.to_string())
            .field("recipient", &self.recipient.to_string())
            .finish()
    }
}

impl EmailChannel {
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let sender = parse_mailbox(&config.sender)?;
        let recipient = parse_mailbox(&config.recipient)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        Ok(Self {
            transport,
            sender,
            recipient,
        })
    }

    fn build_message(&self, n: &Notification) -> Result<Message, NotificationError> {
        Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(render_subject(n))
            .header(ContentType::TEXT_HTML)
            .body(render_html(n))
            .map_err(|e| NotificationError::InvalidMessage(e.to_string()))
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, NotificationError> {
    raw.parse()
        .map_err(|e| NotificationError::InvalidMessage(format!("invalid address {raw:?}: {e}")))
}

fn accent(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#FF3B30",
        Severity::Warning => "#FF9500",
        Severity::Info => "#007AFF",
    }
}

/// Minimal escaping for text interpolated into the HTML body.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn render_subject(n: &Notification) -> String {
    format!(
        "{} SmartStock AI - {} Alert: {}",
        n.marker(),
        n.severity_label(),
        n.product_name
    )
}

pub(crate) fn render_html(n: &Notification) -> String {
    let color = accent(n.severity);
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; padding: 20px; background-color: #f5f5f5;">
    <div style="max-width: 600px; margin: 0 auto; background-color: white; border-radius: 10px; padding: 30px;">
      <h1 style="color: {color};">{marker} SmartStock AI Alert</h1>
      <hr style="border: none; border-top: 2px solid #eee; margin: 20px 0;">
      <h2 style="color: #333;">Product: {product}</h2>
      <p style="font-size: 16px; color: #666;">
        <strong>Status:</strong> <span style="color: {color}; font-weight: bold;">{severity}</span>
      </p>
      <div style="background-color: #f9f9f9; padding: 15px; border-radius: 5px; margin: 20px 0;">
        <p style="margin: 0; font-size: 15px; color: #333;">{message}</p>
      </div>
      <p style="color: #999; font-size: 13px; margin-top: 30px;">
        This is an automated alert from SmartStock AI Inventory Management System.<br>
        Timestamp: {timestamp}
      </p>
    </div>
  </body>
</html>"#,
        marker = n.marker(),
        product = escape(&n.product_name),
        severity = n.severity_label(),
        message = escape(&n.message),
        timestamp = n.raised_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

#[async_trait::async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let message = self.build_message(notification)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
