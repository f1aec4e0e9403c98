use reqwest::Client;
use serde::Deserialize;

use super::{Notification, NotificationChannel, NotificationError};
use crate::config::WhatsAppConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// WhatsApp delivery through Twilio's Messages API.
#[derive(Debug, Clone)]
pub struct WhatsAppChannel {
    client: Client,
    config: WhatsAppConfig,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: Option<String>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point the channel at a different API host (e.g. a local stub).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

pub(crate) fn render_body(n: &Notification) -> String {
    format!(
        "{} *SmartStock AI Alert*\n\n*Product:* {}\n*Status:* {}\n\n{}\n\n_Automated alert from SmartStock AI_",
        n.marker(),
        n.product_name,
        n.severity_label(),
        n.message
    )
}

#[async_trait::async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let body = render_body(notification);
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("From", self.config.from.as_str()),
                ("To", self.config.to.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: MessageCreated = response.json().await?;
        tracing::debug!(channel = "whatsapp", sid = created.sid.as_deref().unwrap_or("-"), "twilio accepted message");
        Ok(())
    }
}
