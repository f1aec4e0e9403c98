//! Alert notifications.
//!
//! Delivery is fire-and-forget relative to alert creation: the dispatcher attempts
//! every enabled channel independently, bounds each attempt with a timeout, logs
//! the outcome and never reports failure to the caller.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::alerts::{Alert, Severity};

mod dispatcher;
mod email;
mod whatsapp;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use email::EmailChannel;
pub use whatsapp::WhatsAppChannel;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// What gets delivered for one new alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub product_name: String,
    pub message: String,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(product_name: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            product_name: product_name.into(),
            message: message.into(),
            severity,
            raised_at: Utc::now(),
        }
    }

    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            product_name: alert.product_name.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            raised_at: alert.created_at,
        }
    }

    /// Leading marker used in message titles.
    pub fn marker(&self) -> &'static str {
        match self.severity {
            Severity::Critical => "🚨",
            Severity::Warning => "⚠️",
            Severity::Info => "ℹ️",
        }
    }

    pub fn severity_label(&self) -> String {
        self.severity.as_str().to_ascii_uppercase()
    }
}

/// A delivery mechanism. Only constructed when its credentials are complete.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}
