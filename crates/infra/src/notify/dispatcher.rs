use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::{EmailChannel, Notification, NotificationChannel, WhatsAppChannel};
use crate::config::{ChannelConfig, NotifyConfig};

/// Per-channel outcome of one [`NotificationDispatcher::notify`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<&'static str>,
    pub timed_out: Vec<&'static str>,
}

/// Fans a notification out to every enabled channel.
///
/// The channel set is fixed at construction.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    timeout: Duration,
}

impl core::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("channels", &self.channel_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            channels: Vec::new(),
            timeout,
        }
    }

    pub fn with_channel(mut self, channel: impl NotificationChannel + 'static) -> Self {
        self.channels.push(Arc::new(channel));
        self
    }

    /// Enable each channel whose credential bundle is complete; log the rest.
    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut dispatcher = Self::new(config.timeout);

        match &config.whatsapp {
            ChannelConfig::Enabled(cfg) => {
                info!(channel = "whatsapp", "notification channel enabled");
                dispatcher = dispatcher.with_channel(WhatsAppChannel::new(cfg.clone()));
            }
            ChannelConfig::Disabled { reason } => {
                warn!(channel = "whatsapp", reason = %reason, "notification channel disabled");
            }
        }

        match &config.email {
            ChannelConfig::Enabled(cfg) => match EmailChannel::new(cfg) {
                Ok(channel) => {
                    info!(channel = "email", "notification channel enabled");
                    dispatcher = dispatcher.with_channel(channel);
                }
                Err(e) => {
                    warn!(channel = "email", error = %e, "notification channel disabled");
                }
            },
            ChannelConfig::Disabled { reason } => {
                warn!(channel = "email", reason = %reason, "notification channel disabled");
            }
        }

        dispatcher
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Attempt delivery on every channel concurrently.
    ///
    /// Each attempt is bounded by the configured timeout. Failures are logged, never
    /// retried and never returned as errors; the report exists for logging and tests.
    pub async fn notify(&self, notification: Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if self.channels.is_empty() {
            return report;
        }

        let notification = Arc::new(notification);
        let mut tasks = JoinSet::new();
        for channel in &self.channels {
            let channel = channel.clone();
            let notification = notification.clone();
            let timeout = self.timeout;
            tasks.spawn(async move {
                let outcome = tokio::time::timeout(timeout, channel.send(&notification)).await;
                (channel.name(), outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(Ok(())))) => {
                    info!(channel = name, product = %notification.product_name, "notification delivered");
                    report.delivered.push(name);
                }
                Ok((name, Ok(Err(e)))) => {
                    error!(channel = name, product = %notification.product_name, error = %e, "notification failed");
                    report.failed.push(name);
                }
                Ok((name, Err(_))) => {
                    warn!(
                        channel = name,
                        product = %notification.product_name,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "notification timed out"
                    );
                    report.timed_out.push(name);
                }
                Err(e) => {
                    error!(product = %notification.product_name, error = %e, "notification task aborted");
                }
            }
        }

        // A panicked task does not report its channel name; account for it here.
        for name in self.channel_names() {
            let seen = report.delivered.contains(&name) || report.failed.contains(&name) || report.timed_out.contains(&name);
            if !seen {
                report.failed.push(name);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;
    use crate::notify::NotificationError;
    use std::sync::Mutex;

    /// Records every notification it is asked to send.
    #[derive(Default)]
    struct Recording {
        sent: Arc<Mutex<Vec<Notification>>>,
    }

    #[async_trait::async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl NotificationChannel for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn send(&self, _: &Notification) -> Result<(), NotificationError> {
            Err(NotificationError::Rejected {
                status: 401,
                body: "authenticate".to_string(),
            })
        }
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl NotificationChannel for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn send(&self, _: &Notification) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl NotificationChannel for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn send(&self, _: &Notification) -> Result<(), NotificationError> {
            panic!("channel bug");
        }
    }

    fn notification() -> Notification {
        Notification::new("USB-C Cable", "Stock level below threshold: 12 units remaining", Severity::Warning)
    }

    #[tokio::test]
    async fn no_channels_is_a_no_op() {
        let report = NotificationDispatcher::new(Duration::from_millis(50)).notify(notification()).await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_others() {
        let recording = Recording::default();
        let sent = recording.sent.clone();
        let dispatcher = NotificationDispatcher::new(Duration::from_millis(200))
            .with_channel(Failing)
            .with_channel(recording);

        let report = dispatcher.notify(notification()).await;

        assert_eq!(report.delivered, vec!["recording"]);
        assert_eq!(report.failed, vec!["failing"]);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hanging_channel_is_cut_off_by_the_timeout() {
        let recording = Recording::default();
        let sent = recording.sent.clone();
        let dispatcher = NotificationDispatcher::new(Duration::from_millis(50))
            .with_channel(Hanging)
            .with_channel(recording);

        let started = std::time::Instant::now();
        let report = dispatcher.notify(notification()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.timed_out, vec!["hanging"]);
        assert_eq!(report.delivered, vec!["recording"]);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panicking_channel_is_reported_as_failed() {
        let dispatcher = NotificationDispatcher::new(Duration::from_millis(200))
            .with_channel(Panicking)
            .with_channel(Recording::default());

        let report = dispatcher.notify(notification()).await;

        assert_eq!(report.delivered, vec!["recording"]);
        assert_eq!(report.failed, vec!["panicking"]);
    }

    #[test]
    fn incomplete_bundles_enable_nothing() {
        let config = NotifyConfig {
            timeout: Duration::from_secs(1),
            whatsapp: ChannelConfig::Disabled {
                reason: "missing TWILIO_AUTH_TOKEN".to_string(),
            },
            email: ChannelConfig::Disabled {
                reason: "missing MAIL_SERVER".to_string(),
            },
        };
        assert!(NotificationDispatcher::from_config(&config).channel_names().is_empty());
    }
}
