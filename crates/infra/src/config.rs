//! Environment-driven configuration, read once at startup.

use std::time::Duration;

use thiserror::Error;

use crate::forecast::MAX_HORIZON_DAYS;

pub const DEFAULT_HORIZON_DAYS: usize = 90;
pub const DEFAULT_REFRESH_SECS: u64 = 3600;
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// A notification channel is enabled only when its whole credential bundle is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelConfig<T> {
    Enabled(T),
    Disabled { reason: String },
}

impl<T> ChannelConfig<T> {
    pub fn enabled(&self) -> Option<&T> {
        match self {
            ChannelConfig::Enabled(cfg) => Some(cfg),
            ChannelConfig::Disabled { .. } => None,
        }
    }
}

/// Twilio WhatsApp credentials. `from`/`to` are passed to Twilio verbatim
/// (e.g. `whatsapp:+14155238886`).
#[derive(Clone, PartialEq, Eq)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
}

impl core::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub recipient: String,
}

impl core::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Upper bound for one delivery attempt on one channel.
    pub timeout: Duration,
    pub whatsapp: ChannelConfig<WhatsAppConfig>,
    pub email: ChannelConfig<EmailConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub forecast_horizon_days: usize,
    pub refresh_interval: Duration,
    /// Load the demo catalog into an in-memory store at startup.
    pub seed_demo_data: bool,
    pub notify: NotifyConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let forecast_horizon_days = match get("FORECAST_HORIZON_DAYS") {
            None => DEFAULT_HORIZON_DAYS,
            Some(raw) => match raw.parse::<usize>() {
                Ok(days) if (1..=MAX_HORIZON_DAYS).contains(&days) => days,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "FORECAST_HORIZON_DAYS",
                        value: raw,
                        reason: format!("expected 1..={MAX_HORIZON_DAYS}"),
                    });
                }
            },
        };

        let refresh_secs = positive(get("FORECAST_REFRESH_SECS"), "FORECAST_REFRESH_SECS", DEFAULT_REFRESH_SECS)?;
        let timeout_ms = positive(get("NOTIFY_TIMEOUT_MS"), "NOTIFY_TIMEOUT_MS", DEFAULT_NOTIFY_TIMEOUT_MS)?;

        let seed_demo_data = match get("SEED_DEMO_DATA") {
            None => false,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SEED_DEMO_DATA",
                        value: raw,
                        reason: "expected a boolean".to_string(),
                    });
                }
            },
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            forecast_horizon_days,
            refresh_interval: Duration::from_secs(refresh_secs),
            seed_demo_data,
            notify: NotifyConfig {
                timeout: Duration::from_millis(timeout_ms),
                whatsapp: whatsapp_bundle(&get),
                email: email_bundle(&get),
            },
        })
    }
}

fn positive(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "expected a positive integer".to_string(),
            }),
        },
    }
}

/// Collect `keys`, or the list of the ones that are missing.
fn bundle<const N: usize>(
    get: &dyn Fn(&str) -> Option<String>,
    keys: [&'static str; N],
) -> Result<[String; N], String> {
    let values = keys.map(get);
    let missing: Vec<_> = keys
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing {}", missing.join(", ")));
    }
    Ok(values.map(Option::unwrap_or_default))
}

fn whatsapp_bundle(get: &dyn Fn(&str) -> Option<String>) -> ChannelConfig<WhatsAppConfig> {
    match bundle(
        get,
        [
            "TWILIO_ACCOUNT_SID",
            "TWILIO_AUTH_TOKEN",
            "TWILIO_WHATSAPP_FROM",
            "TWILIO_WHATSAPP_TO",
        ],
    ) {
        Ok([account_sid, auth_token, from, to]) => ChannelConfig::Enabled(WhatsAppConfig {
            account_sid,
            auth_token,
            from,
            to,
        }),
        Err(reason) => ChannelConfig::Disabled { reason },
    }
}

fn email_bundle(get: &dyn Fn(&str) -> Option<String>) -> ChannelConfig<EmailConfig> {
    let port = match get("MAIL_PORT") {
        None => DEFAULT_SMTP_PORT,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                return ChannelConfig::Disabled {
                    reason: format!("MAIL_PORT is not a valid port: {raw:?}"),
                };
            }
        },
    };

    match bundle(
        get,
        [
            "MAIL_SERVER",
            "MAIL_USERNAME",
            "MAIL_PASSWORD",
            "MAIL_DEFAULT_SENDER",
            "ALERT_EMAIL_TO",
        ],
    ) {
        Ok([server, username, password, sender, recipient]) => ChannelConfig::Enabled(EmailConfig {
            server,
            port,
            username,
            password,
            sender,
            recipient,
        }),
        Err(reason) => ChannelConfig::Disabled { reason },
    }
}
