use chime_utils::create_random_secret;
use chrono_tz::Tz;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// IANA timezone that time expressions are interpreted in and that
    /// reminder times are rendered back in
    pub timezone: Tz,
    /// Port for the application to run on
    pub port: usize,
    /// Where fired notifications are delivered. When absent they are only
    /// logged, which is useful for local development.
    pub webhook: Option<WebhookSettings>,
    /// Postgres connection string. Reminders only live in memory when absent.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    /// Sent along in the `chime-webhook-key` header so the receiver can
    /// verify the notification came from this service
    pub key: String,
}

impl Config {
    pub fn new() -> Self {
        let default_timezone = "UTC";
        let timezone = std::env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| default_timezone.into());
        let timezone = match timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "The given DEFAULT_TIMEZONE: {} is not a valid IANA timezone, falling back to {}.",
                    timezone, default_timezone
                );
                chrono_tz::UTC
            }
        };
        let default_port = "5000";
        let port = std::env::var("PORT").unwrap_or(default_port.into());
        let port = match port.parse::<usize>() {
            Ok(port) => port,
            Err(_) => {
                warn!(
                    "The given PORT: {} is not valid, falling back to the default port: {}.",
                    port, default_port
                );
                default_port.parse::<usize>().unwrap()
            }
        };
        let webhook = match std::env::var("WEBHOOK_URL") {
            Ok(url) => Self::create_webhook_settings(url),
            Err(_) => None,
        };
        Self {
            timezone,
            port,
            webhook,
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }

    fn create_webhook_settings(url: String) -> Option<WebhookSettings> {
        match url::Url::parse(&url) {
            Ok(parsed) => {
                let allowed_schemes = vec!["https", "http"];
                if !allowed_schemes.contains(&parsed.scheme()) {
                    warn!(
                        "The given WEBHOOK_URL: {} is not a http(s) url, notifications will only be logged.",
                        url
                    );
                    return None;
                }
            }
            Err(_) => {
                warn!(
                    "The given WEBHOOK_URL: {} is not a valid url, notifications will only be logged.",
                    url
                );
                return None;
            }
        }
        let key = match std::env::var("WEBHOOK_KEY") {
            Ok(key) => key,
            Err(_) => {
                info!("Did not find WEBHOOK_KEY environment variable. Going to create one.");
                let key = create_random_secret(32);
                info!("Webhook key was generated and set to: {}", key);
                key
            }
        };
        Some(WebhookSettings { url, key })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
