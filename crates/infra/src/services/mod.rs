use std::sync::Mutex;

use serde::Serialize;
use tracing::{error, info};

use crate::config::WebhookSettings;

/// Who a delivered message should ping inside the room
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTarget {
    User(String),
    Room,
}

/// A rendered message on its way to a room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub room_id: String,
    pub message: String,
    pub target: NotifyTarget,
}

/// Delivery of fired reminders to the chat system.
///
/// Delivery is best effort. Implementations log failures instead of
/// surfacing them, a reminder that could not be delivered now is gone.
#[async_trait::async_trait]
pub trait INotifier: Send + Sync {
    async fn notify(&self, notification: &Notification);
}

/// Posts every notification as JSON to the configured webhook endpoint
pub struct WebhookNotifier {
    url: String,
    key: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(settings: &WebhookSettings) -> Self {
        Self {
            url: settings.url.clone(),
            key: settings.key.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl INotifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) {
        match self
            .client
            .post(&self.url)
            .header("chime-webhook-key", self.key.as_str())
            .json(notification)
            .send()
            .await
        {
            Ok(res) if !res.status().is_success() => {
                error!(
                    "Webhook at {} rejected notification for room {} with status {}",
                    self.url,
                    notification.room_id,
                    res.status()
                );
            }
            Ok(_) => {}
            Err(e) => error!("Error delivering notification to webhook: {:?}", e),
        }
    }
}

/// Records notifications instead of delivering them. Used when no webhook
/// is configured, and by tests to observe what would have been sent.
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything notified so far, in delivery order
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl INotifier for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) {
        info!(
            "Notification for room {}: {}",
            notification.room_id, notification.message
        );
        self.sent.lock().unwrap().push(notification.clone());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn inmemory_notifier_records_in_order() {
        let notifier = InMemoryNotifier::new();
        let first = Notification {
            room_id: "!room:example.org".into(),
            message: "Reminder: buy milk".into(),
            target: NotifyTarget::Room,
        };
        let second = Notification {
            room_id: "!room:example.org".into(),
            message: "Reminder: standup".into(),
            target: NotifyTarget::User("@bob:example.org".into()),
        };
        notifier.notify(&first).await;
        notifier.notify(&second).await;
        assert_eq!(notifier.sent(), vec![first, second]);
    }
}
