use std::sync::Mutex;

use chime_domain::{Reminder, ReminderKey};

use super::IReminderRepo;
use crate::repos::DeleteResult;

pub struct InMemoryReminderRepo {
    reminders: Mutex<Vec<Reminder>>,
}

impl InMemoryReminderRepo {
    pub fn new() -> Self {
        Self {
            reminders: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryReminderRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IReminderRepo for InMemoryReminderRepo {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let mut reminders = self.reminders.lock().unwrap();
        reminders.push(reminder.clone());
        Ok(())
    }

    async fn delete(&self, key: &ReminderKey) -> anyhow::Result<DeleteResult> {
        let mut reminders = self.reminders.lock().unwrap();
        let count_before = reminders.len();
        reminders.retain(|reminder| reminder.key() != *key);
        Ok(DeleteResult {
            deleted_count: (count_before - reminders.len()) as i64,
        })
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Reminder>> {
        let reminders = self.reminders.lock().unwrap();
        Ok(reminders.clone())
    }
}
