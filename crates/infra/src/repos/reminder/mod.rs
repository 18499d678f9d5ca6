mod inmemory;
mod postgres;

pub use inmemory::InMemoryReminderRepo;
pub use postgres::PostgresReminderRepo;

use chime_domain::{Reminder, ReminderKey};

use crate::repos::DeleteResult;

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()>;
    async fn delete(&self, key: &ReminderKey) -> anyhow::Result<DeleteResult>;
    async fn find_all(&self) -> anyhow::Result<Vec<Reminder>>;
}
