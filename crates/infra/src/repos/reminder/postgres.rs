use std::convert::TryFrom;

use chime_domain::{CronTab, Reminder, ReminderKey, Trigger};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use sqlx::{FromRow, PgPool};
use tracing::error;

use super::IReminderRepo;
use crate::repos::DeleteResult;

pub struct PostgresReminderRepo {
    pool: PgPool,
}

impl PostgresReminderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    room_id: String,
    reminder_text: String,
    timezone: String,
    start_time: Option<DateTime<Utc>>,
    period_secs: Option<i64>,
    cron_expression: Option<String>,
    target_user: Option<String>,
    is_alarm: bool,
}

impl TryFrom<ReminderRaw> for Reminder {
    type Error = anyhow::Error;

    fn try_from(raw: ReminderRaw) -> Result<Self, Self::Error> {
        let timezone = raw
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone {}: {}", raw.timezone, e))?;
        let trigger = match (raw.start_time, raw.period_secs, raw.cron_expression) {
            (Some(start), Some(period_secs), None) => Trigger::Every {
                start,
                period: Duration::seconds(period_secs),
            },
            (Some(at), None, None) => Trigger::OneShot(at),
            (None, None, Some(expression)) => Trigger::Cron(expression.parse::<CronTab>()?),
            _ => {
                return Err(anyhow::anyhow!(
                    "reminder row for room {} has an inconsistent trigger shape",
                    raw.room_id
                ))
            }
        };
        Ok(Reminder {
            room_id: raw.room_id,
            text: raw.reminder_text,
            timezone,
            trigger,
            target_user: raw.target_user,
            is_alarm: raw.is_alarm,
        })
    }
}

#[async_trait::async_trait]
impl IReminderRepo for PostgresReminderRepo {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let key = reminder.key();
        let (start_time, period_secs, cron_expression) = match &reminder.trigger {
            Trigger::OneShot(at) => (Some(*at), None, None),
            Trigger::Every { start, period } => {
                (Some(*start), Some(period.num_seconds()), None)
            }
            Trigger::Cron(tab) => (None, None, Some(tab.expression().to_string())),
        };
        sqlx::query(
            r#"
            INSERT INTO reminders
            (room_id, normalized_text, reminder_text, timezone, start_time, period_secs, cron_expression, target_user, is_alarm)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&reminder.room_id)
        .bind(&key.normalized_text)
        .bind(&reminder.text)
        .bind(reminder.timezone.name())
        .bind(start_time)
        .bind(period_secs)
        .bind(cron_expression)
        .bind(&reminder.target_user)
        .bind(reminder.is_alarm)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &ReminderKey) -> anyhow::Result<DeleteResult> {
        let res = sqlx::query(
            r#"
            DELETE FROM reminders AS r
            WHERE r.room_id = $1 AND r.normalized_text = $2
            "#,
        )
        .bind(&key.room_id)
        .bind(&key.normalized_text)
        .execute(&self.pool)
        .await?;
        Ok(DeleteResult {
            deleted_count: res.rows_affected() as i64,
        })
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Reminder>> {
        let rows: Vec<ReminderRaw> = sqlx::query_as(
            r#"
            SELECT room_id, reminder_text, timezone, start_time, period_secs, cron_expression, target_user, is_alarm
            FROM reminders
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut reminders = Vec::with_capacity(rows.len());
        for row in rows {
            match Reminder::try_from(row) {
                Ok(reminder) => reminders.push(reminder),
                // a malformed row must not keep every other reminder from
                // being restored
                Err(e) => error!("Skipping malformed reminder row: {:?}", e),
            }
        }
        Ok(reminders)
    }
}
