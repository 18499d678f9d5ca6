use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;

/// A validated crontab expression.
///
/// Users write standard 5-field crontabs (minute, hour, day of month, month,
/// day of week). The `cron` crate wants a seconds field in front, so a `0`
/// is prepended before parsing. Expressions that already carry 6 or 7 fields
/// are passed through untouched.
#[derive(Clone)]
pub struct CronTab {
    expression: String,
    schedule: Schedule,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CronTabError {
    #[error("'{expression}' is not a valid cron expression: {reason}")]
    Invalid { expression: String, reason: String },
}

impl CronTab {
    /// The expression as the user wrote it
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `now`, evaluated on the wall clock
    /// of `tz`. `None` when the schedule has run out.
    pub fn next_after(&self, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_now = now.with_timezone(&tz);
        self.schedule
            .after(&local_now)
            .next()
            .map(|next| next.with_timezone(&Utc))
    }
}

fn normalize(expression: &str) -> String {
    if expression.split_whitespace().count() == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    }
}

impl FromStr for CronTab {
    type Err = CronTabError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let expression = expression.trim().to_string();
        let schedule =
            Schedule::from_str(&normalize(&expression)).map_err(|e| CronTabError::Invalid {
                expression: expression.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression,
            schedule,
        })
    }
}

impl PartialEq for CronTab {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl fmt::Display for CronTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl fmt::Debug for CronTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CronTab({})", self.expression)
    }
}
