mod cron_tab;
mod grammar;
mod reminder;
pub mod timeexpr;

pub use cron_tab::{CronTab, CronTabError};
pub use grammar::{parse_command_body, GrammarError};
pub use reminder::{Reminder, ReminderKey, Trigger, TriggerKind, ESCALATION_PERIOD_SECS};
pub use timeexpr::TimeExprError;
