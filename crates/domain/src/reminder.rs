use std::fmt;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::cron_tab::CronTab;

/// How often a firing alarm re-notifies the room until it is silenced
pub const ESCALATION_PERIOD_SECS: i64 = 5 * 60;

/// The rule describing when a `Reminder` fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Fires exactly once at the given instant
    OneShot(DateTime<Utc>),
    /// Fires at `start` and then every `period` after that
    Every {
        start: DateTime<Utc>,
        period: Duration,
    },
    /// Fires according to a crontab evaluated in the reminder's timezone
    Cron(CronTab),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    OneShot,
    Interval,
    Cron,
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::OneShot(_) => TriggerKind::OneShot,
            Trigger::Every { .. } => TriggerKind::Interval,
            Trigger::Cron(_) => TriggerKind::Cron,
        }
    }

    /// The next instant this trigger will produce. A one-shot keeps reporting
    /// its instant until it has fired, recurring triggers report the first
    /// occurrence strictly after `now`. `None` means nothing is left, which
    /// can happen for crontabs with a bounded year field.
    pub fn next_occurrence(&self, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::OneShot(at) => Some(*at),
            Trigger::Every { start, period } => {
                if *start > now {
                    return Some(*start);
                }
                let period_secs = period.num_seconds().max(1);
                let elapsed = (now - *start).num_seconds();
                let intervals = elapsed / period_secs + 1;
                start.checked_add_signed(Duration::seconds(intervals * period_secs))
            }
            Trigger::Cron(tab) => tab.next_after(tz, now),
        }
    }

    /// The re-notification loop armed when an alarm starts firing
    pub fn escalation(now: DateTime<Utc>) -> Trigger {
        let period = Duration::seconds(ESCALATION_PERIOD_SECS);
        Trigger::Every {
            start: now + period,
            period,
        }
    }
}

/// A scheduled reminder belonging to a room.
///
/// A reminder with `is_alarm` set keeps re-notifying the room every
/// [`ESCALATION_PERIOD_SECS`] once due, until someone silences it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub room_id: String,
    /// The reminder content as the user wrote it, original casing preserved
    pub text: String,
    /// Timezone the reminder was created in, used to evaluate crontabs and
    /// to render times back to the room
    pub timezone: Tz,
    pub trigger: Trigger,
    /// The user to mention on delivery, the whole room when absent
    pub target_user: Option<String>,
    pub is_alarm: bool,
}

impl Reminder {
    pub fn key(&self) -> ReminderKey {
        ReminderKey::new(&self.room_id, &self.text)
    }
}

/// Uniqueness key of a reminder: the room it belongs to plus its upper-cased
/// text. Two reminders whose texts differ only by casing collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderKey {
    pub room_id: String,
    pub normalized_text: String,
}

impl ReminderKey {
    pub fn new(room_id: &str, text: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            normalized_text: text.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.room_id, self.normalized_text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_normalizes_casing_but_not_content() {
        let k1 = ReminderKey::new("!room:example.org", "buy milk");
        let k2 = ReminderKey::new("!room:example.org", "Buy MILK");
        let k3 = ReminderKey::new("!room:example.org", "buy bread");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.normalized_text, "BUY MILK");
    }

    #[test]
    fn key_is_scoped_to_room() {
        let k1 = ReminderKey::new("!a:example.org", "standup");
        let k2 = ReminderKey::new("!b:example.org", "standup");
        assert_ne!(k1, k2);
    }

    #[test]
    fn key_normalizes_unicode_text() {
        let k1 = ReminderKey::new("!room:example.org", "提醒我填写CD链接");
        let k2 = ReminderKey::new("!room:example.org", "提醒我填写cd链接");
        assert_eq!(k1, k2);
    }

    #[test]
    fn one_shot_reports_its_instant() {
        let at = Utc.ymd(2025, 7, 7).and_hms(12, 0, 0);
        let trigger = Trigger::OneShot(at);
        let now = Utc.ymd(2025, 7, 1).and_hms(0, 0, 0);
        assert_eq!(trigger.next_occurrence(chrono_tz::UTC, now), Some(at));
    }

    #[test]
    fn interval_before_start_reports_start() {
        let start = Utc.ymd(2025, 7, 7).and_hms(5, 10, 0);
        let trigger = Trigger::Every {
            start,
            period: Duration::weeks(1),
        };
        let now = Utc.ymd(2025, 7, 3).and_hms(0, 0, 0);
        assert_eq!(trigger.next_occurrence(chrono_tz::UTC, now), Some(start));
    }

    #[test]
    fn interval_after_start_skips_to_first_future_occurrence() {
        let start = Utc.ymd(2025, 7, 7).and_hms(5, 10, 0);
        let trigger = Trigger::Every {
            start,
            period: Duration::weeks(1),
        };
        // two and a half weeks later
        let now = Utc.ymd(2025, 7, 24).and_hms(17, 0, 0);
        assert_eq!(
            trigger.next_occurrence(chrono_tz::UTC, now),
            Some(Utc.ymd(2025, 7, 28).and_hms(5, 10, 0))
        );
    }

    #[test]
    fn interval_occurrence_is_strictly_after_now() {
        let start = Utc.ymd(2025, 7, 7).and_hms(5, 10, 0);
        let trigger = Trigger::Every {
            start,
            period: Duration::weeks(1),
        };
        assert_eq!(
            trigger.next_occurrence(chrono_tz::UTC, start),
            Some(Utc.ymd(2025, 7, 14).and_hms(5, 10, 0))
        );
    }

    #[test]
    fn escalation_starts_one_period_after_now() {
        let now = Utc.ymd(2025, 7, 7).and_hms(12, 0, 0);
        match Trigger::escalation(now) {
            Trigger::Every { start, period } => {
                assert_eq!(period.num_seconds(), ESCALATION_PERIOD_SECS);
                assert_eq!(start, now + Duration::seconds(ESCALATION_PERIOD_SECS));
            }
            other => panic!("expected an interval trigger, got {:?}", other),
        }
    }
}
