use chime_domain::{Reminder, Trigger, TriggerKind, ESCALATION_PERIOD_SECS};
use chime_infra::RoomReminder;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// One reminder as exposed by a listing reply
#[derive(Debug, Serialize)]
pub struct ListedReminder {
    pub text: String,
    pub kind: TriggerKind,
    pub is_alarm: bool,
    pub firing: bool,
    pub target_user: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub period_secs: Option<i64>,
    pub cron_expression: Option<String>,
}

impl From<RoomReminder> for ListedReminder {
    fn from(entry: RoomReminder) -> Self {
        let (period_secs, cron_expression) = match &entry.reminder.trigger {
            Trigger::OneShot(_) => (None, None),
            Trigger::Every { period, .. } => (Some(period.num_seconds()), None),
            Trigger::Cron(tab) => (None, Some(tab.expression().to_string())),
        };
        Self {
            text: entry.reminder.text,
            kind: entry.reminder.trigger.kind(),
            is_alarm: entry.reminder.is_alarm,
            firing: entry.firing,
            target_user: entry.reminder.target_user,
            next_run: entry.next_run,
            period_secs,
            cron_expression,
        }
    }
}

/// What a successfully handled command sends back to the transport.
///
/// Every variant carries a pre-rendered plain `message` next to the
/// structured fields, so a transport can post the default wording or build
/// its own.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandReply {
    Created {
        message: String,
        text: String,
        kind: TriggerKind,
        is_alarm: bool,
        next_run: Option<DateTime<Utc>>,
        period_secs: Option<i64>,
        cron_expression: Option<String>,
    },
    Listing {
        message: String,
        reminders: Vec<ListedReminder>,
    },
    Cancelled {
        message: String,
        text: String,
        was_alarm: bool,
    },
    Silenced {
        message: String,
        text: String,
    },
    AlarmNotFiring {
        message: String,
        text: String,
    },
    NothingFiring {
        message: String,
    },
}

impl CommandReply {
    pub fn created(reminder: &Reminder, sender: &str, next_run: Option<DateTime<Utc>>) -> Self {
        let tz = reminder.timezone;
        let whom = match &reminder.target_user {
            Some(_) => "you",
            None => "everyone in the room",
        };
        let when = match &reminder.trigger {
            Trigger::OneShot(at) => format!("at {} ({})", format_local(*at, tz), tz.name()),
            Trigger::Every { start, period } => {
                let first = next_run.unwrap_or(*start);
                format!(
                    "at {} ({}), repeating every {}",
                    format_local(first, tz),
                    tz.name(),
                    format_period(period.num_seconds())
                )
            }
            Trigger::Cron(tab) => match next_run {
                Some(next) => format!(
                    "per crontab `{}`, next at {} ({})",
                    tab.expression(),
                    format_local(next, tz),
                    tz.name()
                ),
                None => format!("per crontab `{}`", tab.expression()),
            },
        };
        let mut message = format!("OK {}, I will remind {} {}.", sender, whom, when);
        if reminder.is_alarm {
            message.push_str(&format!(
                " Once due it rings every {} minutes until you use the silence command.",
                ESCALATION_PERIOD_SECS / 60
            ));
        }

        let (period_secs, cron_expression) = match &reminder.trigger {
            Trigger::OneShot(_) => (None, None),
            Trigger::Every { period, .. } => (Some(period.num_seconds()), None),
            Trigger::Cron(tab) => (None, Some(tab.expression().to_string())),
        };
        CommandReply::Created {
            message,
            text: reminder.text.clone(),
            kind: reminder.trigger.kind(),
            is_alarm: reminder.is_alarm,
            next_run,
            period_secs,
            cron_expression,
        }
    }

    pub fn listing(reminders: Vec<RoomReminder>) -> Self {
        let message = render_listing(&reminders);
        CommandReply::Listing {
            message,
            reminders: reminders.into_iter().map(ListedReminder::from).collect(),
        }
    }

    pub fn cancelled(reminder: &Reminder) -> Self {
        let what = if reminder.is_alarm { "alarm" } else { "reminder" };
        CommandReply::Cancelled {
            message: format!("Cancelled the {} \"{}\".", what, reminder.text),
            text: reminder.text.clone(),
            was_alarm: reminder.is_alarm,
        }
    }

    pub fn silenced(reminder: &Reminder) -> Self {
        CommandReply::Silenced {
            message: format!("Silenced the alarm \"{}\".", reminder.text),
            text: reminder.text.clone(),
        }
    }

    pub fn alarm_not_firing(text: &str) -> Self {
        CommandReply::AlarmNotFiring {
            message: format!("The alarm \"{}\" is not going off right now.", text),
            text: text.to_string(),
        }
    }

    pub fn nothing_firing() -> Self {
        CommandReply::NothingFiring {
            message: "No alarm is going off in this room.".to_string(),
        }
    }
}

fn render_listing(reminders: &[RoomReminder]) -> String {
    if reminders.is_empty() {
        return "There are no reminders in this room.".to_string();
    }
    let mut lines = vec!["Reminders in this room:".to_string()];

    let firing: Vec<&RoomReminder> = reminders.iter().filter(|r| r.firing).collect();
    if !firing.is_empty() {
        lines.push("Firing alarms (stop them with the silence command):".to_string());
        for entry in firing {
            lines.push(format!("  {}", entry.reminder.text));
        }
    }

    for (kind, header) in [
        (TriggerKind::OneShot, "One-shot:"),
        (TriggerKind::Interval, "Repeating:"),
        (TriggerKind::Cron, "Crontab:"),
    ] {
        let section: Vec<&RoomReminder> = reminders
            .iter()
            .filter(|r| !r.firing && r.reminder.trigger.kind() == kind)
            .collect();
        if section.is_empty() {
            continue;
        }
        lines.push(header.to_string());
        for entry in section {
            lines.push(listing_line(entry));
        }
    }

    lines.join("\n")
}

fn listing_line(entry: &RoomReminder) -> String {
    let tz = entry.reminder.timezone;
    let mut line = match (&entry.reminder.trigger, entry.next_run) {
        (Trigger::Every { period, .. }, Some(next)) => format!(
            "  {} and every {}: {}",
            format_local(next, tz),
            format_period(period.num_seconds()),
            entry.reminder.text
        ),
        (Trigger::Cron(tab), Some(next)) => format!(
            "  `{}` (next {}): {}",
            tab.expression(),
            format_local(next, tz),
            entry.reminder.text
        ),
        (Trigger::Cron(tab), None) => format!(
            "  `{}` (no upcoming run): {}",
            tab.expression(),
            entry.reminder.text
        ),
        (_, Some(next)) => format!("  {}: {}", format_local(next, tz), entry.reminder.text),
        (_, None) => format!("  {}", entry.reminder.text),
    };
    if entry.reminder.is_alarm {
        line.push_str(" [alarm]");
    }
    line
}

fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Compact duration rendering: `604800` becomes `7d`, `5430` becomes
/// `1h30m30s`
fn format_period(mut secs: i64) -> String {
    if secs <= 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (suffix, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, suffix));
            secs %= size;
        }
    }
    out
}
