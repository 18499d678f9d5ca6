use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::cron_tab::{CronTab, CronTabError};
use crate::reminder::Trigger;
use crate::timeexpr::{self, TimeExprError};

const MISSING_TEXT_DELIMITER: &str = "';' between the time and the reminder text";
const MISSING_START_DELIMITER: &str = "';' between the recurrence and the start time";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    #[error("expected {expected}")]
    Syntax { expected: &'static str },
    #[error(transparent)]
    Time(#[from] TimeExprError),
    #[error(transparent)]
    Cron(#[from] CronTabError),
}

/// Parses a create-command body into a trigger and the reminder text.
///
/// Three forms are understood:
/// - `<time expression> ; <text>` for a one-shot reminder
/// - `每<recurrence> ; <start time> ; <text>` (or `every <recurrence> ; ...`)
///   for an interval reminder whose period is the distance from now to the
///   resolved recurrence expression
/// - `cron <crontab> ; <text>` for a crontab reminder
pub fn parse_command_body(
    body: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<(Trigger, String), GrammarError> {
    let body = body.trim();

    if let Some(rest) = strip_cron_keyword(body) {
        let (expression, text) = rest.split_once(';').ok_or(GrammarError::Syntax {
            expected: MISSING_TEXT_DELIMITER,
        })?;
        let tab: CronTab = expression.trim().parse()?;
        return Ok((Trigger::Cron(tab), text.trim().to_string()));
    }

    if let Some(rest) = strip_recurrence_marker(body) {
        let (recur_expr, rest) = rest.split_once(';').ok_or(GrammarError::Syntax {
            expected: MISSING_START_DELIMITER,
        })?;
        let now = timeexpr::truncate_subsec(now);
        // the period is how far into the future the recurrence expression
        // lands, so `1 week` is exactly 604800 seconds regardless of today
        let period = timeexpr::resolve(recur_expr.trim(), tz, now)? - now;
        let (start_expr, text) = rest.split_once(';').ok_or(GrammarError::Syntax {
            expected: MISSING_TEXT_DELIMITER,
        })?;
        let start = timeexpr::resolve(start_expr.trim(), tz, now)?;
        return Ok((
            Trigger::Every { start, period },
            text.trim().to_string(),
        ));
    }

    let (time_expr, text) = body.split_once(';').ok_or(GrammarError::Syntax {
        expected: MISSING_TEXT_DELIMITER,
    })?;
    let start = timeexpr::resolve(time_expr.trim(), tz, now)?;
    Ok((Trigger::OneShot(start), text.trim().to_string()))
}

fn strip_cron_keyword(body: &str) -> Option<&str> {
    match body.get(..4) {
        Some(head) if head.eq_ignore_ascii_case("cron") => {
            let rest = &body[4..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                Some(rest)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn strip_recurrence_marker(body: &str) -> Option<&str> {
    if let Some(rest) = body.strip_prefix('每') {
        return Some(rest.trim_start());
    }
    match body.get(..6) {
        Some(head) if head.eq_ignore_ascii_case("every ") => Some(body[6..].trim_start()),
        _ => None,
    }
}
