//! Resolution of free-text time expressions to absolute instants.
//!
//! Supported forms, in English and Chinese:
//! - durations from now: `2 hours 30 minutes`, `2h30m`, `90s`, `1周`, `3天`,
//!   `2小时30分钟`, `1个月`, `1年`
//! - day words: `today`, `tomorrow`, `今天`, `明天`, `后天`
//! - weekdays, optionally anchored to a calendar week: `monday`,
//!   `this sunday`, `next monday`, `周一`, `本周日`, `下周一`
//! - absolute dates: `2025-07-07`, `2025年7月7日`, `7月7日`, `3月5号`
//! - wall clock times: `19:00`, `05:10:30`, `19点`, `19点半`, `9点15分`
//!
//! A date and a time can be combined (`今天19:00`, `next sunday 05:00`).
//! Under-specified expressions prefer the future: a bare time that already
//! passed today means tomorrow, a bare weekday means the next such weekday,
//! a date without a year means next year when this year's is over. Explicit
//! forms (`today`, `本周一`, full dates) are rejected when past.
//!
//! Resolved instants are truncated to whole seconds. Wall times that do not
//! exist in the target timezone are rejected, ambiguous ones take the
//! earlier reading.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeExprError {
    #[error("the time '{0}' could not be understood")]
    Unparseable(String),
    #[error("the time '{0}' has already passed")]
    Past(String),
}

/// Resolves `expr` against `now` on the wall clock of `tz`. The result is
/// always strictly in the future and truncated to whole seconds.
pub fn resolve(expr: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeExprError> {
    let raw = expr.trim();
    if raw.is_empty() {
        return Err(TimeExprError::Unparseable(expr.to_string()));
    }
    let now = truncate_subsec(now);
    let lowered = raw.to_lowercase();

    let resolved = if let Some(spec) = parse_datetime_expr(&lowered) {
        materialize(&spec, tz, now)
    } else if let Some(span) = parse_duration_expr(&lowered) {
        apply_span(now, tz, &span)
    } else {
        return Err(TimeExprError::Unparseable(raw.to_string()));
    };

    let resolved = resolved.ok_or_else(|| TimeExprError::Unparseable(raw.to_string()))?;
    if resolved <= now {
        return Err(TimeExprError::Past(raw.to_string()));
    }
    Ok(resolved)
}

/// Drops the sub-second part of an instant
pub fn truncate_subsec(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp(instant.timestamp(), 0)
}

#[derive(Debug, PartialEq)]
struct DateTimeSpec {
    date: Option<DateSpec>,
    time: Option<NaiveTime>,
}

#[derive(Debug, PartialEq)]
enum DateSpec {
    Today,
    Tomorrow,
    DayAfterTomorrow,
    Weekday {
        weekday: Weekday,
        which: WeekdayWhich,
    },
    Absolute {
        year: Option<i32>,
        month: u32,
        day: u32,
    },
}

#[derive(Debug, PartialEq)]
enum WeekdayWhich {
    /// Bare weekday, the nearest matching day (today included)
    Nearest,
    /// `this monday` / `本周一`, anchored to the current Monday-based week
    ThisWeek,
    /// `next monday` / `下周一`, anchored to the following week
    NextWeek,
}

#[derive(Debug, PartialEq)]
struct RelativeSpan {
    months: i64,
    secs: i64,
}

fn parse_datetime_expr(expr: &str) -> Option<DateTimeSpec> {
    let (date_part, time_part) = split_date_time(expr);
    let time = match time_part {
        Some(part) => Some(parse_time_part(part)?),
        None => None,
    };
    let date_part = date_part.trim();
    let date = if date_part.is_empty() {
        None
    } else {
        Some(parse_date_part(date_part)?)
    };
    if date.is_none() && time.is_none() {
        return None;
    }
    Some(DateTimeSpec { date, time })
}

/// Splits an expression into a date part and a trailing time part. Spaced
/// expressions split on the last space, compact ones (`今天19:00`,
/// `明天19点半`) split where the hour digits begin.
fn split_date_time(expr: &str) -> (&str, Option<&str>) {
    if let Some((head, tail)) = expr.rsplit_once(' ') {
        if parse_time_part(tail).is_some() {
            return (head, Some(tail));
        }
        return (expr, None);
    }
    if let Some(marker) = expr.find('点').or_else(|| expr.find(':')) {
        let start = digit_run_start(expr, marker);
        if start < marker {
            return (&expr[..start], Some(&expr[start..]));
        }
    }
    (expr, None)
}

/// Start of the run of ASCII digits ending right before byte offset `end`
fn digit_run_start(expr: &str, end: usize) -> usize {
    let mut start = end;
    for (idx, c) in expr[..end].char_indices().rev() {
        if !c.is_ascii_digit() {
            break;
        }
        start = idx;
    }
    start
}

fn parse_time_part(part: &str) -> Option<NaiveTime> {
    if let Some(idx) = part.find('点') {
        let hour = parse_number(&part[..idx], 2)?;
        let rest = &part[idx + '点'.len_utf8()..];
        let minute = if rest.is_empty() {
            0
        } else if rest == "半" {
            30
        } else {
            parse_number(rest.strip_suffix('分').unwrap_or(rest), 2)?
        };
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    let fields = part.split(':').collect::<Vec<_>>();
    if fields.len() != 2 && fields.len() != 3 {
        return None;
    }
    let hour = parse_number(fields[0], 2)?;
    let minute = parse_number(fields[1], 2)?;
    let second = if fields.len() == 3 {
        parse_number(fields[2], 2)?
    } else {
        0
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_number(digits: &str, max_len: usize) -> Option<u32> {
    if digits.is_empty() || digits.len() > max_len || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_date_part(part: &str) -> Option<DateSpec> {
    match part {
        "today" | "今天" => return Some(DateSpec::Today),
        "tomorrow" | "明天" => return Some(DateSpec::Tomorrow),
        "day after tomorrow" | "后天" => return Some(DateSpec::DayAfterTomorrow),
        _ => {}
    }
    if let Some(spec) = parse_weekday(part) {
        return Some(spec);
    }
    parse_absolute_date(part)
}

fn parse_weekday(part: &str) -> Option<DateSpec> {
    let (which, rest) = if let Some(rest) = part.strip_prefix("next ") {
        (WeekdayWhich::NextWeek, rest)
    } else if let Some(rest) = part.strip_prefix("this ") {
        (WeekdayWhich::ThisWeek, rest)
    } else if let Some(rest) = part.strip_prefix('下') {
        (WeekdayWhich::NextWeek, rest)
    } else if let Some(rest) = part.strip_prefix('本').or_else(|| part.strip_prefix('这')) {
        (WeekdayWhich::ThisWeek, rest)
    } else {
        (WeekdayWhich::Nearest, part)
    };
    weekday_token(rest).map(|weekday| DateSpec::Weekday { weekday, which })
}

fn weekday_token(token: &str) -> Option<Weekday> {
    let weekday = match token {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return zh_weekday_token(token),
    };
    Some(weekday)
}

fn zh_weekday_token(token: &str) -> Option<Weekday> {
    let day = token
        .strip_prefix("星期")
        .or_else(|| token.strip_prefix("礼拜"))
        .or_else(|| token.strip_prefix('周'))?;
    let weekday = match day {
        "一" => Weekday::Mon,
        "二" => Weekday::Tue,
        "三" => Weekday::Wed,
        "四" => Weekday::Thu,
        "五" => Weekday::Fri,
        "六" => Weekday::Sat,
        "日" | "天" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

fn parse_absolute_date(part: &str) -> Option<DateSpec> {
    if part.contains('月') {
        return parse_absolute_zh(part);
    }
    let fields = part
        .split(|c| c == '-' || c == '/')
        .collect::<Vec<_>>();
    if fields.len() != 3 {
        return None;
    }
    let year = parse_number(fields[0], 4)? as i32;
    let month = parse_number(fields[1], 2)?;
    let day = parse_number(fields[2], 2)?;
    validate_ymd(Some(year), month, day)
}

/// `[YYYY年]M月D日` with `号` accepted in place of `日`
fn parse_absolute_zh(part: &str) -> Option<DateSpec> {
    let (year, rest) = match part.find('年') {
        Some(idx) => {
            let year = parse_number(&part[..idx], 4)? as i32;
            (Some(year), &part[idx + '年'.len_utf8()..])
        }
        None => (None, part),
    };
    let idx = rest.find('月')?;
    let month = parse_number(&rest[..idx], 2)?;
    let rest = &rest[idx + '月'.len_utf8()..];
    let day = parse_number(rest.strip_suffix('日').or_else(|| rest.strip_suffix('号'))?, 2)?;
    validate_ymd(year, month, day)
}

fn validate_ymd(year: Option<i32>, month: u32, day: u32) -> Option<DateSpec> {
    if month < 1 || month > 12 || day < 1 {
        return None;
    }
    match year {
        Some(year) => {
            if !(1970..=2100).contains(&year) || day > get_month_length(year, month) {
                return None;
            }
        }
        // the year is picked at materialization, only a coarse check here
        None => {
            if day > 31 {
                return None;
            }
        }
    }
    Some(DateSpec::Absolute { year, month, day })
}

pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 100 != 0 && year % 4 == 0)
}

// month: January -> 1
pub fn get_month_length(year: i32, month: u32) -> u32 {
    match month - 1 {
        0 => 31,
        1 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        2 => 31,
        3 => 30,
        4 => 31,
        5 => 30,
        6 => 31,
        7 => 31,
        8 => 30,
        9 => 31,
        10 => 30,
        11 => 31,
        _ => panic!("Invalid month"),
    }
}

fn materialize(spec: &DateTimeSpec, tz: Tz, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&tz).naive_local().date();
    let time = spec.time.unwrap_or_else(|| NaiveTime::from_hms(0, 0, 0));
    let date = initial_date(spec.date.as_ref(), today)?;
    let first = localize(date.and_time(time), tz).map(|local| local.with_timezone(&Utc));
    if let Some(first) = first {
        if first > now {
            return Some(first);
        }
    }
    // under-specified forms prefer the future, explicit ones stay put and
    // get rejected as past by the caller
    let shifted = match spec.date.as_ref() {
        None => Some(date + Duration::days(1)),
        Some(DateSpec::Weekday {
            which: WeekdayWhich::Nearest,
            ..
        }) => Some(date + Duration::days(7)),
        Some(DateSpec::Absolute {
            year: None,
            month,
            day,
        }) => NaiveDate::from_ymd_opt(today.year() + 1, *month, *day),
        _ => None,
    };
    match shifted {
        Some(shifted) => localize(shifted.and_time(time), tz).map(|local| local.with_timezone(&Utc)),
        None => first,
    }
}

fn initial_date(date: Option<&DateSpec>, today: NaiveDate) -> Option<NaiveDate> {
    let date = match date {
        None | Some(DateSpec::Today) => today,
        Some(DateSpec::Tomorrow) => today + Duration::days(1),
        Some(DateSpec::DayAfterTomorrow) => today + Duration::days(2),
        Some(DateSpec::Weekday { weekday, which }) => {
            let current = today.weekday().num_days_from_monday() as i64;
            let target = weekday.num_days_from_monday() as i64;
            let offset = match which {
                WeekdayWhich::Nearest => (target - current).rem_euclid(7),
                WeekdayWhich::ThisWeek => target - current,
                WeekdayWhich::NextWeek => target - current + 7,
            };
            today + Duration::days(offset)
        }
        Some(DateSpec::Absolute { year, month, day }) => {
            NaiveDate::from_ymd_opt(year.unwrap_or_else(|| today.year()), *month, *day)?
        }
    };
    Some(date)
}

fn apply_span(now: DateTime<Utc>, tz: Tz, span: &RelativeSpan) -> Option<DateTime<Utc>> {
    let base = if span.months > 0 {
        // months and years move the local calendar, clamping the day to the
        // target month's length
        let local = now.with_timezone(&tz).naive_local();
        let shifted = add_months(local, span.months)?;
        localize(shifted, tz)?.with_timezone(&Utc)
    } else {
        now
    };
    base.checked_add_signed(Duration::seconds(span.secs))
}

fn add_months(local: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let zero_based = local.year() as i64 * 12 + local.month0() as i64 + months;
    let year = zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;
    if !(1970..=2100).contains(&year) {
        return None;
    }
    let year = year as i32;
    let day = local.day().min(get_month_length(year, month));
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.and_time(local.time()))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        // fall-back transition, take the earlier of the two readings
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // spring-forward gap, the wall time never exists
        LocalResult::None => None,
    }
}

fn parse_duration_expr(expr: &str) -> Option<RelativeSpan> {
    let chars = expr.chars().collect::<Vec<_>>();
    let mut span = RelativeSpan { months: 0, secs: 0 };
    let mut segments = 0;
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i == chars.len() {
            break;
        }
        let digit_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == digit_start || i - digit_start > 9 {
            return None;
        }
        let amount = chars[digit_start..i]
            .iter()
            .collect::<String>()
            .parse::<i64>()
            .ok()?;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let unit_start = i;
        while i < chars.len() && chars[i].is_alphabetic() {
            i += 1;
        }
        if i == unit_start {
            return None;
        }
        let unit = chars[unit_start..i].iter().collect::<String>();
        match unit_span(&unit)? {
            UnitSpan::Seconds(secs) => span.secs = span.secs.checked_add(amount.checked_mul(secs)?)?,
            UnitSpan::Months(months) => {
                span.months = span.months.checked_add(amount.checked_mul(months)?)?
            }
        }
        segments += 1;
    }
    if segments == 0 {
        None
    } else {
        Some(span)
    }
}

enum UnitSpan {
    Seconds(i64),
    Months(i64),
}

fn unit_span(unit: &str) -> Option<UnitSpan> {
    let span = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" | "秒" => UnitSpan::Seconds(1),
        "m" | "min" | "mins" | "minute" | "minutes" | "分" | "分钟" => UnitSpan::Seconds(60),
        "h" | "hr" | "hrs" | "hour" | "hours" | "时" | "小时" | "个小时" => {
            UnitSpan::Seconds(60 * 60)
        }
        "d" | "day" | "days" | "天" | "日" => UnitSpan::Seconds(24 * 60 * 60),
        "w" | "wk" | "wks" | "week" | "weeks" | "周" | "星期" | "个星期" | "礼拜" => {
            UnitSpan::Seconds(7 * 24 * 60 * 60)
        }
        "mo" | "month" | "months" | "月" | "个月" => UnitSpan::Months(1),
        "y" | "yr" | "yrs" | "year" | "years" | "年" => UnitSpan::Months(12),
        _ => return None,
    };
    Some(span)
}
