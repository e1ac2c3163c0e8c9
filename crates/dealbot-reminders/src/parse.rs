//! Free-text reminder times.
//!
//! Accepted forms, case-insensitive:
//! - `in N hours` / `in N hrs` / `in 1 hour`
//! - `in N minutes` / `in N mins`
//! - `at H pm`, `at H:MM am` (next occurrence in Singapore time)

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use dealbot_core::{local_offset, MAX_REMINDER_LEAD};
use regex::Regex;

use crate::error::ReminderError;

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*in\s+(\d{1,4})\s*(hours?|hrs?|minutes?|mins?)\s*$")
        .expect("valid relative-time regex")
});

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*at\s+(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m\.?\s*$")
        .expect("valid clock-time regex")
});

/// Absolute UTC time for `input`, relative to `now`.
///
/// # Errors
///
/// - [`ReminderError::Unparseable`] when `input` matches no accepted form.
/// - [`ReminderError::Rejected`] when the time is not in the future or is
///   more than 24 hours ahead.
pub fn parse_reminder_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ReminderError> {
    let at = if let Some(caps) = RELATIVE_RE.captures(input) {
        let amount: i64 = caps[1].parse().map_err(|_| unparseable(input))?;
        let unit = caps[2].to_lowercase();
        let delay = if unit.starts_with('h') {
            Duration::hours(amount)
        } else {
            Duration::minutes(amount)
        };
        now + delay
    } else if let Some(caps) = CLOCK_RE.captures(input) {
        let hour: u32 = caps[1].parse().map_err(|_| unparseable(input))?;
        let minute: u32 = caps
            .get(2)
            .map_or(Ok(0), |m| m.as_str().parse())
            .map_err(|_| unparseable(input))?;
        let pm = caps[3].eq_ignore_ascii_case("p");
        next_local_occurrence(to_24_hour(hour, pm).ok_or_else(|| unparseable(input))?, minute, now)
            .ok_or_else(|| unparseable(input))?
    } else {
        return Err(unparseable(input));
    };

    check_lead(at, now)?;
    Ok(at)
}

/// `Ok` when `at` is in `(now, now + 24h]`.
///
/// # Errors
///
/// Returns [`ReminderError::Rejected`] otherwise.
pub fn check_lead(at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ReminderError> {
    let lead = at - now;
    if lead <= Duration::zero() {
        return Err(ReminderError::Rejected {
            reason: "reminder time must be in the future".to_string(),
        });
    }
    if lead > MAX_REMINDER_LEAD {
        return Err(ReminderError::Rejected {
            reason: "reminders can be set at most 24 hours ahead".to_string(),
        });
    }
    Ok(())
}

fn to_24_hour(hour: u32, pm: bool) -> Option<u32> {
    match (hour, pm) {
        (1..=11, false) => Some(hour),
        (12, false) => Some(0),
        (1..=11, true) => Some(hour + 12),
        (12, true) => Some(12),
        _ => None,
    }
}

/// The first `hour:minute` in Singapore time strictly after `now`.
fn next_local_occurrence(hour: u32, minute: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let offset = local_offset();
    let local_now = now.with_timezone(&offset);
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = local_now.date_naive().and_time(time).and_local_timezone(offset).single()?;
    let next = if today > local_now {
        today
    } else {
        today + Duration::days(1)
    };
    Some(next.with_timezone(&Utc))
}

fn unparseable(input: &str) -> ReminderError {
    ReminderError::Unparseable {
        input: input.trim().to_string(),
    }
}
