use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Target duration used whenever the duration input is empty, zero or can't be parsed.
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(25 * 60);

/// Parses user input for a project's target duration.
///
/// A bare integer is read as minutes (`"40"`). Unit strings combining `h`, `m` and `s` are
/// accepted too (`"1h30m"`, `"90s"`). Anything else, or a zero result, falls back to
/// [DEFAULT_MAX_TIME]; bad input never blocks the form.
pub fn parse_max_time(input: &str) -> Duration {
    let input = input.trim();
    let parsed = match input.parse::<u64>() {
        Ok(minutes) => minutes.checked_mul(60).map(Duration::from_secs),
        Err(_) => parse_unit_duration(input),
    };
    match parsed {
        Some(v) if !v.is_zero() => v,
        _ => DEFAULT_MAX_TIME,
    }
}

fn parse_unit_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }
    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value = digits.parse::<u64>().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }
    // trailing number without a unit, like "1h30"
    if !digits.is_empty() {
        return None;
    }
    Some(Duration::from_secs(total))
}

/// `HH:MM:SS`, hours grow past two digits when needed.
pub fn format_clock(v: Duration) -> String {
    let secs = v.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Compact form used for logged sessions, e.g. `1h4m2s`, `3m0s`, `12s`.
pub fn format_session(v: TimeDelta) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

/// Fixed width RFC 3339 so lexicographic order of the stored text equals time order.
pub fn to_storage_timestamp(v: DateTime<Utc>) -> String {
    v.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_storage_timestamp(v: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(v)?.with_timezone(&Utc))
}
