//! Hour offset correction
//!
//! Some timetables apply daylight saving on fixed calendar dates rather than
//! the legal switch-over Sundays, leaving a few days a year shifted by one
//! hour. Comparing the timetable's Maghrib with a calculated reference
//! Maghrib detects the shift.

use chrono::NaiveTime;

/// Differences up to this many seconds are treated as method noise
pub const OFFSET_TOLERANCE_SECS: i64 = 900;

/// Hour offset to apply to a non-standard time so it agrees with the standard
///
/// Both arguments are `HH:MM`. Returns `-1`, `0` or `+1`; unparseable input
/// yields `0`.
pub fn offset_fix(non_standard: &str, standard: &str) -> i32 {
    let (Ok(non_std), Ok(std)) = (
        NaiveTime::parse_from_str(non_standard.trim(), "%H:%M"),
        NaiveTime::parse_from_str(standard.trim(), "%H:%M"),
    ) else {
        tracing::info!(non_standard, standard, "Cannot compare times, expecting HH:MM");
        return 0;
    };

    let delta = (non_std - std).num_seconds().abs();
    let offset = if delta <= OFFSET_TOLERANCE_SECS {
        0
    } else if non_std > std {
        -1
    } else {
        1
    };

    tracing::debug!(non_standard, standard, offset, "Computed DST offset fix");
    offset
}

/// Format an hour/minute pair as `HH:MM`, shifting the hour by `offset`
pub fn format_time(hour: i64, minute: i64, offset: i32) -> String {
    format!("{:02}:{:02}", hour + i64::from(offset), minute)
}

/// Split `HH:MM` into numeric parts
pub fn split_time(value: &str) -> Option<(i64, i64)> {
    let (hour, minute) = value.trim().split_once(':')?;
    Some((hour.trim().parse().ok()?, minute.trim().parse().ok()?))
}

/// Apply an hour offset to an `HH:MM` string
pub fn shift_time(value: &str, offset: i32) -> Option<String> {
    split_time(value).map(|(h, m)| format_time(h, m, offset))
}
