//! Cron expression handling for recurring jobs.

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use cron::Schedule;

/// Parse a cron expression. Standard 5-field expressions get a seconds field
/// of 0 prepended; 6- and 7-field expressions pass through as-is.
pub fn parse_frequency(expr: &str) -> Result<Schedule, String> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| format!("invalid cron expression {expr:?}: {e}"))
}

/// Whether a conditional job is due: its first cron fire strictly after the
/// last re-arm point (`anchor`, epoch seconds) has passed by `now`.
pub fn conditional_due(frequency: Option<&str>, anchor: i64, now: i64) -> Result<bool, String> {
    let expr = frequency.ok_or_else(|| "conditional job without a cron expression".to_string())?;
    let schedule = parse_frequency(expr)?;
    let anchor = Utc
        .timestamp_opt(anchor, 0)
        .single()
        .ok_or_else(|| format!("timestamp out of range: {anchor}"))?;
    Ok(schedule
        .after(&anchor)
        .next()
        .is_some_and(|fire| fire.timestamp() <= now))
}
