//! Relative-time parsing shared by the filter engine and the bounded store.
//!
//! Accepts `<int>s|m|h|d` as an offset subtracted from `now`, otherwise
//! falls back to parsing the string as an absolute RFC 3339 timestamp.
//! Anything that parses as neither means "no constraint from this field".

use chrono::DateTime;

/// Parse a relative or absolute time expression into epoch milliseconds.
pub fn parse_time(now_ms: i64, input: &str) -> Option<i64> {
    if let Some(offset_ms) = parse_relative_offset(input) {
        return Some(now_ms - offset_ms);
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn parse_relative_offset(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let (digits, unit) = input.split_at(input.len() - 1);
    let amount: i64 = digits.parse().ok()?;
    let unit_ms = match unit {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return None,
    };
    Some(amount * unit_ms)
}
