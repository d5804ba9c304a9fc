//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::Rng;
use regex::Regex;

/// Number of random digits in a registration code
pub const CODE_DIGITS: usize = 6;

/// Generate a random registration code such as `REG-042317`
pub fn generate_registration_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    format!("{}-{:06}", prefix, rng.gen_range(0..1_000_000u32))
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:([A-Z0-9]*?[A-Z][A-Z0-9]*)[\s\-_]*)?(\d{6})$").expect("valid code pattern")
    })
}

/// Normalize user-typed codes (`reg 042317`, `042317`, ` REG-042317 `) to
/// the canonical `PREFIX-NNNNNN` form. Returns `None` when the input cannot
/// be a code with the given prefix.
pub fn normalize_registration_code(input: &str, prefix: &str) -> Option<String> {
    let upper = input.trim().to_ascii_uppercase();
    let captures = code_pattern().captures(&upper)?;

    if let Some(given) = captures.get(1) {
        if !given.as_str().eq_ignore_ascii_case(prefix) {
            return None;
        }
    }

    let digits = captures.get(2)?.as_str();
    Some(format!("{}-{}", prefix.to_ascii_uppercase(), digits))
}

/// Generate a random six-digit chat link code such as `042317`
pub fn generate_link_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Keep only the digits of a typed link code (`123 456`, `123-456`).
/// Returns `None` unless exactly six digits remain.
pub fn normalize_link_code(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == CODE_DIGITS).then_some(digits)
}

/// Calendar date of `instant` in the reference time zone
pub fn local_day(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Whether two instants fall on the same local calendar day
pub fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: &FixedOffset) -> bool {
    local_day(a, tz) == local_day(b, tz)
}

/// UTC half-open range `[start, end)` covering the local calendar day of `instant`
pub fn local_day_bounds(instant: DateTime<Utc>, tz: &FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = local_day(instant, tz);
    let midnight = day.and_time(NaiveTime::MIN);
    // A fixed offset has no gaps, so local midnight always maps to exactly one instant
    let start = tz
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(instant);
    (start, start + Duration::days(1))
}

/// Format a timestamp for display, e.g. `Mon, 02 Jan 2006 15:04`
pub fn format_local_datetime(instant: DateTime<Utc>, tz: &FixedOffset) -> String {
    instant.with_timezone(tz).format("%a, %d %b %Y %H:%M").to_string()
}

/// Date-only friendly string, e.g. `Mon, 02 Jan 2006`
pub fn format_local_date(instant: DateTime<Utc>, tz: &FixedOffset) -> String {
    instant.with_timezone(tz).format("%a, %d %b %Y").to_string()
}

/// Escape text for Telegram HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
