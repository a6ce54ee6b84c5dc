//! Offset-shifted timestamp rendering.
//!
//! Log events carry UTC instants, but the indexed documents (and the monthly
//! index suffix) are rendered in a configured UTC offset expressed in hours,
//! which may be fractional (`9.5` is `+09:30`). Rendering goes through a
//! marker template so callers can ask for the full timestamp or just a coarse
//! `YYYYMM` key.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

/// Template rendered when callers do not supply one.
pub const DEFAULT_TEMPLATE: &str = "YYYY-MM-DDTHH:mm:SSOOOOOO";

/// Template used for the monthly index suffix.
pub const MONTH_KEY_TEMPLATE: &str = "YYYYMM";

/// Parses `value` as an RFC 3339 instant and renders it shifted by
/// `offset_hours`, substituting the template markers `YYYY`, `MM`, `DD`,
/// `HH`, `mm`, `SS` and `OOOOOO` once each, in that order. Unmatched markers
/// are left verbatim.
///
/// Returns `None` when `offset_hours` is NaN or out of range, or when `value`
/// is not a parseable instant. Callers treat `None` as the non-fatal sentinel
/// for a malformed event time.
pub fn format_instant(value: &str, offset_hours: f64, template: &str) -> Option<String> {
    let instant = DateTime::parse_from_rfc3339(value.trim()).ok()?;
    format_shifted(instant.with_timezone(&Utc), offset_hours, template)
}

/// Renders an already-parsed instant under `offset_hours` and `template`.
pub fn format_shifted(instant: DateTime<Utc>, offset_hours: f64, template: &str) -> Option<String> {
    let zone = fixed_offset(offset_hours)?;
    let designator = offset_designator(offset_hours)?;
    let local = instant.with_timezone(&zone);

    let mut rendered = template.to_string();
    for (marker, value) in [
        ("YYYY", format!("{:04}", local.year())),
        ("MM", format!("{:02}", local.month())),
        ("DD", format!("{:02}", local.day())),
        ("HH", format!("{:02}", local.hour())),
        ("mm", format!("{:02}", local.minute())),
        ("SS", format!("{:02}", local.second())),
        ("OOOOOO", designator),
    ] {
        rendered = rendered.replacen(marker, &value, 1);
    }
    Some(rendered)
}

/// Renders the coarse `YYYYMM` key used for index naming.
pub fn month_key(instant: DateTime<Utc>, offset_hours: f64) -> Option<String> {
    format_shifted(instant, offset_hours, MONTH_KEY_TEMPLATE)
}

fn fixed_offset(offset_hours: f64) -> Option<FixedOffset> {
    if !offset_hours.is_finite() {
        return None;
    }
    let seconds = (offset_hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds)
}

/// `Z` for a zero offset, otherwise `+HH:MM` / `-HH:MM`. Fractional hours are
/// converted to whole minutes, rounding to the nearest minute.
fn offset_designator(offset_hours: f64) -> Option<String> {
    if offset_hours.is_nan() {
        return None;
    }
    if offset_hours == 0.0 {
        return Some("Z".to_string());
    }

    let sign = if offset_hours > 0.0 { '+' } else { '-' };
    let total_minutes = (offset_hours.abs() * 60.0).round() as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 23 {
        return None;
    }
    Some(format!("{sign}{hours:02}:{minutes:02}"))
}
