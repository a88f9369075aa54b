use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// "YYYY-MM-DD HH:MM:SS", 24h clock.
const FEED_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_ONLY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Format an instant for ORDERDATE / DELIVERYDATE columns, normalized to UTC.
pub fn format_feed_timestamp(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC)
        .format(FEED_TIMESTAMP)
        .unwrap_or_default()
}

/// Parse the historical cutoff preference.
/// Accepts RFC3339, "YYYY-MM-DD HH:MM:SS" (UTC) or a bare "YYYY-MM-DD" (UTC midnight).
pub fn parse_cutoff(s: &str) -> Result<OffsetDateTime, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty date".into());
    }
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    if let Ok(dt) = PrimitiveDateTime::parse(s, FEED_TIMESTAMP) {
        return Ok(dt.assume_utc());
    }
    Date::parse(s, DATE_ONLY)
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| format!("expected YYYY-MM-DD or RFC3339, got {s:?}"))
}

/// Start of a rolling window of `days` ending at `now`; `None` when it falls outside the
/// representable date range.
pub fn days_before(now: OffsetDateTime, days: u32) -> Option<OffsetDateTime> {
    now.checked_sub(Duration::days(i64::from(days)))
}
