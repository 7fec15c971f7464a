//! Date range parsing and normalization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CostscopeError, Result};

/// Default lookback window when the caller omits the range.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// A half-open reporting period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolve a date range from optional request strings.
///
/// When both bounds are present they are parsed; date-only values are
/// normalized to start-of-day / end-of-day. When either bound is absent the
/// range defaults to the last [`DEFAULT_LOOKBACK_DAYS`] days ending at `now`
/// (a single clock reading, passed in by the caller).
///
/// # Errors
///
/// Returns [`CostscopeError::InvalidRequest`] for unparseable dates or a
/// start after the end.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateRange> {
    let range = match (start, end) {
        (Some(start), Some(end)) => DateRange {
            start: parse_bound(start, false)?,
            end: parse_bound(end, true)?,
        },
        _ => DateRange {
            start: now - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS),
            end: now,
        },
    };

    if range.start > range.end {
        return Err(CostscopeError::InvalidRequest(format!(
            "start_date {} is after end_date {}",
            range.start.to_rfc3339(),
            range.end.to_rfc3339()
        )));
    }
    Ok(range)
}

/// Parse one bound: `YYYY-MM-DD` expands to the start or end of that day,
/// anything with a time component must be RFC 3339.
fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let invalid = || {
        CostscopeError::InvalidRequest(format!(
            "invalid date '{value}': use YYYY-MM-DD or an RFC 3339 timestamp"
        ))
    };

    if value.contains('T') {
        return DateTime::parse_from_rfc3339(value)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| invalid());
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|naive| naive.and_utc()).ok_or_else(invalid)
}
