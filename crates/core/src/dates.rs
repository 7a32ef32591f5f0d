//! UTC-safe date-only arithmetic and warranty status classification.
//!
//! Every date handled here is a calendar day with no time-of-day and no
//! timezone. Inputs carrying a time component are normalized to the UTC
//! calendar day before any arithmetic. Doing this anywhere else (e.g. on
//! local-timezone wall clocks) flips statuses by a day near midnight
//! depending on where the server or client happens to run.
//!
//! The two non-obvious rules, preserved deliberately:
//! - [`add_months`] clamps the day-of-month to the last valid day of the
//!   target month (Jan 31 + 1 month = Feb 28/29, never March 2)
//! - [`days_between`] counts whole calendar days, signed, so "expires
//!   tomorrow" is exactly 1 and "expired yesterday" is exactly -1

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};

use crate::types::{StatusSummary, WarrantyStatus};

/// Parse a date-only value from a string.
///
/// Accepts a plain calendar date (`YYYY-MM-DD`) or an RFC 3339 timestamp,
/// which is normalized to its UTC calendar day. Returns `None` for
/// anything unparseable; callers treat that as "no date" rather than an
/// error (see [`classify`]).
#[must_use]
pub fn parse_date_only(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Normalize a UTC timestamp to its calendar day.
#[must_use]
pub fn date_only_utc(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Normalize a Unix timestamp in milliseconds to its UTC calendar day.
///
/// Returns `None` when the timestamp is outside chrono's representable
/// range.
#[must_use]
pub fn from_timestamp_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Today's date as a UTC calendar day.
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Add `months` calendar months, clamping to the end of the target month.
///
/// Moves to the first of the target month, then takes the original
/// day-of-month or the last valid day of that month, whichever is
/// smaller. Negative `months` walks backwards with the same rule.
#[must_use]
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let month0 = i32::try_from(date.month0()).unwrap_or(0);
    let total = date.year() * 12 + month0 + months;
    let year = total.div_euclid(12);
    let month = u32::try_from(total.rem_euclid(12)).unwrap_or(0) + 1;

    let day = date.day().min(days_in_month(year, month));
    // Only fails beyond chrono's representable year range.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Pure calendar-day addition. Saturates at chrono's representable range.
#[must_use]
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let saturated = if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    };
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(saturated)
}

/// Signed whole days from `a` to `b`.
///
/// `days_between(d, d) == 0`; one day after yields 1; negative when `b`
/// precedes `a`. Both operands are date-only, so the difference is always
/// an exact number of days.
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Number of days in the given month of the given year.
fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

/// Derive a warranty status from an expiry date, as of `today`.
///
/// No expiry means the item is open-ended: status `active`, `days_left`
/// `None`. Otherwise `days_left = days_between(today, expiry)` and the
/// status is `expired` below zero, `nearing_expiration` up to and
/// including `notice_days`, `active` beyond.
#[must_use]
pub fn classify_at(expiry: Option<NaiveDate>, notice_days: i64, today: NaiveDate) -> StatusSummary {
    let Some(expiry) = expiry else {
        return StatusSummary::open_ended();
    };

    let days_left = days_between(today, expiry);
    let code = if days_left < 0 {
        WarrantyStatus::Expired
    } else if days_left <= notice_days {
        WarrantyStatus::NearingExpiration
    } else {
        WarrantyStatus::Active
    };

    StatusSummary {
        code,
        days_left: Some(days_left),
    }
}

/// [`classify_at`] against the current UTC calendar day.
#[must_use]
pub fn classify(expiry: Option<NaiveDate>, notice_days: i64) -> StatusSummary {
    classify_at(expiry, notice_days, today_utc())
}

/// Resolve an item's expiry date at creation time.
///
/// An explicit expiry always wins. Otherwise a purchase date plus a
/// positive duration in months yields `add_months(purchase, months)`.
/// With neither, the item has no expiry and stays `active` until one is
/// set later.
#[must_use]
pub fn compute_expiry(
    purchase: Option<NaiveDate>,
    duration_months: Option<i32>,
    explicit_expiry: Option<NaiveDate>,
) -> Option<NaiveDate> {
    if explicit_expiry.is_some() {
        return explicit_expiry;
    }
    match (purchase, duration_months) {
        (Some(purchase), Some(months)) if months > 0 => Some(add_months(purchase, months)),
        _ => None,
    }
}

/// Coverage length in days, clamped to zero for inverted ranges.
#[must_use]
pub fn duration_days(purchase: Option<NaiveDate>, expiry: Option<NaiveDate>) -> Option<i64> {
    let (purchase, expiry) = (purchase?, expiry?);
    Some(days_between(purchase, expiry).max(0))
}

/// Back-fill an approximate month count from a day count (at least 1).
///
/// Used when a creation request supplies an explicit expiry but no
/// duration in months.
#[must_use]
pub fn approx_months(days: i64) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let rounded = ((days as f64) / 30.0).round() as i64;
    i32::try_from(rounded.max(1)).unwrap_or(i32::MAX)
}
