//! Day-ordinal arithmetic following MySQL's calendar.
//!
//! MySQL uses the proleptic Gregorian leap rule except that year 0 is an
//! ordinary 365-day year.

/// `day_ordinal(1970, 1, 1)`.
pub const EPOCH_DAY_ORDINAL: i64 = 719_528;

pub const SECONDS_PER_DAY: i64 = 86_400;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MICRO: i64 = 1_000;

/// Days before the first of each month in a common year, indexed by month.
const DAYS_BEFORE_MONTH: [i64; 13] = [-31, 0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

pub fn is_leap_year(year: i64) -> bool {
    year != 0 && year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Days in the months of `year` preceding `month` (1-12).
pub fn days_before_month(month: u32, year: i64) -> i64 {
    let idx = (month as usize).min(12);
    DAYS_BEFORE_MONTH[idx] + i64::from(month > 2 && is_leap_year(year))
}

/// Leap years in `[1, year)`. Division truncates toward zero.
pub fn leap_years_before(year: i64) -> i64 {
    let y = year - 1;
    y / 4 - y / 100 + y / 400
}

/// Ordinal day count of a calendar date.
pub fn day_ordinal(year: i64, month: u32, day: u32) -> i64 {
    365 * year + leap_years_before(year) + days_before_month(month, year) + i64::from(day)
}

pub fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Whether the date exists on the calendar (rejects 2023-02-29, 04-31, ...).
pub fn is_valid_date(year: i64, month: u32, day: u32) -> bool {
    (1..=12).contains(&month) && day >= 1 && day <= days_in_month(year, month)
}

/// Nanoseconds since 1970-01-01 00:00:00, or `None` outside the i64 range.
pub fn epoch_nanos(
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    microsecond: u32,
) -> Option<i64> {
    let days = day_ordinal(year, month, day) - EPOCH_DAY_ORDINAL;
    let seconds = days
        .checked_mul(SECONDS_PER_DAY)?
        .checked_add(i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second))?;
    seconds
        .checked_mul(NANOS_PER_SECOND)?
        .checked_add(i64::from(microsecond) * NANOS_PER_MICRO)
}

/// Signed duration in nanoseconds.
pub fn duration_nanos(
    negative: bool,
    hours: u32,
    minutes: u32,
    seconds: u32,
    microseconds: u32,
) -> i64 {
    let secs = i64::from(hours) * 3600 + i64::from(minutes) * 60 + i64::from(seconds);
    // Hours are at most 999, far inside the i64 range
    let nanos = secs * NANOS_PER_SECOND + i64::from(microseconds) * NANOS_PER_MICRO;
    if negative { -nanos } else { nanos }
}
