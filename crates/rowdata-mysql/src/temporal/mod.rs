//! Temporal text handling: grammar validation plus calendar arithmetic.
//!
//! `grammar` decides whether a cell has one of MySQL's textual layouts,
//! `calendar` turns accepted fields into day ordinals and epoch offsets.
//! The conversions below bridge the two to `chrono` values.

pub mod calendar;
pub mod grammar;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

pub use calendar::{
    EPOCH_DAY_ORDINAL, day_ordinal, days_before_month, is_leap_year, is_valid_date,
    leap_years_before,
};
pub use grammar::{
    DateParts, DateTimeParts, DurationParts, Temporal, TimeParts, check_date, check_datetime,
    check_duration, check_time, parse_date, parse_datetime, parse_duration, parse_time,
};

impl DateParts {
    /// Whether the day exists in the month (the grammar allows 02-31).
    pub fn is_calendar_valid(&self) -> bool {
        is_valid_date(i64::from(self.year), u32::from(self.month), u32::from(self.day))
    }

    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        if !self.is_calendar_valid() {
            return None;
        }
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    /// Midnight of this date as nanoseconds since the Unix epoch.
    pub fn epoch_nanos(&self) -> Option<i64> {
        DateTimeParts {
            date: *self,
            time: TimeParts {
                hour: 0,
                minute: 0,
                second: 0,
                microsecond: 0,
            },
        }
        .epoch_nanos()
    }
}

impl DateTimeParts {
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        self.date.to_naive_date()?.and_hms_micro_opt(
            u32::from(self.time.hour),
            u32::from(self.time.minute),
            u32::from(self.time.second),
            self.time.microsecond,
        )
    }

    /// Nanoseconds since the Unix epoch, `None` for impossible dates or
    /// values outside the i64 range (before 1677 or after 2262).
    pub fn epoch_nanos(&self) -> Option<i64> {
        if !self.date.is_calendar_valid() {
            return None;
        }
        calendar::epoch_nanos(
            i64::from(self.date.year),
            u32::from(self.date.month),
            u32::from(self.date.day),
            u32::from(self.time.hour),
            u32::from(self.time.minute),
            u32::from(self.time.second),
            self.time.microsecond,
        )
    }
}

impl DurationParts {
    pub fn total_micros(&self) -> i64 {
        let secs = i64::from(self.hours) * 3600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);
        let micros = secs * 1_000_000 + i64::from(self.microsecond);
        if self.negative { -micros } else { micros }
    }

    pub fn to_time_delta(&self) -> TimeDelta {
        TimeDelta::microseconds(self.total_micros())
    }

    pub fn nanos(&self) -> i64 {
        calendar::duration_nanos(
            self.negative,
            u32::from(self.hours),
            u32::from(self.minutes),
            u32::from(self.seconds),
            self.microsecond,
        )
    }
}
