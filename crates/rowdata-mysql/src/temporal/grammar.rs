//! Positional validators for MySQL's textual temporal formats.
//!
//! Every check is a fixed-offset character-class test. Digits are only
//! extracted after the whole layout has been accepted.

#![allow(clippy::cast_possible_truncation)]

/// Outcome of reading a temporal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal<T> {
    /// The all-zero sentinel (`0000-00-00...`)
    Zero,
    Valid(T),
    /// Text that does not match the grammar
    Invalid,
}

impl<T> Temporal<T> {
    pub fn is_zero(&self) -> bool {
        matches!(self, Temporal::Zero)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Temporal::Invalid)
    }

    pub fn valid(self) -> Option<T> {
        match self {
            Temporal::Valid(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeParts {
    pub date: DateParts,
    pub time: TimeParts,
}

/// A signed `TIME` value; hours may exceed 23.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub negative: bool,
    pub hours: u16,
    pub minutes: u8,
    pub seconds: u8,
    pub microsecond: u32,
}

const ZERO_DATE: &[u8] = b"0000-00-00";
const ZERO_TIME: &[u8] = b"00:00:00";

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn in_range(b: u8, lo: u8, hi: u8) -> bool {
    (lo..=hi).contains(&b)
}

fn number(digits: &[u8]) -> u32 {
    digits
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0'))
}

/// `""`, `.ddd` or `.dddddd`.
fn check_fraction(s: &[u8]) -> bool {
    match s.len() {
        0 => true,
        4 | 7 => s[0] == b'.' && s[1..].iter().all(|&b| is_digit(b)),
        _ => false,
    }
}

/// Microseconds from a validated fraction; three digits are milliseconds.
fn fraction_micros(s: &[u8]) -> u32 {
    match s.len() {
        4 => number(&s[1..]) * 1000,
        7 => number(&s[1..]),
        _ => 0,
    }
}

fn check_minute_second(s: &[u8]) -> bool {
    in_range(s[0], b'0', b'5') && is_digit(s[1])
}

/// `YYYY-MM-DD` with month 01-12, day 01-31 and a non-zero year.
pub fn check_date(s: &[u8]) -> bool {
    if s.len() != 10 || s[4] != b'-' || s[7] != b'-' {
        return false;
    }
    if !s[..4].iter().all(|&b| is_digit(b)) || &s[..4] == b"0000" {
        return false;
    }
    let month_ok = (s[5] == b'1' && in_range(s[6], b'0', b'2'))
        || (s[5] == b'0' && in_range(s[6], b'1', b'9'));
    let day_ok = (in_range(s[8], b'0', b'2') && is_digit(s[9]))
        || (s[8] == b'3' && in_range(s[9], b'0', b'1'));
    month_ok && day_ok && &s[8..] != b"00"
}

/// `HH:MM:SS` (hour 00-23) with an optional 3- or 6-digit fraction.
pub fn check_time(s: &[u8]) -> bool {
    if !matches!(s.len(), 8 | 12 | 15) || s[2] != b':' || s[5] != b':' {
        return false;
    }
    let hour_ok = (in_range(s[0], b'0', b'1') && is_digit(s[1]))
        || (s[0] == b'2' && in_range(s[1], b'0', b'3'));
    hour_ok && check_minute_second(&s[3..5]) && check_minute_second(&s[6..8]) && check_fraction(&s[8..])
}

/// A date and a time joined by a space or `T`.
pub fn check_datetime(s: &[u8]) -> bool {
    matches!(s.len(), 19 | 23 | 26)
        && matches!(s[10], b' ' | b'T')
        && check_date(&s[..10])
        && check_time(&s[11..])
}

/// `[-]H:MM:SS`, `[-]HH:MM:SS` or `[-]HHH:MM:SS` with an optional fraction.
pub fn check_duration(s: &[u8]) -> bool {
    let s = s.strip_prefix(b"-").unwrap_or(s);
    let Some(hour_width) = s.iter().position(|&b| b == b':') else {
        return false;
    };
    if !(1..=3).contains(&hour_width) || s.len() < hour_width + 6 {
        return false;
    }
    let rest = &s[hour_width..];
    s[..hour_width].iter().all(|&b| is_digit(b))
        && rest[0] == b':'
        && check_minute_second(&rest[1..3])
        && rest[3] == b':'
        && check_minute_second(&rest[4..6])
        && check_fraction(&rest[6..])
}

pub fn is_zero_date(s: &[u8]) -> bool {
    s == ZERO_DATE
}

/// `0000-00-00 00:00:00` with an optional all-zero fraction.
pub fn is_zero_datetime(s: &[u8]) -> bool {
    if !matches!(s.len(), 19 | 23 | 26) || !matches!(s[10], b' ' | b'T') {
        return false;
    }
    &s[..10] == ZERO_DATE
        && &s[11..19] == ZERO_TIME
        && matches!(&s[19..], b"" | b".000" | b".000000")
}

fn date_parts(s: &[u8]) -> DateParts {
    DateParts {
        year: number(&s[..4]) as u16,
        month: number(&s[5..7]) as u8,
        day: number(&s[8..10]) as u8,
    }
}

fn time_parts(s: &[u8]) -> TimeParts {
    TimeParts {
        hour: number(&s[..2]) as u8,
        minute: number(&s[3..5]) as u8,
        second: number(&s[6..8]) as u8,
        microsecond: fraction_micros(&s[8..]),
    }
}

pub fn parse_date(s: &[u8]) -> Temporal<DateParts> {
    if is_zero_date(s) {
        Temporal::Zero
    } else if check_date(s) {
        Temporal::Valid(date_parts(s))
    } else {
        Temporal::Invalid
    }
}

pub fn parse_datetime(s: &[u8]) -> Temporal<DateTimeParts> {
    if is_zero_datetime(s) {
        Temporal::Zero
    } else if check_datetime(s) {
        Temporal::Valid(DateTimeParts {
            date: date_parts(&s[..10]),
            time: time_parts(&s[11..]),
        })
    } else {
        Temporal::Invalid
    }
}

pub fn parse_time(s: &[u8]) -> Option<TimeParts> {
    check_time(s).then(|| time_parts(s))
}

/// Durations have no zero sentinel: `00:00:00` is an ordinary zero length.
pub fn parse_duration(s: &[u8]) -> Option<DurationParts> {
    if !check_duration(s) {
        return None;
    }
    let (negative, body) = match s.strip_prefix(b"-") {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let h = body.iter().position(|&b| b == b':')?;
    Some(DurationParts {
        negative,
        hours: number(&body[..h]) as u16,
        minutes: number(&body[h + 1..h + 3]) as u8,
        seconds: number(&body[h + 4..h + 6]) as u8,
        microsecond: fraction_micros(&body[h + 6..]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every single-byte mutation of `valid` must be rejected unless the
    /// result is in `also_valid`.
    fn assert_rejects_corruption(valid: &[u8], check: fn(&[u8]) -> bool, also_valid: fn(&[u8]) -> bool) {
        assert!(check(valid), "{}", String::from_utf8_lossy(valid));
        for pos in 0..valid.len() {
            for replacement in [b'x', b'/', b':', b'-', b' ', b'.', b'9', b'0', b'3', b'6'] {
                let mut mutated = valid.to_vec();
                if mutated[pos] == replacement {
                    continue;
                }
                mutated[pos] = replacement;
                if also_valid(&mutated) {
                    continue;
                }
                assert!(
                    !check(&mutated),
                    "accepted {}",
                    String::from_utf8_lossy(&mutated)
                );
            }
        }
    }

    /// Reference reading of a date used to decide whether a mutation is
    /// itself a legitimate date.
    fn plausible_date(s: &[u8]) -> bool {
        s.len() == 10
            && s[4] == b'-'
            && s[7] == b'-'
            && [0, 1, 2, 3, 5, 6, 8, 9].iter().all(|&i| is_digit(s[i]))
            && (1..=12).contains(&number(&s[5..7]))
            && (1..=31).contains(&number(&s[8..10]))
            && number(&s[..4]) != 0
    }

    fn plausible_time(s: &[u8]) -> bool {
        s.len() >= 8
            && s[2] == b':'
            && s[5] == b':'
            && [0, 1, 3, 4, 6, 7].iter().all(|&i| is_digit(s[i]))
            && number(&s[..2]) < 24
            && number(&s[3..5]) < 60
            && number(&s[6..8]) < 60
            && check_fraction(&s[8..])
    }

    fn plausible_datetime(s: &[u8]) -> bool {
        s.len() >= 19 && matches!(s[10], b' ' | b'T') && plausible_date(&s[..10]) && plausible_time(&s[11..])
    }

    fn plausible_duration(s: &[u8]) -> bool {
        let s = s.strip_prefix(b"-").unwrap_or(s);
        let parts: Vec<&[u8]> = s.split(|&b| b == b':').collect();
        let digits = |p: &[u8]| p.iter().all(|&b| is_digit(b));
        parts.len() == 3
            && (1..=3).contains(&parts[0].len())
            && digits(parts[0])
            && parts[1].len() == 2
            && digits(parts[1])
            && number(parts[1]) < 60
            && parts[2].len() >= 2
            && digits(&parts[2][..2])
            && number(&parts[2][..2]) < 60
            && check_fraction(&parts[2][2..])
    }

    #[test]
    fn test_check_date() {
        assert!(check_date(b"2024-02-29"));
        assert!(check_date(b"0001-01-01"));
        assert!(check_date(b"9999-12-31"));
        assert!(!check_date(b"0000-01-01"));
        assert!(!check_date(b"2024-00-10"));
        assert!(!check_date(b"2024-13-10"));
        assert!(!check_date(b"2024-01-00"));
        assert!(!check_date(b"2024-01-32"));
        assert!(!check_date(b"2024-99-99"));
        assert!(!check_date(b"2024-1-01"));
        assert!(!check_date(b"2024/01/01"));
    }

    #[test]
    fn test_check_time() {
        assert!(check_time(b"00:00:00"));
        assert!(check_time(b"23:59:59"));
        assert!(check_time(b"10:00:00.500"));
        assert!(check_time(b"10:00:00.123456"));
        assert!(!check_time(b"24:00:00"));
        assert!(!check_time(b"10:60:00"));
        assert!(!check_time(b"10:00:60"));
        assert!(!check_time(b"10:00:00.5"));
        assert!(!check_time(b"10:00:00.12345"));
        assert!(!check_time(b"10:00:00,500"));
    }

    #[test]
    fn test_check_datetime() {
        assert!(check_datetime(b"2024-02-29 10:00:00"));
        assert!(check_datetime(b"2024-02-29T10:00:00"));
        assert!(check_datetime(b"2024-02-29 10:00:00.500"));
        assert!(check_datetime(b"2024-02-29 10:00:00.500000"));
        assert!(!check_datetime(b"2024-02-29_10:00:00"));
        assert!(!check_datetime(b"2024-02-29 10:00"));
        assert!(!check_datetime(b"2024-02-29 10:00:00.5000"));
    }

    #[test]
    fn test_check_duration() {
        assert!(check_duration(b"1:02:03"));
        assert!(check_duration(b"12:02:03"));
        assert!(check_duration(b"838:59:59"));
        assert!(check_duration(b"-838:59:59.000000"));
        assert!(check_duration(b"0:00:00.001"));
        assert!(!check_duration(b"1000:00:00"));
        assert!(!check_duration(b":00:00"));
        assert!(!check_duration(b"1:60:00"));
        assert!(!check_duration(b"1:00:60"));
        assert!(!check_duration(b"--1:00:00"));
        assert!(!check_duration(b"1:00:00."));
    }

    #[test]
    fn test_zero_sentinels() {
        assert!(is_zero_date(b"0000-00-00"));
        assert!(is_zero_datetime(b"0000-00-00 00:00:00"));
        assert!(is_zero_datetime(b"0000-00-00T00:00:00.000"));
        assert!(is_zero_datetime(b"0000-00-00 00:00:00.000000"));
        assert!(!is_zero_datetime(b"0000-00-00 00:00:01"));
        assert!(!is_zero_datetime(b"0000-00-00 00:00:00.001"));

        assert_eq!(parse_date(b"0000-00-00"), Temporal::Zero);
        assert_eq!(parse_datetime(b"0000-00-00 00:00:00"), Temporal::Zero);
        assert!(parse_datetime(b"0000-00-00 00:00:01").is_invalid());
    }

    #[test]
    fn test_parse_datetime_fraction() {
        let parts = parse_datetime(b"2024-02-29 10:00:00.500").valid().unwrap();
        assert_eq!(
            parts.date,
            DateParts {
                year: 2024,
                month: 2,
                day: 29
            }
        );
        assert_eq!(parts.time.hour, 10);
        assert_eq!(parts.time.microsecond, 500_000);

        let parts = parse_datetime(b"1999-12-31T23:59:58.000042").valid().unwrap();
        assert_eq!(parts.time.second, 58);
        assert_eq!(parts.time.microsecond, 42);
    }

    #[test]
    fn test_parse_duration() {
        let d = parse_duration(b"-1:02:03.500").unwrap();
        assert!(d.negative);
        assert_eq!((d.hours, d.minutes, d.seconds, d.microsecond), (1, 2, 3, 500_000));

        let d = parse_duration(b"838:59:59.000001").unwrap();
        assert!(!d.negative);
        assert_eq!((d.hours, d.minutes, d.seconds, d.microsecond), (838, 59, 59, 1));

        let d = parse_duration(b"07:08:09").unwrap();
        assert_eq!((d.hours, d.minutes, d.seconds), (7, 8, 9));

        assert_eq!(parse_duration(b"abc"), None);
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time(b"08:30:15.250").unwrap();
        assert_eq!((t.hour, t.minute, t.second, t.microsecond), (8, 30, 15, 250_000));
        assert_eq!(parse_time(b"8:30:15"), None);
    }

    #[test]
    fn test_single_byte_corruption_is_rejected() {
        assert_rejects_corruption(b"2024-02-28", check_date, plausible_date);
        assert_rejects_corruption(b"1987-11-30", check_date, plausible_date);
        assert_rejects_corruption(b"12:34:56.789", check_time, plausible_time);
        assert_rejects_corruption(b"2024-02-29 10:00:00.500000", check_datetime, plausible_datetime);
        assert_rejects_corruption(b"-123:45:12.123", check_duration, plausible_duration);
    }
}
