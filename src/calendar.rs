//! Jalali civil calendar support.
//!
//! Every stored date in the clinic ledger is a Jalali (Persian) civil date. Such
//! dates cannot be ordered through the Gregorian calendar and their strings do not
//! sort lexicographically unless zero-padded, so all ordering and windowing goes
//! through [`SortKey`]. Conversion to and from the Gregorian calendar is pure
//! arithmetic over the 33-year grand cycle, with no lookup tables.

use crate::error::{ClinicLedgerError, Result};
use crate::utils::normalize_digits;
use chrono::{Datelike, Days, Local, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Earliest civil year accepted by [`CalendarDate::new`].
pub const MIN_YEAR: i32 = 1200;
/// Latest civil year accepted by [`CalendarDate::new`].
pub const MAX_YEAR: i32 = 1600;

const GREGORIAN_DAYS_BEFORE_MONTH: [i64; 12] =
    [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// A validated Jalali civil date.
///
/// Field order makes the derived `Ord` chronological. Rendered as `YYYY/MM/DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

/// Integer encoding of a civil date (`year * 10000 + month * 100 + day`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SortKey(u32);

impl SortKey {
    /// Key given to malformed dates. Sorts before every valid date.
    pub const EPOCH_ZERO: SortKey = SortKey(0);

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ClinicLedgerError::DateOutOfRange(format!(
                "year {} is outside {}..={}",
                year, MIN_YEAR, MAX_YEAR
            )));
        }
        if !(1..=12).contains(&month) || day == 0 || day > Self::days_in_month(year, month) {
            return Err(ClinicLedgerError::InvalidCalendarDate(format!(
                "{:04}/{:02}/{:02}",
                year, month, day
            )));
        }
        Ok(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn sort_key(&self) -> SortKey {
        // Year is bounded by MAX_YEAR, so the product fits comfortably in u32.
        SortKey(self.year as u32 * 10_000 + self.month * 100 + self.day)
    }

    /// Leap years follow the 33-year grand cycle (8 leap years per cycle).
    pub fn is_leap_year(year: i32) -> bool {
        civil_day_number(year + 1, 1, 1) - civil_day_number(year, 1, 1) == 366
    }

    pub fn days_in_month(year: i32, month: u32) -> u32 {
        match month {
            1..=6 => 31,
            7..=11 => 30,
            12 if Self::is_leap_year(year) => 30,
            12 => 29,
            _ => 0,
        }
    }

    pub fn to_gregorian_triple(&self) -> (i32, u32, u32) {
        to_gregorian_triple(self.year, self.month, self.day)
    }

    pub fn to_naive_date(&self) -> Result<NaiveDate> {
        let (year, month, day) = self.to_gregorian_triple();
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ClinicLedgerError::DateOutOfRange(format!(
                "{} has no Gregorian equivalent ({}-{}-{})",
                self, year, month, day
            ))
        })
    }

    pub fn from_naive_date(date: NaiveDate) -> Result<Self> {
        let (year, month, day) = from_gregorian_triple(date.year(), date.month(), date.day());
        Self::new(year, month, day)
    }

    pub fn checked_sub_days(&self, days: u32) -> Result<Self> {
        let shifted = self
            .to_naive_date()?
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                ClinicLedgerError::DateOutOfRange(format!("{} minus {} days", self, days))
            })?;
        Self::from_naive_date(shifted)
    }

    pub fn checked_add_days(&self, days: u32) -> Result<Self> {
        let shifted = self
            .to_naive_date()?
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                ClinicLedgerError::DateOutOfRange(format!("{} plus {} days", self, days))
            })?;
        Self::from_naive_date(shifted)
    }

    /// Whole days from `self` to `other` (negative when `other` is earlier).
    pub fn days_until(&self, other: &CalendarDate) -> i64 {
        civil_day_number(other.year, other.month, other.day)
            - civil_day_number(self.year, self.month, self.day)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for CalendarDate {
    type Err = ClinicLedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ClinicLedgerError::InvalidCalendarDate(s.to_string());

        let normalized = normalize_digits(s.trim());
        let parts: Vec<&str> = normalized.split('/').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let segment = |part: &str| -> Option<u32> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse().ok()
        };

        match (segment(parts[0]), segment(parts[1]), segment(parts[2])) {
            (Some(year), Some(month), Some(day)) => {
                let year = i32::try_from(year).map_err(|_| invalid())?;
                Self::new(year, month, day).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = ClinicLedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CalendarDate> for String {
    fn from(date: CalendarDate) -> Self {
        date.to_string()
    }
}

/// The date carried by a source record.
///
/// Source records come from an external store and may hold anything in their
/// date field. Parsing happens once, here; a malformed value is kept verbatim so
/// the record still shows up in lists, ordered first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordDate {
    Valid(CalendarDate),
    Malformed(String),
}

impl RecordDate {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<CalendarDate>() {
            Ok(date) => RecordDate::Valid(date),
            Err(_) => RecordDate::Malformed(raw.to_string()),
        }
    }

    pub fn sort_key(&self) -> SortKey {
        match self {
            RecordDate::Valid(date) => date.sort_key(),
            RecordDate::Malformed(_) => SortKey::EPOCH_ZERO,
        }
    }

    pub fn calendar_date(&self) -> Option<CalendarDate> {
        match self {
            RecordDate::Valid(date) => Some(*date),
            RecordDate::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RecordDate::Malformed(_))
    }
}

impl fmt::Display for RecordDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDate::Valid(date) => date.fmt(f),
            RecordDate::Malformed(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for RecordDate {
    fn from(raw: String) -> Self {
        RecordDate::parse(&raw)
    }
}

impl From<&str> for RecordDate {
    fn from(raw: &str) -> Self {
        RecordDate::parse(raw)
    }
}

impl From<CalendarDate> for RecordDate {
    fn from(date: CalendarDate) -> Self {
        RecordDate::Valid(date)
    }
}

impl From<RecordDate> for String {
    fn from(date: RecordDate) -> Self {
        date.to_string()
    }
}

impl JsonSchema for RecordDate {
    fn schema_name() -> String {
        "RecordDate".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// Sort key of a raw `YYYY/MM/DD` string; [`SortKey::EPOCH_ZERO`] if it does not parse.
pub fn to_sort_key(raw: &str) -> SortKey {
    raw.parse::<CalendarDate>()
        .map(|date| date.sort_key())
        .unwrap_or(SortKey::EPOCH_ZERO)
}

/// Days elapsed on the proleptic Gregorian count used by both conversions.
fn civil_day_number(year: i32, month: u32, day: u32) -> i64 {
    let y = i64::from(year) + 1595;
    let month = i64::from(month);
    let month_offset = if month < 7 {
        (month - 1) * 31
    } else {
        (month - 7) * 30 + 186
    };

    -355_668
        + 365 * y
        + y.div_euclid(33) * 8
        + (y.rem_euclid(33) + 3).div_euclid(4)
        + i64::from(day)
        + month_offset
}

fn is_gregorian_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Converts a civil date to its Gregorian `(year, month, day)`.
pub fn to_gregorian_triple(year: i32, month: u32, day: u32) -> (i32, u32, u32) {
    let mut days = civil_day_number(year, month, day);

    let mut gy = 400 * days.div_euclid(146_097);
    days = days.rem_euclid(146_097);

    if days > 36_524 {
        days -= 1;
        gy += 100 * days.div_euclid(36_524);
        days = days.rem_euclid(36_524);
        if days >= 365 {
            days += 1;
        }
    }

    gy += 4 * days.div_euclid(1461);
    days = days.rem_euclid(1461);

    if days > 365 {
        gy += (days - 1).div_euclid(365);
        days = (days - 1).rem_euclid(365);
    }

    let gy = gy as i32;
    let february = if is_gregorian_leap_year(gy) { 29 } else { 28 };
    let month_lengths = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut gd = days + 1;
    let mut gm = 1;
    for length in month_lengths {
        if gd <= length {
            break;
        }
        gd -= length;
        gm += 1;
    }

    (gy, gm, gd as u32)
}

/// Converts a Gregorian date to its civil `(year, month, day)`.
pub fn from_gregorian_triple(year: i32, month: u32, day: u32) -> (i32, u32, u32) {
    let gy = i64::from(year);
    let month = month.clamp(1, 12);
    let gy2 = if month > 2 { gy + 1 } else { gy };

    let mut days = 355_666
        + 365 * gy
        + (gy2 + 3).div_euclid(4)
        - (gy2 + 99).div_euclid(100)
        + (gy2 + 399).div_euclid(400)
        + i64::from(day)
        + GREGORIAN_DAYS_BEFORE_MONTH[(month - 1) as usize];

    let mut jy = -1595 + 33 * days.div_euclid(12_053);
    days = days.rem_euclid(12_053);

    jy += 4 * days.div_euclid(1461);
    days = days.rem_euclid(1461);

    if days > 365 {
        jy += (days - 1).div_euclid(365);
        days = (days - 1).rem_euclid(365);
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    (jy as i32, jm as u32, jd as u32)
}

/// Civil date for a Gregorian date, used to derive "today".
pub fn format_civil(date: NaiveDate) -> Result<CalendarDate> {
    CalendarDate::from_naive_date(date)
}

pub fn today_civil() -> Result<CalendarDate> {
    format_civil(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> CalendarDate {
        raw.parse().unwrap()
    }

    // Nowruz (1 Farvardin) of each decade and a few fixed events.
    const REFERENCE: &[((i32, u32, u32), (i32, u32, u32))] = &[
        ((1300, 1, 1), (1921, 3, 21)),
        ((1310, 1, 1), (1931, 3, 22)),
        ((1320, 1, 1), (1941, 3, 21)),
        ((1330, 1, 1), (1951, 3, 22)),
        ((1340, 1, 1), (1961, 3, 21)),
        ((1350, 1, 1), (1971, 3, 21)),
        ((1360, 1, 1), (1981, 3, 21)),
        ((1370, 1, 1), (1991, 3, 21)),
        ((1380, 1, 1), (2001, 3, 21)),
        ((1390, 1, 1), (2011, 3, 21)),
        ((1400, 1, 1), (2021, 3, 21)),
        ((1410, 1, 1), (2031, 3, 21)),
        ((1420, 1, 1), (2041, 3, 20)),
        ((1430, 1, 1), (2051, 3, 21)),
        ((1440, 1, 1), (2061, 3, 20)),
        ((1450, 1, 1), (2071, 3, 21)),
        ((1460, 1, 1), (2081, 3, 20)),
        ((1470, 1, 1), (2091, 3, 21)),
        ((1480, 1, 1), (2101, 3, 21)),
        ((1490, 1, 1), (2111, 3, 21)),
        ((1500, 1, 1), (2121, 3, 21)),
        ((1357, 11, 22), (1979, 2, 11)),
        ((1399, 1, 1), (2020, 3, 20)),
        ((1403, 1, 1), (2024, 3, 20)),
        ((1402, 12, 29), (2024, 3, 19)),
        ((1403, 6, 31), (2024, 9, 21)),
        ((1403, 7, 1), (2024, 9, 22)),
        ((1403, 12, 30), (2025, 3, 20)),
    ];

    #[test]
    fn test_to_gregorian_matches_reference() {
        for &((jy, jm, jd), expected) in REFERENCE {
            assert_eq!(
                to_gregorian_triple(jy, jm, jd),
                expected,
                "{}/{}/{} converted incorrectly",
                jy,
                jm,
                jd
            );
        }
    }

    #[test]
    fn test_from_gregorian_round_trips_reference() {
        for &(civil, (gy, gm, gd)) in REFERENCE {
            assert_eq!(from_gregorian_triple(gy, gm, gd), civil);
        }
    }

    #[test]
    fn test_consecutive_days_map_to_consecutive_gregorian_days() {
        let mut current = date("1402/11/25");
        let mut gregorian = current.to_naive_date().unwrap();
        for _ in 0..500 {
            let next = current.checked_add_days(1).unwrap();
            let next_gregorian = next.to_naive_date().unwrap();
            assert_eq!((next_gregorian - gregorian).num_days(), 1);
            current = next;
            gregorian = next_gregorian;
        }
    }

    #[test]
    fn test_sort_key_strictly_increasing() {
        let mut current = date("1401/10/01");
        let mut previous_key = current.sort_key();
        for _ in 0..900 {
            current = current.checked_add_days(1).unwrap();
            let key = current.sort_key();
            assert!(key > previous_key, "{} did not sort after previous day", current);
            previous_key = key;
        }
    }

    #[test]
    fn test_sort_key_across_year_boundary() {
        assert!(to_sort_key("1402/12/29") < to_sort_key("1403/01/01"));
        assert!(to_sort_key("1403/06/31") < to_sort_key("1403/07/01"));
        assert!(to_sort_key("1403/1/9") < to_sort_key("1403/1/10"));
        assert_eq!(to_sort_key("1403/01/05").value(), 14_030_105);
    }

    #[test]
    fn test_sort_key_fails_soft() {
        assert_eq!(to_sort_key(""), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("1403/01"), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("1403/01/01/02"), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("1403/aa/01"), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("1403/-1/01"), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("1403/13/01"), SortKey::EPOCH_ZERO);
        assert_eq!(to_sort_key("2024-03-20"), SortKey::EPOCH_ZERO);
    }

    #[test]
    fn test_persian_digits_parse() {
        assert_eq!(to_sort_key("۱۴۰۳/۰۱/۰۵").value(), 14_030_105);
    }

    #[test]
    fn test_leap_years_follow_cycle() {
        assert!(CalendarDate::is_leap_year(1399));
        assert!(CalendarDate::is_leap_year(1403));
        assert!(!CalendarDate::is_leap_year(1400));
        assert!(!CalendarDate::is_leap_year(1402));
        assert!(CalendarDate::new(1403, 12, 30).is_ok());
        assert!(CalendarDate::new(1402, 12, 30).is_err());
    }

    #[test]
    fn test_display_is_zero_padded() {
        let d = CalendarDate::new(1403, 2, 7).unwrap();
        assert_eq!(d.to_string(), "1403/02/07");
        assert_eq!(date("1403/2/7"), d);
    }

    #[test]
    fn test_day_arithmetic_crosses_year() {
        let d = date("1403/01/01");
        assert_eq!(d.checked_sub_days(1).unwrap(), date("1402/12/29"));
        assert_eq!(d.checked_sub_days(29).unwrap(), date("1402/12/01"));
        assert_eq!(d.checked_sub_days(30).unwrap(), date("1402/11/30"));
        assert_eq!(date("1402/12/29").checked_add_days(1).unwrap(), d);
        assert_eq!(date("1402/12/01").days_until(&d), 29);
    }

    #[test]
    fn test_record_date_keeps_malformed_raw() {
        let record = RecordDate::parse("not a date");
        assert!(record.is_malformed());
        assert_eq!(record.sort_key(), SortKey::EPOCH_ZERO);
        assert_eq!(record.to_string(), "not a date");

        let json = serde_json::to_string(&RecordDate::parse("1403/5/1")).unwrap();
        assert_eq!(json, "\"1403/05/01\"");
    }

    #[test]
    fn test_format_civil() {
        let g = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert_eq!(format_civil(g).unwrap(), date("1403/01/01"));
    }
}
