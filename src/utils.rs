use crate::calendar::CalendarDate;
use crate::error::{ClinicLedgerError, Result};

/// Maps Persian (U+06F0..) and Arabic-Indic (U+0660..) digits to ASCII digits.
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            _ => c,
        })
        .collect()
}

pub fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<CalendarDate> {
    CalendarDate::new(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<CalendarDate> {
    CalendarDate::new(year, month, CalendarDate::days_in_month(year, month))
}

/// Returns `(year, month)` of the `count` months ending with `end`'s month, oldest first.
pub fn trailing_months(end: &CalendarDate, count: usize) -> Vec<(i32, u32)> {
    let mut months: Vec<(i32, u32)> =
        std::iter::successors(Some((end.year(), end.month())), |&(year, month)| {
            Some(prev_month(year, month))
        })
        .take(count)
        .collect();
    months.reverse();
    months
}

fn parse_year_month(raw: &str, period: &str) -> Result<(i32, u32)> {
    let invalid = || ClinicLedgerError::InvalidPeriod(period.to_string());

    let normalized = normalize_digits(raw.trim());
    let mut parts = normalized.split('/');
    let (Some(year), Some(month), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Parses a period string in the format "YYYY/MM" or "YYYY/MM:YYYY/MM"
/// Returns (first day, last day) of the covered civil months
pub fn parse_period_string(period: &str) -> Result<(CalendarDate, CalendarDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let (start, end) = match parts.len() {
        1 => {
            let month = parse_year_month(parts[0], period)?;
            (month, month)
        }
        2 => (
            parse_year_month(parts[0], period)?,
            parse_year_month(parts[1], period)?,
        ),
        _ => return Err(ClinicLedgerError::InvalidPeriod(period.to_string())),
    };

    let start_date = first_day_of_month(start.0, start.1)?;
    let end_date = last_day_of_month(end.0, end.1)?;
    if end_date < start_date {
        return Err(ClinicLedgerError::InvalidPeriod(period.to_string()));
    }

    Ok((start_date, end_date))
}
