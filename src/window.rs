use crate::calendar::{CalendarDate, SortKey, MAX_YEAR, MIN_YEAR};
use crate::error::{ClinicLedgerError, Result};
use crate::schema::Invoice;
use crate::unifier::{Direction, UnifiedTransaction};
use crate::utils::{first_day_of_month, last_day_of_month, parse_period_string, trailing_months};
use log::debug;
use serde::{Deserialize, Serialize};

pub const DAY_WINDOW: u32 = 1;
pub const WEEK_WINDOW: u32 = 7;
pub const MONTH_WINDOW: u32 = 30;

/// Aggregates over a closed civil-date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub label: String,
    pub start: CalendarDate,
    pub end: CalendarDate,
    pub start_key: SortKey,
    pub end_key: SortKey,
    pub total_inflow: f64,
    pub total_outflow: f64,
    /// Ids of invoices dated inside the window.
    pub invoices_in_range: Vec<String>,
}

impl PeriodWindow {
    pub fn contains(&self, key: SortKey) -> bool {
        self.start_key <= key && key <= self.end_key
    }

    pub fn net(&self) -> f64 {
        self.total_inflow - self.total_outflow
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices_in_range.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowComparison {
    pub current: PeriodWindow,
    pub previous: PeriodWindow,
}

/// Current/previous windows for the day, week and month panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSet {
    pub daily: WindowComparison,
    pub weekly: WindowComparison,
    pub monthly: WindowComparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

const SUPPORTED_YEARS: usize = (MAX_YEAR - MIN_YEAR + 1) as usize;

impl Granularity {
    /// Most buckets of this size that fit in the supported civil years.
    pub fn max_buckets(self) -> usize {
        match self {
            Granularity::Day => SUPPORTED_YEARS * 366,
            Granularity::Week => SUPPORTED_YEARS * 53,
            Granularity::Month => SUPPORTED_YEARS * 12,
        }
    }
}

/// One entry of a dense time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub start: CalendarDate,
    pub end: CalendarDate,
    pub inflow: f64,
    pub outflow: f64,
}

/// Range queries over one snapshot's transactions and invoices.
///
/// Both collections are sorted by sort key once, on construction; every window
/// is then two binary searches plus a sum over the matching slice.
pub struct WindowEngine<'a> {
    transactions: Vec<&'a UnifiedTransaction>,
    invoices: Vec<(SortKey, &'a Invoice)>,
}

impl<'a> WindowEngine<'a> {
    pub fn new(transactions: &'a [UnifiedTransaction], invoices: &'a [Invoice]) -> Self {
        let mut sorted: Vec<&UnifiedTransaction> = transactions.iter().collect();
        sorted.sort_by_key(|tx| tx.sort_key);

        let mut keyed_invoices: Vec<(SortKey, &Invoice)> = invoices
            .iter()
            .map(|invoice| (invoice.date.sort_key(), invoice))
            .collect();
        keyed_invoices.sort_by_key(|(key, _)| *key);

        debug!(
            "Indexed {} transactions and {} invoices for window queries",
            sorted.len(),
            keyed_invoices.len()
        );

        Self {
            transactions: sorted,
            invoices: keyed_invoices,
        }
    }

    fn transactions_between(&self, start: SortKey, end: SortKey) -> &[&'a UnifiedTransaction] {
        if start > end {
            return &[];
        }
        let lo = self.transactions.partition_point(|tx| tx.sort_key < start);
        let hi = self.transactions.partition_point(|tx| tx.sort_key <= end);
        &self.transactions[lo..hi]
    }

    fn invoices_between(&self, start: SortKey, end: SortKey) -> &[(SortKey, &'a Invoice)] {
        if start > end {
            return &[];
        }
        let lo = self.invoices.partition_point(|(key, _)| *key < start);
        let hi = self.invoices.partition_point(|(key, _)| *key <= end);
        &self.invoices[lo..hi]
    }

    /// Aggregates the closed range `[start, end]`. An inverted range yields an empty window.
    pub fn window_between(
        &self,
        label: impl Into<String>,
        start: CalendarDate,
        end: CalendarDate,
    ) -> PeriodWindow {
        let start_key = start.sort_key();
        let end_key = end.sort_key();

        let (total_inflow, total_outflow) = self
            .transactions_between(start_key, end_key)
            .iter()
            .fold((0.0, 0.0), |(inflow, outflow), tx| match tx.direction {
                Direction::Inflow => (inflow + tx.amount, outflow),
                Direction::Outflow => (inflow, outflow + tx.amount),
            });

        let invoices_in_range = self
            .invoices_between(start_key, end_key)
            .iter()
            .map(|(_, invoice)| invoice.id.clone())
            .collect();

        PeriodWindow {
            label: label.into(),
            start,
            end,
            start_key,
            end_key,
            total_inflow,
            total_outflow,
            invoices_in_range,
        }
    }

    /// Window of `length_days` days ending `offset_days` before `base`.
    pub fn window(
        &self,
        base: CalendarDate,
        length_days: u32,
        offset_days: u32,
    ) -> Result<PeriodWindow> {
        if length_days == 0 {
            return Err(ClinicLedgerError::InvalidWindow(length_days));
        }

        let end = base.checked_sub_days(offset_days)?;
        let start = end.checked_sub_days(length_days - 1)?;
        let label = if length_days == 1 {
            end.to_string()
        } else {
            format!("{} - {}", start, end)
        };

        Ok(self.window_between(label, start, end))
    }

    /// A single civil day, `offset_days` before `base`.
    pub fn day(&self, base: CalendarDate, offset_days: u32) -> Result<PeriodWindow> {
        self.window(base, DAY_WINDOW, offset_days)
    }

    /// Window over a civil month or month range, e.g. `"1403/01"` or `"1403/01:1403/03"`.
    pub fn period(&self, period: &str) -> Result<PeriodWindow> {
        let (start, end) = parse_period_string(period)?;
        Ok(self.window_between(period, start, end))
    }

    pub fn compare(&self, base: CalendarDate, length_days: u32) -> Result<WindowComparison> {
        Ok(WindowComparison {
            current: self.window(base, length_days, 0)?,
            previous: self.window(base, length_days, length_days)?,
        })
    }

    pub fn comparisons(&self, base: CalendarDate) -> Result<ComparisonSet> {
        Ok(ComparisonSet {
            daily: self.compare(base, DAY_WINDOW)?,
            weekly: self.compare(base, WEEK_WINDOW)?,
            monthly: self.compare(base, MONTH_WINDOW)?,
        })
    }

    /// Dense trailing series of `count` buckets ending at `base`, oldest first.
    ///
    /// Day and week buckets are trailing 1- and 7-day windows. Month buckets are
    /// civil months, the newest one cut off at `base`. Buckets without
    /// transactions are still returned, with zero totals.
    pub fn buckets(
        &self,
        base: CalendarDate,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Bucket>> {
        if count == 0 || count > granularity.max_buckets() {
            return Err(ClinicLedgerError::InvalidBucketCount(count));
        }

        let mut buckets = match granularity {
            Granularity::Day => (0..count)
                .rev()
                .map(|i| -> Result<Bucket> {
                    let day = base.checked_sub_days(i as u32)?;
                    Ok(empty_bucket(day.to_string(), day, day))
                })
                .collect::<Result<Vec<_>>>()?,
            Granularity::Week => (0..count)
                .rev()
                .map(|i| -> Result<Bucket> {
                    let end = base.checked_sub_days((i as u32).saturating_mul(WEEK_WINDOW))?;
                    let start = end.checked_sub_days(WEEK_WINDOW - 1)?;
                    Ok(empty_bucket(format!("{} - {}", start, end), start, end))
                })
                .collect::<Result<Vec<_>>>()?,
            Granularity::Month => trailing_months(&base, count)
                .into_iter()
                .map(|(year, month)| -> Result<Bucket> {
                    let start = first_day_of_month(year, month)?;
                    let end = last_day_of_month(year, month)?.min(base);
                    Ok(empty_bucket(format!("{:04}/{:02}", year, month), start, end))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let span_start = buckets[0].start.sort_key();
        let span_end = buckets[buckets.len() - 1].end.sort_key();

        for tx in self.transactions_between(span_start, span_end) {
            let idx = buckets.partition_point(|b| b.start.sort_key() <= tx.sort_key) - 1;
            let bucket = &mut buckets[idx];
            if tx.sort_key > bucket.end.sort_key() {
                continue;
            }
            match tx.direction {
                Direction::Inflow => bucket.inflow += tx.amount,
                Direction::Outflow => bucket.outflow += tx.amount,
            }
        }

        Ok(buckets)
    }
}

fn empty_bucket(label: String, start: CalendarDate, end: CalendarDate) -> Bucket {
    Bucket {
        label,
        start,
        end,
        inflow: 0.0,
        outflow: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::RecordDate;
    use crate::schema::InvoiceStatus;
    use crate::unifier::SourceKind;

    fn date(raw: &str) -> CalendarDate {
        raw.parse().unwrap()
    }

    fn tx(id: &str, raw_date: &str, direction: Direction, amount: f64) -> UnifiedTransaction {
        let record = RecordDate::parse(raw_date);
        UnifiedTransaction {
            id: id.to_string(),
            original_id: id.to_string(),
            source_kind: SourceKind::Payment,
            sort_key: record.sort_key(),
            date: record,
            description: String::new(),
            amount,
            direction,
            category: String::new(),
            counterparty_name: String::new(),
            tags: vec![],
        }
    }

    fn invoice(id: &str, raw_date: &str) -> Invoice {
        Invoice {
            id: id.to_string(),
            date: RecordDate::parse(raw_date),
            status: InvoiceStatus::Unpaid,
            recipient_name: String::new(),
            patient_share: 100.0,
            paid_amount: 0.0,
        }
    }

    #[test]
    fn test_window_is_inclusive_on_both_ends() {
        // Window of 7 days ending 1403/01/03: 1402/12/26 ..= 1403/01/03.
        let txs = vec![
            tx("before", "1402/12/25", Direction::Inflow, 1.0),
            tx("start", "1402/12/26", Direction::Inflow, 10.0),
            tx("middle", "1403/01/01", Direction::Outflow, 5.0),
            tx("end", "1403/01/03", Direction::Inflow, 100.0),
            tx("after", "1403/01/04", Direction::Inflow, 1000.0),
        ];
        let engine = WindowEngine::new(&txs, &[]);

        let window = engine.window(date("1403/01/03"), 7, 0).unwrap();
        assert_eq!(window.start, date("1402/12/26"));
        assert_eq!(window.end, date("1403/01/03"));
        assert_eq!(window.total_inflow, 110.0);
        assert_eq!(window.total_outflow, 5.0);
        assert_eq!(window.net(), 105.0);
    }

    #[test]
    fn test_offset_shifts_window_into_past() {
        let txs = vec![
            tx("a", "1403/05/10", Direction::Inflow, 1.0),
            tx("b", "1403/05/03", Direction::Inflow, 2.0),
        ];
        let engine = WindowEngine::new(&txs, &[]);

        let previous = engine.window(date("1403/05/10"), 7, 7).unwrap();
        assert_eq!(previous.end, date("1403/05/03"));
        assert_eq!(previous.start, date("1403/04/28"));
        assert_eq!(previous.total_inflow, 2.0);
    }

    #[test]
    fn test_empty_window_is_valid() {
        let engine = WindowEngine::new(&[], &[]);
        let window = engine.window(date("1403/05/10"), 30, 0).unwrap();
        assert_eq!(window.total_inflow, 0.0);
        assert_eq!(window.total_outflow, 0.0);
        assert!(window.invoices_in_range.is_empty());
        assert!(window.start_key <= window.end_key);
    }

    #[test]
    fn test_zero_length_window_rejected() {
        let engine = WindowEngine::new(&[], &[]);
        assert!(matches!(
            engine.window(date("1403/05/10"), 0, 0),
            Err(ClinicLedgerError::InvalidWindow(0))
        ));
    }

    #[test]
    fn test_malformed_dates_never_fall_in_a_window() {
        let txs = vec![tx("bad", "??", Direction::Inflow, 50.0)];
        let engine = WindowEngine::new(&txs, &[]);
        let window = engine.window(date("1403/05/10"), 365, 0).unwrap();
        assert_eq!(window.total_inflow, 0.0);
    }

    #[test]
    fn test_invoices_in_range() {
        let invoices = vec![
            invoice("i1", "1403/05/01"),
            invoice("i2", "1403/05/10"),
            invoice("i3", "1403/04/30"),
        ];
        let engine = WindowEngine::new(&[], &invoices);
        let window = engine.period("1403/05").unwrap();
        assert_eq!(window.invoices_in_range, vec!["i1", "i2"]);
        assert_eq!(window.invoice_count(), 2);
    }

    #[test]
    fn test_day_lookup_and_comparisons() {
        let txs = vec![
            tx("today", "1403/05/10", Direction::Inflow, 30.0),
            tx("yesterday", "1403/05/09", Direction::Inflow, 20.0),
            tx("last-week", "1403/05/02", Direction::Outflow, 5.0),
        ];
        let engine = WindowEngine::new(&txs, &[]);

        let yesterday = engine.day(date("1403/05/10"), 1).unwrap();
        assert_eq!(yesterday.label, "1403/05/09");
        assert_eq!(yesterday.total_inflow, 20.0);

        let set = engine.comparisons(date("1403/05/10")).unwrap();
        assert_eq!(set.daily.current.total_inflow, 30.0);
        assert_eq!(set.daily.previous.total_inflow, 20.0);
        assert_eq!(set.weekly.current.total_inflow, 50.0);
        assert_eq!(set.weekly.previous.total_outflow, 5.0);
        assert_eq!(set.monthly.current.total_inflow, 50.0);
    }

    #[test]
    fn test_weekly_buckets_are_dense() {
        let txs = vec![
            tx("w4", "1403/05/28", Direction::Inflow, 4.0),
            tx("w3", "1403/05/20", Direction::Outflow, 3.0),
            tx("w2", "1403/05/14", Direction::Inflow, 2.0),
        ];
        let engine = WindowEngine::new(&txs, &[]);

        let buckets = engine
            .buckets(date("1403/05/28"), Granularity::Week, 4)
            .unwrap();
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].start, date("1403/05/01"));
        assert_eq!(buckets[0].inflow, 0.0);
        assert_eq!(buckets[0].outflow, 0.0);
        assert_eq!(buckets[1].inflow, 2.0);
        assert_eq!(buckets[2].outflow, 3.0);
        assert_eq!(buckets[3].inflow, 4.0);
        assert_eq!(buckets[3].end, date("1403/05/28"));
    }

    #[test]
    fn test_each_transaction_lands_in_one_bucket() {
        let txs: Vec<UnifiedTransaction> = (1..=31)
            .map(|d| tx(&d.to_string(), &format!("1403/01/{:02}", d), Direction::Inflow, 1.0))
            .collect();
        let engine = WindowEngine::new(&txs, &[]);

        let buckets = engine
            .buckets(date("1403/01/31"), Granularity::Day, 10)
            .unwrap();
        assert_eq!(buckets.len(), 10);
        assert!(buckets.iter().all(|b| b.inflow == 1.0));
        assert_eq!(buckets[0].label, "1403/01/22");

        let weekly = engine
            .buckets(date("1403/01/31"), Granularity::Week, 4)
            .unwrap();
        let total: f64 = weekly.iter().map(|b| b.inflow).sum();
        assert_eq!(total, 28.0);
    }

    #[test]
    fn test_monthly_buckets_cross_year() {
        let txs = vec![
            tx("a", "1402/12/29", Direction::Inflow, 10.0),
            tx("b", "1403/01/15", Direction::Outflow, 4.0),
            tx("future", "1403/02/20", Direction::Inflow, 99.0),
        ];
        let engine = WindowEngine::new(&txs, &[]);

        let buckets = engine
            .buckets(date("1403/02/10"), Granularity::Month, 3)
            .unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1402/12", "1403/01", "1403/02"]);
        assert_eq!(buckets[0].inflow, 10.0);
        assert_eq!(buckets[1].outflow, 4.0);
        assert_eq!(buckets[2].end, date("1403/02/10"));
        assert_eq!(buckets[2].inflow, 0.0);
    }

    #[test]
    fn test_zero_buckets_rejected() {
        let engine = WindowEngine::new(&[], &[]);
        assert!(engine
            .buckets(date("1403/02/10"), Granularity::Day, 0)
            .is_err());
    }

    #[test]
    fn test_bucket_count_beyond_calendar_span_rejected() {
        let engine = WindowEngine::new(&[], &[]);
        for granularity in [Granularity::Day, Granularity::Week, Granularity::Month] {
            assert!(matches!(
                engine.buckets(date("1403/05/10"), granularity, usize::MAX),
                Err(ClinicLedgerError::InvalidBucketCount(usize::MAX))
            ));
            let past_limit = granularity.max_buckets() + 1;
            assert!(matches!(
                engine.buckets(date("1403/05/10"), granularity, past_limit),
                Err(ClinicLedgerError::InvalidBucketCount(_))
            ));
        }

        // Within the bound but reaching before the first supported year.
        assert!(matches!(
            engine.buckets(
                date("1403/05/10"),
                Granularity::Month,
                Granularity::Month.max_buckets()
            ),
            Err(ClinicLedgerError::DateOutOfRange(_))
        ));
    }
}
