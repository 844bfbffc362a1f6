//! # Clinic Ledger
//!
//! The financial aggregation core of a clinic accounting application. It turns a
//! read-only snapshot of payments, expenses, invoices and dues into dashboard
//! figures keyed by the Jalali civil calendar.
//!
//! ## Core Concepts
//!
//! - **Civil dates**: every stored date is Jalali (`YYYY/MM/DD`); ordering goes
//!   through an integer [`SortKey`], never through string or Gregorian comparison
//! - **Unified transactions**: payments, expenses and paid invoices projected into
//!   one inflow/outflow shape
//! - **Period windows**: closed date ranges ending a number of days before "today",
//!   plus dense day/week/month series with no gaps
//! - **Rollups**: an account's balance plus the balances of all its descendants
//! - **Degrade, never crash**: malformed dates sort first, dangling references fall
//!   back to a generic label or the raw id, empty windows total zero
//!
//! ## Example
//!
//! ```rust,ignore
//! use clinic_ledger::*;
//!
//! let snapshot = ClinicSnapshot::from_json_str(&std::fs::read_to_string("snapshot.json")?)?;
//! let config = ReportConfig::default();
//! let today: CalendarDate = "1403/05/10".parse()?;
//!
//! let report = process_dashboard(&snapshot, &config, today)?;
//! for kpi in &report.kpis {
//!     println!("{}: {:.0} ({})", kpi.title, kpi.value, kpi.trend.describe());
//! }
//! ```

pub mod alerts;
pub mod cache;
pub mod calendar;
pub mod chart_of_accounts;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod kpi;
pub mod schema;
pub mod unifier;
pub mod utils;
pub mod window;

pub use alerts::{evaluate_alerts, Alert, AlertInputs, AlertTarget, AlertTargetKind, Severity};
pub use cache::ReportCache;
pub use calendar::{
    format_civil, from_gregorian_triple, to_gregorian_triple, to_sort_key, today_civil,
    CalendarDate, RecordDate, SortKey,
};
pub use chart_of_accounts::AccountTree;
pub use config::{AlertConfig, ReportConfig, UnifyOptions};
pub use error::{ClinicLedgerError, Result};
pub use ingestion::{
    convert_statement_to_payments, StatementAmounts, StatementImport, StatementRow,
};
pub use kpi::{build_kpis, trend, Kpi, Trend, TrendDirection};
pub use schema::*;
pub use unifier::{
    calendar_events, unify, unify_snapshot, CalendarEvent, CalendarEventKind, Direction, Lookups,
    SourceKind, UnifiedTransaction,
};
pub use window::{Bucket, ComparisonSet, Granularity, PeriodWindow, WindowComparison, WindowEngine};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the presentation layer needs for one dashboard render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub generated_for: CalendarDate,
    pub snapshot_version: u64,
    /// Newest first.
    pub transactions: Vec<UnifiedTransaction>,
    pub comparisons: ComparisonSet,
    /// Monthly window against the previous one.
    pub kpis: Vec<Kpi>,
    pub daily_series: Vec<Bucket>,
    pub weekly_series: Vec<Bucket>,
    pub monthly_series: Vec<Bucket>,
    pub account_balances: BTreeMap<String, f64>,
    pub alerts: Vec<Alert>,
    /// `kind:id` of every source record whose date could not be parsed.
    pub malformed_dates: Vec<String>,
}

pub struct DashboardProcessor;

impl DashboardProcessor {
    pub fn process(
        snapshot: &ClinicSnapshot,
        config: &ReportConfig,
        today: CalendarDate,
    ) -> Result<DashboardReport> {
        config.validate()?;

        info!(
            "Building dashboard for {} from snapshot v{}",
            today, snapshot.version
        );
        debug!(
            "Snapshot contains {} payments, {} expenses, {} invoices, {} dues and {} accounts",
            snapshot.payments.len(),
            snapshot.expenses.len(),
            snapshot.invoices.len(),
            snapshot.dues.len(),
            snapshot.accounts.len()
        );

        let malformed_dates = collect_malformed_dates(snapshot);
        if !malformed_dates.is_empty() {
            warn!(
                "{} records have malformed dates and will sort first: {}",
                malformed_dates.len(),
                malformed_dates.join(", ")
            );
        }

        let transactions = unify_snapshot(snapshot, &config.unify);

        let (comparisons, daily_series, weekly_series, monthly_series) = {
            let engine = WindowEngine::new(&transactions, &snapshot.invoices);
            (
                engine.comparisons(today)?,
                engine.buckets(today, Granularity::Day, config.daily_buckets)?,
                engine.buckets(today, Granularity::Week, config.weekly_buckets)?,
                engine.buckets(today, Granularity::Month, config.monthly_buckets)?,
            )
        };

        let kpis = build_kpis(
            &comparisons.monthly.current,
            &comparisons.monthly.previous,
            config.break_even_days,
        );

        let tree = AccountTree::from_nodes(&snapshot.accounts);
        let account_balances = tree.rolled_up_balances(|id| snapshot.ledger_balance(id));

        let alerts = evaluate_alerts(AlertInputs::from_snapshot(snapshot), today, &config.alerts)?;

        Ok(DashboardReport {
            generated_for: today,
            snapshot_version: snapshot.version,
            transactions,
            comparisons,
            kpis,
            daily_series,
            weekly_series,
            monthly_series,
            account_balances,
            alerts,
            malformed_dates,
        })
    }

    /// Same as [`DashboardProcessor::process`] with "today" taken from the host clock.
    pub fn process_today(
        snapshot: &ClinicSnapshot,
        config: &ReportConfig,
    ) -> Result<DashboardReport> {
        Self::process(snapshot, config, today_civil()?)
    }
}

pub fn process_dashboard(
    snapshot: &ClinicSnapshot,
    config: &ReportConfig,
    today: CalendarDate,
) -> Result<DashboardReport> {
    DashboardProcessor::process(snapshot, config, today)
}

fn collect_malformed_dates(snapshot: &ClinicSnapshot) -> Vec<String> {
    let payments = snapshot
        .payments
        .iter()
        .filter(|p| p.date.is_malformed())
        .map(|p| format!("payment:{}", p.id));
    let expenses = snapshot
        .expenses
        .iter()
        .filter(|e| e.date.is_malformed())
        .map(|e| format!("expense:{}", e.id));
    let invoices = snapshot
        .invoices
        .iter()
        .filter(|i| i.date.is_malformed())
        .map(|i| format!("invoice:{}", i.id));
    let dues = snapshot
        .dues
        .iter()
        .filter(|d| d.due_date.is_malformed())
        .map(|d| format!("due:{}", d.id));

    payments.chain(expenses).chain(invoices).chain(dues).collect()
}
