use crate::error::{ClinicLedgerError, Result};
use crate::window::Granularity;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const GENERIC_EXPENSE_CATEGORY: &str = "هزینه";

/// Toggles and thresholds for the alert evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub low_inventory: bool,
    pub overdue_dues: bool,
    pub pending_payroll: bool,
    pub overdue_invoices: bool,

    /// Age in days after which an unpaid invoice counts as overdue.
    pub overdue_invoice_days: u32,

    /// Pending dues falling due within this many days after today raise a warning.
    /// Zero disables the due-soon warning.
    pub due_soon_days: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            low_inventory: true,
            overdue_dues: true,
            pending_payroll: true,
            overdue_invoices: true,
            overdue_invoice_days: 30,
            due_soon_days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifyOptions {
    /// Category used when an expense points at an account that does not exist.
    pub generic_expense_category: String,

    /// Project the paid part of each invoice as an inflow.
    pub include_invoice_receipts: bool,
}

impl Default for UnifyOptions {
    fn default() -> Self {
        Self {
            generic_expense_category: GENERIC_EXPENSE_CATEGORY.to_string(),
            include_invoice_receipts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub alerts: AlertConfig,
    pub unify: UnifyOptions,

    /// Divisor turning a monthly expense total into a daily break-even figure.
    pub break_even_days: u32,

    pub daily_buckets: usize,
    pub weekly_buckets: usize,
    pub monthly_buckets: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            alerts: AlertConfig::default(),
            unify: UnifyOptions::default(),
            break_even_days: 30,
            daily_buckets: 7,
            weekly_buckets: 4,
            monthly_buckets: 6,
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.break_even_days == 0 {
            return Err(ClinicLedgerError::InvalidConfig(
                "break_even_days must be at least 1".to_string(),
            ));
        }

        for (name, count, granularity) in [
            ("daily_buckets", self.daily_buckets, Granularity::Day),
            ("weekly_buckets", self.weekly_buckets, Granularity::Week),
            ("monthly_buckets", self.monthly_buckets, Granularity::Month),
        ] {
            let max = granularity.max_buckets();
            if count == 0 || count > max {
                return Err(ClinicLedgerError::InvalidConfig(format!(
                    "{} must be between 1 and {}, got {}",
                    name, max, count
                )));
            }
        }

        if self.unify.generic_expense_category.trim().is_empty() {
            return Err(ClinicLedgerError::InvalidConfig(
                "generic_expense_category must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
