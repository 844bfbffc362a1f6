use crate::window::PeriodWindow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Rounded magnitude of the relative change; `None` when there is no baseline.
    pub percent: Option<u32>,
}

impl Trend {
    /// Human readable change, e.g. "up 10%". Empty when there is nothing to show.
    pub fn describe(&self) -> String {
        match (self.direction, self.percent) {
            (TrendDirection::Up, Some(p)) => format!("up {}%", p),
            (TrendDirection::Down, Some(p)) => format!("down {}%", p),
            _ => String::new(),
        }
    }
}

/// Classifies the change from `previous` to `current`.
///
/// Changes under one percent are neutral. A zero baseline has no percentage.
pub fn trend(current: f64, previous: f64) -> Trend {
    if previous == 0.0 {
        let direction = if current > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Neutral
        };
        return Trend {
            direction,
            percent: None,
        };
    }

    let change = (current - previous) / previous.abs() * 100.0;
    if change.abs() < 1.0 {
        return Trend {
            direction: TrendDirection::Neutral,
            percent: None,
        };
    }

    Trend {
        direction: if change > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        },
        percent: Some(change.abs().round() as u32),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub title: String,
    pub value: f64,
    pub previous_value: f64,
    pub trend: Trend,
}

impl Kpi {
    pub fn new(title: impl Into<String>, value: f64, previous_value: f64) -> Self {
        Self {
            title: title.into(),
            value,
            previous_value,
            trend: trend(value, previous_value),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Profit over income; zero when there is no income.
pub fn profit_margin(window: &PeriodWindow) -> f64 {
    ratio(window.net(), window.total_inflow)
}

pub fn average_revenue_per_invoice(window: &PeriodWindow) -> f64 {
    ratio(window.total_inflow, window.invoice_count() as f64)
}

/// Income needed per day to cover the window's expenses.
pub fn daily_break_even(window: &PeriodWindow, days: u32) -> f64 {
    ratio(window.total_outflow, f64::from(days))
}

/// The dashboard KPI row for a current window against its predecessor.
pub fn build_kpis(current: &PeriodWindow, previous: &PeriodWindow, break_even_days: u32) -> Vec<Kpi> {
    vec![
        Kpi::new("Income", current.total_inflow, previous.total_inflow),
        Kpi::new("Expenses", current.total_outflow, previous.total_outflow),
        Kpi::new("Net profit", current.net(), previous.net()),
        Kpi::new(
            "Profit margin (%)",
            profit_margin(current) * 100.0,
            profit_margin(previous) * 100.0,
        ),
        Kpi::new(
            "Average revenue per invoice",
            average_revenue_per_invoice(current),
            average_revenue_per_invoice(previous),
        ),
        Kpi::new(
            "Daily break-even",
            daily_break_even(current, break_even_days),
            daily_break_even(previous, break_even_days),
        ),
    ]
}
