use crate::calendar::{CalendarDate, SortKey};
use crate::config::AlertConfig;
use crate::error::Result;
use crate::schema::{
    ClinicSnapshot, Due, DueKind, DueStatus, InventoryItem, Invoice, InvoiceStatus, Payslip,
    PayslipStatus,
};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTargetKind {
    InventoryItem,
    Payable,
    Receivable,
    Payslip,
    Invoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertTarget {
    pub kind: AlertTargetKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    pub severity: Severity,
    pub target: AlertTarget,
}

impl Alert {
    fn new(severity: Severity, kind: AlertTargetKind, id: &str, message: String) -> Self {
        Self {
            message,
            severity,
            target: AlertTarget {
                kind,
                id: id.to_string(),
            },
        }
    }
}

/// The entity lists scanned by the evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertInputs<'a> {
    pub inventory: &'a [InventoryItem],
    pub dues: &'a [Due],
    pub payslips: &'a [Payslip],
    pub invoices: &'a [Invoice],
}

impl<'a> AlertInputs<'a> {
    pub fn from_snapshot(snapshot: &'a ClinicSnapshot) -> Self {
        Self {
            inventory: &snapshot.inventory,
            dues: &snapshot.dues,
            payslips: &snapshot.payslips,
            invoices: &snapshot.invoices,
        }
    }
}

pub fn low_inventory_alerts(items: &[InventoryItem]) -> Vec<Alert> {
    items
        .iter()
        .filter_map(|item| {
            if item.quantity <= 0.0 {
                Some(Alert::new(
                    Severity::Danger,
                    AlertTargetKind::InventoryItem,
                    &item.id,
                    format!("{} is out of stock", item.name),
                ))
            } else if item.quantity <= item.reorder_point {
                Some(Alert::new(
                    Severity::Warning,
                    AlertTargetKind::InventoryItem,
                    &item.id,
                    format!(
                        "{} is low on stock ({} left, reorder point {})",
                        item.name, item.quantity, item.reorder_point
                    ),
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Pending dues at or past their due date are dangers; pending dues falling
/// due within `due_soon_days` are warnings.
pub fn due_alerts(dues: &[Due], today: CalendarDate, due_soon_days: u32) -> Result<Vec<Alert>> {
    let today_key = today.sort_key();
    let soon_key = if due_soon_days > 0 {
        Some(today.checked_add_days(due_soon_days)?.sort_key())
    } else {
        None
    };

    let alerts = dues
        .iter()
        .filter(|due| due.status == DueStatus::Pending)
        .filter_map(|due| {
            let key = due.due_date.sort_key();
            let (kind, noun) = match due.kind {
                DueKind::Payable => (AlertTargetKind::Payable, "Payable"),
                DueKind::Receivable => (AlertTargetKind::Receivable, "Receivable"),
            };

            if key <= today_key {
                Some(Alert::new(
                    Severity::Danger,
                    kind,
                    &due.id,
                    format!(
                        "{} {} of {} was due on {}",
                        noun, due.id, due.amount, due.due_date
                    ),
                ))
            } else if soon_key.is_some_and(|soon| key <= soon) {
                Some(Alert::new(
                    Severity::Warning,
                    kind,
                    &due.id,
                    format!(
                        "{} {} of {} is due on {}",
                        noun, due.id, due.amount, due.due_date
                    ),
                ))
            } else {
                None
            }
        })
        .collect();

    Ok(alerts)
}

pub fn payroll_alerts(payslips: &[Payslip]) -> Vec<Alert> {
    payslips
        .iter()
        .filter(|slip| slip.status == PayslipStatus::AwaitingPayment)
        .map(|slip| {
            Alert::new(
                Severity::Warning,
                AlertTargetKind::Payslip,
                &slip.id,
                format!(
                    "Payslip for {} ({}) is awaiting payment",
                    slip.employee_name, slip.period
                ),
            )
        })
        .collect()
}

/// Unpaid invoices issued strictly before `today - overdue_days`.
pub fn overdue_invoice_alerts(
    invoices: &[Invoice],
    today: CalendarDate,
    overdue_days: u32,
) -> Result<Vec<Alert>> {
    let cutoff: SortKey = today.checked_sub_days(overdue_days)?.sort_key();

    Ok(invoices
        .iter()
        .filter(|invoice| invoice.status != InvoiceStatus::Paid)
        .filter(|invoice| invoice.date.sort_key() < cutoff)
        .map(|invoice| {
            Alert::new(
                Severity::Danger,
                AlertTargetKind::Invoice,
                &invoice.id,
                format!(
                    "Invoice {} for {} issued on {} is still unpaid",
                    invoice.id, invoice.recipient_name, invoice.date
                ),
            )
        })
        .collect())
}

/// Runs every enabled alert category. Categories are independent; the output
/// lists them in a fixed order: inventory, dues, payroll, invoices.
pub fn evaluate_alerts(
    inputs: AlertInputs<'_>,
    today: CalendarDate,
    config: &AlertConfig,
) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();

    if config.low_inventory {
        alerts.extend(low_inventory_alerts(inputs.inventory));
    }
    if config.overdue_dues {
        alerts.extend(due_alerts(inputs.dues, today, config.due_soon_days)?);
    }
    if config.pending_payroll {
        alerts.extend(payroll_alerts(inputs.payslips));
    }
    if config.overdue_invoices {
        alerts.extend(overdue_invoice_alerts(
            inputs.invoices,
            today,
            config.overdue_invoice_days,
        )?);
    }

    debug!("Evaluated {} alerts for {}", alerts.len(), today);
    Ok(alerts)
}
