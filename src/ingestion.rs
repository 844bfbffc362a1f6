//! Bank statement rows to payment records.
//!
//! Two statement layouts exist and each has its own direction policy:
//!
//! - **Single column**: one signed amount. Negative is money out, positive is money in.
//! - **Debit/credit**: two unsigned columns. Whichever column is larger wins.
//!
//! The policies disagree on edge rows, so they are kept apart. Rows where a
//! policy cannot decide (a zero amount, equal debit and credit) are reported as
//! ambiguous instead of being guessed.

use crate::calendar::RecordDate;
use crate::schema::{Payment, PaymentKind};
use crate::utils::normalize_digits;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum StatementAmounts {
    SingleColumn { amount: String },
    DebitCredit { debit: String, credit: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub date: String,
    pub description: String,
    pub amounts: StatementAmounts,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    /// 1-based position of the row in the statement.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementImport {
    pub payments: Vec<Payment>,
    pub ambiguous: Vec<RowIssue>,
    pub errors: Vec<RowIssue>,
}

/// Parses a bank amount: currency text and thousands separators are dropped,
/// Persian digits and separators are understood, `(123)` means negative.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let normalized = normalize_digits(raw.trim())
        .replace('\u{066C}', ",")
        .replace('\u{066B}', ".");

    let negative = normalized.starts_with('-')
        || normalized.ends_with('-')
        || (normalized.starts_with('(') && normalized.ends_with(')'));

    let decimal_char = decimal_separator(&normalized);

    let mut digits = String::new();
    let mut has_decimal = false;
    for c in normalized.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if Some(c) == decimal_char && !has_decimal {
            digits.push('.');
            has_decimal = true;
        }
    }

    if digits.is_empty() || digits == "." {
        return None;
    }

    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// The last separator is the decimal mark, unless it is the only kind present
/// and is followed by exactly three digits (a thousands separator).
fn decimal_separator(amount: &str) -> Option<char> {
    let last_dot = amount.rfind('.');
    let last_comma = amount.rfind(',');

    let (pos, sep, only_kind) = match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => (d, '.', false),
        (Some(_), Some(c)) => (c, ',', false),
        (Some(d), None) => (d, '.', true),
        (None, Some(c)) => (c, ',', true),
        (None, None) => return None,
    };

    let trailing_digits = amount[pos + 1..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let repeated = amount.matches(sep).count() > 1;

    if only_kind && (repeated || trailing_digits == 3) {
        None
    } else {
        Some(sep)
    }
}

/// Single-column policy: the sign decides. Zero is undecidable.
pub fn infer_single_column(amount: f64) -> Option<(PaymentKind, f64)> {
    if amount > 0.0 {
        Some((PaymentKind::Receipt, amount))
    } else if amount < 0.0 {
        Some((PaymentKind::Disbursement, -amount))
    } else {
        None
    }
}

/// Debit/credit policy: the larger column decides. Equal columns are undecidable.
pub fn infer_debit_credit(debit: f64, credit: f64) -> Option<(PaymentKind, f64)> {
    let debit = debit.abs();
    let credit = credit.abs();
    if credit > debit {
        Some((PaymentKind::Receipt, credit))
    } else if debit > credit {
        Some((PaymentKind::Disbursement, debit))
    } else {
        None
    }
}

enum RowOutcome {
    Resolved(PaymentKind, f64),
    Ambiguous(String),
    Invalid(String),
}

fn classify(amounts: &StatementAmounts) -> RowOutcome {
    match amounts {
        StatementAmounts::SingleColumn { amount } => match parse_amount(amount) {
            None => RowOutcome::Invalid(format!("Invalid amount '{}'", amount)),
            Some(value) => match infer_single_column(value) {
                Some((kind, magnitude)) => RowOutcome::Resolved(kind, magnitude),
                None => RowOutcome::Ambiguous("Zero amount has no direction".to_string()),
            },
        },
        StatementAmounts::DebitCredit { debit, credit } => {
            // An empty column is a zero column; text that is not a number is an error.
            let column = |raw: &str| -> Option<f64> {
                if raw.trim().is_empty() {
                    Some(0.0)
                } else {
                    parse_amount(raw)
                }
            };
            match (column(debit), column(credit)) {
                (Some(d), Some(c)) => match infer_debit_credit(d, c) {
                    Some((kind, magnitude)) => RowOutcome::Resolved(kind, magnitude),
                    None => RowOutcome::Ambiguous(format!(
                        "Debit ({}) equals credit ({})",
                        d, c
                    )),
                },
                _ => RowOutcome::Invalid(format!(
                    "Invalid debit/credit pair '{}' / '{}'",
                    debit, credit
                )),
            }
        }
    }
}

/// Converts statement rows into payments against `account_id`.
///
/// Malformed dates are kept (they sort first downstream); ambiguous and
/// unparseable amounts are collected instead of imported.
pub fn convert_statement_to_payments(
    rows: &[StatementRow],
    account_id: &str,
    counterparty_id: &str,
) -> StatementImport {
    let mut import = StatementImport::default();

    for (i, row) in rows.iter().enumerate() {
        let row_number = i + 1;
        match classify(&row.amounts) {
            RowOutcome::Resolved(kind, amount) => {
                let id = row
                    .reference
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| format!("statement-{}", row_number));
                import.payments.push(Payment {
                    id,
                    date: RecordDate::parse(&row.date),
                    description: row.description.clone(),
                    amount,
                    direction: kind,
                    entity_id: counterparty_id.to_string(),
                    account_id: Some(account_id.to_string()),
                    tags: vec!["imported".to_string()],
                });
            }
            RowOutcome::Ambiguous(reason) => {
                debug!("Statement row {} is ambiguous: {}", row_number, reason);
                import.ambiguous.push(RowIssue {
                    row: row_number,
                    reason,
                });
            }
            RowOutcome::Invalid(reason) => {
                debug!("Statement row {} rejected: {}", row_number, reason);
                import.errors.push(RowIssue {
                    row: row_number,
                    reason,
                });
            }
        }
    }

    import
}
