//! Projection of payments, expenses and invoices into one transaction shape.

use crate::calendar::{CalendarDate, RecordDate, SortKey};
use crate::config::UnifyOptions;
use crate::schema::{
    AccountNode, ClinicSnapshot, Due, DueKind, Expense, Invoice, Payment, PaymentKind,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inflow,
    Outflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Payment,
    Expense,
    Invoice,
}

impl SourceKind {
    fn prefix(self) -> &'static str {
        match self {
            SourceKind::Payment => "payment",
            SourceKind::Expense => "expense",
            SourceKind::Invoice => "invoice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTransaction {
    /// Unique across source kinds, e.g. `payment-17`.
    pub id: String,
    pub original_id: String,
    pub source_kind: SourceKind,
    pub date: RecordDate,
    pub sort_key: SortKey,
    pub description: String,
    /// Always non-negative; the sign lives in `direction`.
    pub amount: f64,
    pub direction: Direction,
    pub category: String,
    pub counterparty_name: String,
    pub tags: Vec<String>,
}

impl UnifiedTransaction {
    fn new(
        source_kind: SourceKind,
        original_id: &str,
        date: &RecordDate,
        direction: Direction,
        amount: f64,
    ) -> Self {
        Self {
            id: format!("{}-{}", source_kind.prefix(), original_id),
            original_id: original_id.to_string(),
            source_kind,
            sort_key: date.sort_key(),
            date: date.clone(),
            description: String::new(),
            amount: amount.abs(),
            direction,
            category: String::new(),
            counterparty_name: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            Direction::Inflow => self.amount,
            Direction::Outflow => -self.amount,
        }
    }
}

/// Read-only name lookups used while projecting.
pub struct Lookups<'a> {
    account_names: HashMap<&'a str, &'a str>,
    contacts: &'a BTreeMap<String, String>,
}

impl<'a> Lookups<'a> {
    pub fn new(accounts: &'a [AccountNode], contacts: &'a BTreeMap<String, String>) -> Self {
        let account_names = accounts
            .iter()
            .map(|a| (a.id.as_str(), a.name.as_str()))
            .collect();
        Self {
            account_names,
            contacts,
        }
    }

    pub fn from_snapshot(snapshot: &'a ClinicSnapshot) -> Self {
        Self::new(&snapshot.accounts, &snapshot.contacts)
    }

    pub fn account_name(&self, account_id: &str) -> Option<&'a str> {
        self.account_names.get(account_id).copied()
    }

    /// Display name of a contact; falls back to the raw id when unknown.
    pub fn contact_name(&self, contact_id: &str) -> String {
        match self.contacts.get(contact_id) {
            Some(name) => name.clone(),
            None => {
                debug!("Unknown contact '{}', displaying raw id", contact_id);
                contact_id.to_string()
            }
        }
    }
}

fn project_payment(payment: &Payment, lookups: &Lookups<'_>) -> UnifiedTransaction {
    let (direction, fallback_category) = match payment.direction {
        PaymentKind::Receipt => (Direction::Inflow, "receipt"),
        PaymentKind::Disbursement => (Direction::Outflow, "disbursement"),
    };

    let category = payment
        .account_id
        .as_deref()
        .and_then(|id| lookups.account_name(id))
        .unwrap_or(fallback_category)
        .to_string();

    UnifiedTransaction {
        description: payment.description.clone(),
        category,
        counterparty_name: lookups.contact_name(&payment.entity_id),
        tags: payment.tags.clone(),
        ..UnifiedTransaction::new(
            SourceKind::Payment,
            &payment.id,
            &payment.date,
            direction,
            payment.amount,
        )
    }
}

fn project_expense(
    expense: &Expense,
    lookups: &Lookups<'_>,
    options: &UnifyOptions,
) -> UnifiedTransaction {
    let category = match lookups.account_name(&expense.expense_account_id) {
        Some(name) => name.to_string(),
        None => {
            debug!(
                "Expense {} references unknown account '{}', using generic category",
                expense.id, expense.expense_account_id
            );
            options.generic_expense_category.clone()
        }
    };

    let counterparty_name = expense
        .to_entity_id
        .as_deref()
        .map(|id| lookups.contact_name(id))
        .unwrap_or_default();

    UnifiedTransaction {
        description: expense.description.clone(),
        category,
        counterparty_name,
        tags: expense.tags.clone(),
        ..UnifiedTransaction::new(
            SourceKind::Expense,
            &expense.id,
            &expense.date,
            Direction::Outflow,
            expense.amount,
        )
    }
}

fn project_invoice(invoice: &Invoice) -> Option<UnifiedTransaction> {
    if invoice.paid_amount <= 0.0 {
        return None;
    }

    Some(UnifiedTransaction {
        description: format!("Invoice {}", invoice.id),
        category: "invoice".to_string(),
        counterparty_name: invoice.recipient_name.clone(),
        ..UnifiedTransaction::new(
            SourceKind::Invoice,
            &invoice.id,
            &invoice.date,
            Direction::Inflow,
            invoice.paid_amount,
        )
    })
}

/// Projects all sources into unified transactions, newest first.
///
/// Equal dates keep input order: payments, then expenses, then invoices.
pub fn unify(
    payments: &[Payment],
    expenses: &[Expense],
    invoices: &[Invoice],
    lookups: &Lookups<'_>,
    options: &UnifyOptions,
) -> Vec<UnifiedTransaction> {
    let mut transactions: Vec<UnifiedTransaction> =
        Vec::with_capacity(payments.len() + expenses.len() + invoices.len());

    transactions.extend(payments.iter().map(|p| project_payment(p, lookups)));
    transactions.extend(expenses.iter().map(|e| project_expense(e, lookups, options)));
    if options.include_invoice_receipts {
        transactions.extend(invoices.iter().filter_map(project_invoice));
    }

    transactions.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    transactions
}

pub fn unify_snapshot(snapshot: &ClinicSnapshot, options: &UnifyOptions) -> Vec<UnifiedTransaction> {
    let lookups = Lookups::from_snapshot(snapshot);
    unify(
        &snapshot.payments,
        &snapshot.expenses,
        &snapshot.invoices,
        &lookups,
        options,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarEventKind {
    Transaction { direction: Direction },
    DueDate { due_kind: DueKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub reference: String,
    pub title: String,
    pub amount: f64,
    pub kind: CalendarEventKind,
}

/// Transactions and due dates of one civil month, keyed by day.
pub fn calendar_events(
    transactions: &[UnifiedTransaction],
    dues: &[Due],
    year: i32,
    month: u32,
) -> BTreeMap<CalendarDate, Vec<CalendarEvent>> {
    let in_month =
        |date: &CalendarDate| -> bool { date.year() == year && date.month() == month };

    let mut events: BTreeMap<CalendarDate, Vec<CalendarEvent>> = BTreeMap::new();

    for tx in transactions {
        if let Some(date) = tx.date.calendar_date().filter(in_month) {
            events.entry(date).or_default().push(CalendarEvent {
                reference: tx.id.clone(),
                title: if tx.description.is_empty() {
                    tx.category.clone()
                } else {
                    tx.description.clone()
                },
                amount: tx.amount,
                kind: CalendarEventKind::Transaction {
                    direction: tx.direction,
                },
            });
        }
    }

    for due in dues {
        if let Some(date) = due.due_date.calendar_date().filter(in_month) {
            events.entry(date).or_default().push(CalendarEvent {
                reference: due.id.clone(),
                title: due.description.clone(),
                amount: due.amount,
                kind: CalendarEventKind::DueDate { due_kind: due.kind },
            });
        }
    }

    events
}
