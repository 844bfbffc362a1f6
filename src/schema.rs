use crate::calendar::RecordDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountMainType {
    #[schemars(description = "Cash, bank accounts, receivables, equipment (debit balance)")]
    Asset,

    #[schemars(description = "Payables, loans, accrued salaries (credit balance)")]
    Liability,

    #[schemars(description = "Owner capital and retained earnings (credit balance)")]
    Equity,

    #[schemars(description = "Visit fees, procedures, insurance reimbursements (credit balance)")]
    Revenue,

    #[schemars(description = "Rent, salaries, consumables, utilities (debit balance)")]
    Expense,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    #[schemars(description = "Money received by the clinic")]
    Receipt,

    #[schemars(description = "Money paid out by the clinic")]
    Disbursement,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Payment {
    pub id: String,

    #[schemars(description = "Civil (Jalali) date in YYYY/MM/DD format")]
    pub date: RecordDate,

    #[serde(default)]
    pub description: String,

    pub amount: f64,

    #[schemars(description = "Whether the payment is a receipt or a disbursement")]
    pub direction: PaymentKind,

    #[schemars(description = "Composite contact id of the counterparty, e.g. 'patient-12'")]
    pub entity_id: String,

    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Expense {
    pub id: String,

    #[schemars(description = "Civil (Jalali) date in YYYY/MM/DD format")]
    pub date: RecordDate,

    #[serde(default)]
    pub description: String,

    pub amount: f64,

    #[schemars(description = "Chart-of-accounts id of the expense account; determines the category")]
    pub expense_account_id: String,

    #[serde(default)]
    pub from_account_id: Option<String>,

    #[schemars(description = "Composite contact id of the payee, if any")]
    #[serde(default)]
    pub to_entity_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    PartiallyPaid,
    Unpaid,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Invoice {
    pub id: String,

    #[schemars(description = "Civil (Jalali) issue date in YYYY/MM/DD format")]
    pub date: RecordDate,

    pub status: InvoiceStatus,

    #[serde(default)]
    pub recipient_name: String,

    #[schemars(description = "Amount the patient owes after insurance coverage")]
    pub patient_share: f64,

    #[serde(default)]
    pub paid_amount: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DueKind {
    Payable,
    Receivable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Pending,
    Settled,
    #[serde(other)]
    Other,
}

/// A payable or receivable with a due date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Due {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: DueKind,

    pub status: DueStatus,

    pub amount: f64,

    #[schemars(description = "Civil (Jalali) due date in YYYY/MM/DD format")]
    pub due_date: RecordDate,

    pub entity_id: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,

    #[schemars(description = "Stock level at or below which the item should be reordered")]
    pub reorder_point: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayslipStatus {
    Draft,
    AwaitingPayment,
    Paid,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Payslip {
    pub id: String,
    pub employee_name: String,

    #[schemars(description = "Payroll period label, e.g. '1403/05'")]
    #[serde(default)]
    pub period: String,

    pub status: PayslipStatus,

    #[serde(default)]
    pub net_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AccountNode {
    pub id: String,

    #[schemars(description = "Account code as shown in the chart of accounts, e.g. '1101'")]
    #[serde(default)]
    pub code: String,

    pub name: String,

    #[schemars(description = "Id of the parent account; null for a top-level account")]
    #[serde(default)]
    pub parent_id: Option<String>,

    pub main_type: AccountMainType,
}

/// The read-only snapshot of source entities handed to the core for one evaluation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClinicSnapshot {
    #[schemars(
        description = "Monotonic version of the source data; bumped by the host on every mutation"
    )]
    #[serde(default)]
    pub version: u64,

    #[serde(default)]
    pub payments: Vec<Payment>,

    #[serde(default)]
    pub expenses: Vec<Expense>,

    #[serde(default)]
    pub invoices: Vec<Invoice>,

    #[serde(default)]
    pub dues: Vec<Due>,

    #[serde(default)]
    pub inventory: Vec<InventoryItem>,

    #[serde(default)]
    pub payslips: Vec<Payslip>,

    #[serde(default)]
    pub accounts: Vec<AccountNode>,

    #[schemars(description = "Display names keyed by composite contact id ('<kind>-<numericId>')")]
    #[serde(default)]
    pub contacts: BTreeMap<String, String>,

    #[schemars(description = "Own ledger balance of each account, keyed by account id")]
    #[serde(default)]
    pub ledger_balances: BTreeMap<String, f64>,
}

impl ClinicSnapshot {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ClinicSnapshot)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn ledger_balance(&self, account_id: &str) -> f64 {
        self.ledger_balances.get(account_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = ClinicSnapshot::schema_as_json().unwrap();
        assert!(schema_json.contains("payments"));
        assert!(schema_json.contains("ledger_balances"));
        assert!(schema_json.contains("reorder_point"));
    }

    #[test]
    fn test_snapshot_deserialization() {
        let json = r#"{
            "version": 3,
            "payments": [{
                "id": "p1",
                "date": "1403/5/1",
                "amount": 1500000,
                "direction": "receipt",
                "entity_id": "patient-7"
            }],
            "invoices": [{
                "id": "i1",
                "date": "bad date",
                "status": "refunded",
                "patient_share": 200000
            }],
            "dues": [{
                "id": "d1",
                "type": "payable",
                "status": "pending",
                "amount": 50,
                "due_date": "1403/05/10",
                "entity_id": "supplier-2"
            }]
        }"#;

        let snapshot = ClinicSnapshot::from_json_str(json).unwrap();
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.payments[0].date.to_string(), "1403/05/01");
        assert!(snapshot.invoices[0].date.is_malformed());
        assert_eq!(snapshot.invoices[0].status, InvoiceStatus::Other);
        assert_eq!(snapshot.dues[0].kind, DueKind::Payable);
        assert!(snapshot.expenses.is_empty());
    }

    #[test]
    fn test_ledger_balance_defaults_to_zero() {
        let mut snapshot = ClinicSnapshot::default();
        snapshot.ledger_balances.insert("cash".to_string(), 120.0);
        assert_eq!(snapshot.ledger_balance("cash"), 120.0);
        assert_eq!(snapshot.ledger_balance("missing"), 0.0);
    }
}
