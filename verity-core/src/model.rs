//! Canonical statement types shared by every stage of the pipeline.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::money;

/// Transaction identifier as the statement (or extractor) numbered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransactionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionId::Number(n) => write!(f, "{n}"),
            TransactionId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TransactionId {
    fn from(n: i64) -> Self {
        TransactionId::Number(n)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        TransactionId::Text(s.to_string())
    }
}

/// Running balance as printed after a transaction.
///
/// Extractors give us numbers; users revalidating edited data may send the
/// literal column text (`"1,025.50 Cr"`), which is only coerced at
/// reconciliation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Balance {
    Amount(f64),
    Literal(String),
}

impl Balance {
    /// Numeric value, `None` when the literal is a placeholder.
    pub fn value(&self) -> Result<Option<f64>, ReconcileError> {
        match self {
            Balance::Amount(v) if v.is_finite() => Ok(Some(*v)),
            Balance::Amount(v) => Err(ReconcileError::NonFinite {
                field: "balance",
                value: *v,
            }),
            Balance::Literal(s) => money::parse_balance_literal(s),
        }
    }
}

impl From<f64> for Balance {
    fn from(v: f64) -> Self {
        Balance::Amount(v)
    }
}

/// Canonical transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default)]
    pub details: String,
    #[serde(with = "crate::dates::dmy")]
    pub date: NaiveDate,
    /// Positive = credit (money in), negative = debit (money out).
    #[serde(default, deserialize_with = "money::de_amount")]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
    /// Amount text from an edited row that could not be coerced. The
    /// reconciler reports such an entry as an error instead of trusting `amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_literal: Option<String>,
    /// Set by the reconciler only.
    #[serde(default)]
    pub mismatch: bool,
}

impl Transaction {
    pub fn new(
        id: impl Into<TransactionId>,
        details: impl Into<String>,
        date: NaiveDate,
        amount: f64,
        balance: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            details: details.into(),
            date,
            amount,
            balance: balance.map(Balance::Amount),
            amount_literal: None,
            mismatch: false,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_debit(&self) -> bool {
        self.amount < 0.0
    }
}

/// Statement header. Informational; never reconciled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub final_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_address: Option<String>,
}

/// Normalized statement: header plus ordered transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(default)]
    pub account_info: AccountInfo,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Fraud issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum IssueType {
    FormattingAnomaly,
    DuplicateTransaction,
    MissingTransaction,
    Other,
}

impl IssueType {
    /// Lenient label mapping; anything unknown is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "formatting_anomaly" => IssueType::FormattingAnomaly,
            "duplicate_transaction" => IssueType::DuplicateTransaction,
            "missing_transaction" => IssueType::MissingTransaction,
            _ => IssueType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::FormattingAnomaly => "formatting_anomaly",
            IssueType::DuplicateTransaction => "duplicate_transaction",
            IssueType::MissingTransaction => "missing_transaction",
            IssueType::Other => "other",
        }
    }
}

impl From<String> for IssueType {
    fn from(s: String) -> Self {
        IssueType::from_label(&s)
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which detector produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Pixel,
    Semantic,
}

/// One fraud signal. Pixel issues carry an image snippet (PNG data URI),
/// semantic issues carry the reviewer's quoted text; exactly one is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudIssue {
    pub issue_type: IssueType,
    pub description: String,
    pub image_snippet: Option<String>,
    pub text_snippet: Option<String>,
    pub source: IssueSource,
}

impl FraudIssue {
    pub fn pixel(issue_type: IssueType, description: impl Into<String>, image_snippet: String) -> Self {
        Self {
            issue_type,
            description: description.into(),
            image_snippet: Some(image_snippet),
            text_snippet: None,
            source: IssueSource::Pixel,
        }
    }

    /// Without quoted evidence the text snippet falls back to the
    /// description in quotes.
    pub fn semantic(
        issue_type: IssueType,
        description: impl Into<String>,
        text_snippet: Option<String>,
    ) -> Self {
        let description = description.into();
        let text_snippet = text_snippet
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("\"{description}\""));
        Self {
            issue_type,
            description,
            image_snippet: None,
            text_snippet: Some(text_snippet),
            source: IssueSource::Semantic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(day: u32, month: u32, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_transaction_json_shape() {
        let t = Transaction::new(2, "ATM withdrawal", d(3, 1, 2025), -50.0, Some(2599.13));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["id"], json!(2));
        assert_eq!(v["date"], json!("03-01-2025"));
        assert_eq!(v["amount"], json!(-50.0));
        assert_eq!(v["balance"], json!(2599.13));
        assert_eq!(v["mismatch"], json!(false));
    }

    #[test]
    fn test_edited_row_decodes_strings() {
        let t: Transaction = serde_json::from_value(json!({
            "id": "7",
            "details": "Salary",
            "date": "01/02/2025",
            "amount": "1500.00",
            "balance": "3,100.00 Cr"
        }))
        .unwrap();
        assert_eq!(t.id, TransactionId::Text("7".into()));
        assert_eq!(t.amount, 1500.0);
        assert_eq!(t.balance.unwrap().value(), Ok(Some(3100.0)));
        assert!(!t.mismatch);
    }

    #[test]
    fn test_edited_row_placeholder_amount_is_zero() {
        let t: Transaction = serde_json::from_value(json!({
            "id": 1, "details": "Opening balance", "date": "01-01-2025",
            "amount": "nan", "balance": 10.0
        }))
        .unwrap();
        assert_eq!(t.amount, 0.0);
    }

    #[test]
    fn test_issue_type_labels() {
        assert_eq!(IssueType::from_label("duplicate_transaction"), IssueType::DuplicateTransaction);
        assert_eq!(IssueType::from_label("Formatting Anomaly"), IssueType::FormattingAnomaly);
        assert_eq!(IssueType::from_label("forged signature"), IssueType::Other);
        let parsed: IssueType = serde_json::from_value(json!("missing_transaction")).unwrap();
        assert_eq!(parsed, IssueType::MissingTransaction);
        assert_eq!(serde_json::to_value(IssueType::Other).unwrap(), json!("other"));
    }

    #[test]
    fn test_fraud_issue_snippets_exclusive() {
        let p = FraudIssue::pixel(IssueType::FormattingAnomaly, "block", "data:image/png;base64,AA".into());
        assert!(p.image_snippet.is_some() && p.text_snippet.is_none());
        let s = FraudIssue::semantic(IssueType::Other, "odd", Some("quote".into()));
        assert!(s.image_snippet.is_none() && s.text_snippet.is_some());

        let bare = FraudIssue::semantic(IssueType::MissingTransaction, "Serial gap", None);
        assert_eq!(bare.text_snippet.as_deref(), Some("\"Serial gap\""));
        assert!(bare.image_snippet.is_none());
        let blank = FraudIssue::semantic(IssueType::Other, "odd", Some("  ".into()));
        assert_eq!(blank.text_snippet.as_deref(), Some("\"odd\""));
    }
}
