//! Transaction normalization.
//!
//! Turns a raw extraction into the canonical `(AccountInfo, transactions)`
//! statement. Structured payloads are validated field by field; raw text is
//! run through the delimited parser or, failing a header, the layout
//! parsers. Bad records are dropped with a [`RowSkip`] and never abort the
//! batch. Source order is preserved.

use anyhow::anyhow;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use verity_core::dates::parse_statement_date;
use verity_core::money::{is_placeholder, parse_balance_literal, parse_strict, value_strict};
use verity_core::{
    AccountInfo, AmountError, Balance, RowSkip, SkipReason, Statement, Transaction, TransactionId,
};

use crate::error::IngestError;
use crate::parsers::{self, ParsedRows};
use crate::router::{ExtractionSource, RawExtraction, RawPayload};

/// Canonical statement plus the records that did not make it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedStatement {
    pub statement: Statement,
    pub skipped: Vec<RowSkip>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionNormalizer;

impl TransactionNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawExtraction) -> Result<NormalizedStatement, IngestError> {
        match &raw.payload {
            RawPayload::Text(text) => Ok(self.normalize_text(text)),
            RawPayload::Structured(value) => self.normalize_structured(value),
        }
    }

    /// Validate a `{account_info, transactions}` payload. A bare array is
    /// taken as the transaction list; an `extracted_data` wrapper is unwrapped.
    pub fn normalize_structured(&self, payload: &Value) -> Result<NormalizedStatement, IngestError> {
        let root = payload.get("extracted_data").unwrap_or(payload);
        let (account_info, rows) = match root {
            Value::Array(rows) => (AccountInfo::default(), rows),
            Value::Object(obj) => {
                let rows = obj
                    .get("transactions")
                    .and_then(Value::as_array)
                    .ok_or_else(|| IngestError::ExtractionFailed {
                        path: ExtractionSource::VisionStructured,
                        source: anyhow!("payload has no `transactions` array"),
                    })?;
                let info = obj
                    .get("account_info")
                    .and_then(Value::as_object)
                    .map(decode_account_info)
                    .unwrap_or_default();
                (info, rows)
            }
            other => {
                return Err(IngestError::ExtractionFailed {
                    path: ExtractionSource::VisionStructured,
                    source: anyhow!("payload is a {}, expected an object", json_kind(other)),
                });
            }
        };

        let mut out = NormalizedStatement {
            statement: Statement {
                account_info,
                transactions: Vec::with_capacity(rows.len()),
            },
            skipped: Vec::new(),
        };
        for (index, row) in rows.iter().enumerate() {
            match decode_transaction(index, row) {
                Ok(txn) => out.statement.transactions.push(txn),
                Err(reason) => {
                    let skip = RowSkip::new(index, reason);
                    warn!(%skip, "dropping structured row");
                    out.skipped.push(skip);
                }
            }
        }

        info!(
            kept = out.statement.transactions.len(),
            skipped = out.skipped.len(),
            "normalized structured payload"
        );
        Ok(out)
    }

    /// Parse raw statement text. Delimited text wins when the first line is a
    /// recognisable header; otherwise the layout parser that recovers the
    /// most rows is used.
    pub fn normalize_text(&self, text: &str) -> NormalizedStatement {
        let rows = match parsers::parse_delimited_text(text) {
            Some(rows) => {
                debug!("text parsed as delimited");
                rows
            }
            None => best_layout(text),
        };
        info!(
            kept = rows.transactions.len(),
            skipped = rows.skipped.len(),
            "normalized raw text"
        );
        NormalizedStatement {
            statement: Statement {
                account_info: AccountInfo::default(),
                transactions: rows.transactions,
            },
            skipped: rows.skipped,
        }
    }
}

fn best_layout(text: &str) -> ParsedRows {
    let candidates = [
        ("cheque-ledger", parsers::parse_cheque_ledger_text(text)),
        ("amount-balance", parsers::parse_amount_balance_text(text)),
    ];
    let mut best: Option<(&str, ParsedRows)> = None;
    for (name, result) in candidates {
        match result {
            Ok(rows) => {
                let better = best
                    .as_ref()
                    .is_none_or(|(_, b)| rows.transactions.len() > b.transactions.len());
                if better {
                    best = Some((name, rows));
                }
            }
            Err(e) => warn!(layout = name, error = %e, "layout parser failed"),
        }
    }
    match best {
        Some((name, rows)) => {
            debug!(layout = name, rows = rows.transactions.len(), "layout chosen");
            rows
        }
        None => ParsedRows::default(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text field: `null`, `"null"` and blanks are absent; numbers are stringified.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decode_account_info(obj: &Map<String, Value>) -> AccountInfo {
    let final_balance = match obj.get("final_balance") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_balance_literal(s).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring unreadable final balance");
            None
        }),
        _ => None,
    };
    AccountInfo {
        holder_name: text_field(obj, "holder_name"),
        account_number: text_field(obj, "account_number"),
        period: text_field(obj, "period"),
        final_balance,
        bank_name: text_field(obj, "bank_name"),
        branch_code: text_field(obj, "branch_code"),
        branch_address: text_field(obj, "branch_address"),
    }
}

fn absent(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => is_placeholder(s),
        Some(_) => false,
    }
}

fn strict_field(obj: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, SkipReason> {
    match obj.get(field) {
        None => Ok(None),
        Some(v) => value_strict(v).map_err(|source| SkipReason::BadAmount { field, source }),
    }
}

fn decode_transaction(index: usize, row: &Value) -> Result<Transaction, SkipReason> {
    let obj = row.as_object().ok_or(SkipReason::NotAnObject)?;

    let date = match obj.get("date") {
        d if absent(d) => return Err(SkipReason::MissingField("date")),
        Some(Value::String(s)) => {
            parse_statement_date(s).ok_or_else(|| SkipReason::BadDate(s.clone()))?
        }
        Some(other) => return Err(SkipReason::BadDate(other.to_string())),
        None => return Err(SkipReason::MissingField("date")),
    };

    // Signed amount, or credit/debit columns collapsed into one.
    let amount = if !absent(obj.get("amount")) {
        strict_field(obj, "amount")?.unwrap_or(0.0)
    } else {
        let credit = strict_field(obj, "credit")?
            .or(strict_field(obj, "deposit")?)
            .unwrap_or(0.0);
        let debit = strict_field(obj, "debit")?
            .or(strict_field(obj, "withdrawal")?)
            .unwrap_or(0.0);
        credit.abs() - debit.abs()
    };

    let balance = match obj.get("balance") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64().map(Balance::Amount),
        Some(Value::String(s)) => match parse_strict(s) {
            Ok(v) => v.map(Balance::Amount),
            // Printed forms like "1,025.50 Cr" are left for the reconciler.
            Err(_) => Some(Balance::Literal(s.clone())),
        },
        Some(other) => {
            return Err(SkipReason::BadAmount {
                field: "balance",
                source: AmountError::WrongType(json_kind(other).to_string()),
            });
        }
    };

    let details = text_field(obj, "details")
        .or_else(|| text_field(obj, "description"))
        .unwrap_or_default();

    let id = match obj.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(TransactionId::Number)
            .unwrap_or_else(|| TransactionId::Text(n.to_string())),
        Some(Value::String(s)) if !s.trim().is_empty() => TransactionId::Text(s.trim().to_string()),
        _ => TransactionId::Number(index as i64 + 1),
    };

    Ok(Transaction {
        id,
        details,
        date,
        amount,
        balance,
        amount_literal: None,
        mismatch: false,
    })
}
