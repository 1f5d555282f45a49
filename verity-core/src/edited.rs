//! Decoding user-edited transaction lists for revalidation.
//!
//! Rows are decoded one at a time. An amount that does not coerce keeps its
//! row (the reconciler flags it as an error entry); a row that cannot become
//! a transaction at all is dropped with a [`RowSkip`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::dates::parse_statement_date;
use crate::error::{EditedShapeError, RowSkip, SkipReason};
use crate::money::value_strict;
use crate::model::Transaction;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditedRows {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<RowSkip>,
}

/// Accepts a bare array of rows or an object with a `transactions` array
/// (`account_info` and other keys are ignored).
pub fn decode_edited(value: &Value) -> Result<EditedRows, EditedShapeError> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(obj) => match obj.get("transactions") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(EditedShapeError("an object without `transactions`".into())),
        },
        Value::Null => return Err(EditedShapeError("null".into())),
        Value::Bool(_) => return Err(EditedShapeError("a boolean".into())),
        Value::Number(_) => return Err(EditedShapeError("a number".into())),
        Value::String(_) => return Err(EditedShapeError("a string".into())),
    };

    let mut out = EditedRows::default();
    for (row, item) in rows.iter().enumerate() {
        match decode_row(row, item) {
            Ok(txn) => out.transactions.push(txn),
            Err(skip) => {
                warn!(%skip, "dropping edited row");
                out.skipped.push(skip);
            }
        }
    }
    Ok(out)
}

fn decode_row(row: usize, item: &Value) -> Result<Transaction, RowSkip> {
    let Value::Object(obj) = item else {
        return Err(RowSkip::new(row, SkipReason::NotAnObject));
    };

    match obj.get("date") {
        None | Some(Value::Null) => return Err(RowSkip::new(row, SkipReason::MissingField("date"))),
        Some(Value::String(s)) if parse_statement_date(s).is_some() => {}
        Some(Value::String(s)) => return Err(RowSkip::new(row, SkipReason::BadDate(s.clone()))),
        Some(other) => return Err(RowSkip::new(row, SkipReason::BadDate(other.to_string()))),
    }

    let mut obj = obj.clone();
    let mut amount_literal = None;
    if let Some(raw) = obj.get("amount") {
        if let Err(err) = value_strict(raw) {
            debug!(row, error = %err, "keeping unconvertible amount for reconciliation");
            amount_literal = Some(match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            obj.insert("amount".to_string(), Value::Null);
        }
    }

    let mut txn: Transaction = serde_json::from_value(Value::Object(obj))
        .map_err(|e| RowSkip::new(row, SkipReason::Decode(e.to_string())))?;
    txn.amount_literal = amount_literal;
    Ok(txn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{BalanceReconciler, MismatchKind};
    use serde_json::json;

    #[test]
    fn test_bad_amount_row_is_kept_and_flagged() {
        let rows = json!([
            { "id": 1, "details": "Opening", "date": "01-01-2025", "amount": 0, "balance": 100.0 },
            { "id": 2, "details": "Salary", "date": "02-01-2025", "amount": "1,200.00", "balance": "1,300.00" },
            { "id": 3, "details": "Rent", "date": "03-01-2025", "amount": -300, "balance": 1000.0 },
            { "id": 4, "details": "Fee", "date": "04-01-2025", "amount": "-5", "balance": "995.00 Cr" }
        ]);
        let edited = decode_edited(&rows).unwrap();
        assert_eq!(edited.transactions.len(), 4);
        assert!(edited.skipped.is_empty());
        assert_eq!(edited.transactions[1].amount_literal.as_deref(), Some("1,200.00"));
        assert_eq!(edited.transactions[1].amount, 0.0);

        let r = BalanceReconciler::default().reconcile(edited.transactions);
        assert_eq!(r.mismatches.len(), 1);
        assert_eq!(r.mismatches[0].index, 1);
        assert!(matches!(r.mismatches[0].kind, MismatchKind::Error { .. }));
        assert!(r.descriptions()[0].starts_with("Error at Entry #2 (Date: 02-01-2025)"));
        let flags: Vec<bool> = r.transactions.iter().map(|t| t.mismatch).collect();
        assert_eq!(flags, vec![false, true, false, false]);
    }

    #[test]
    fn test_undecodable_rows_are_skipped() {
        let rows = json!({
            "account_info": { "holder_name": "A. Customer" },
            "transactions": [
                { "id": 1, "details": "Opening", "date": "01-01-2025", "amount": 0, "balance": 50.0 },
                { "id": 2, "details": "Lost", "date": "N/A", "amount": 5, "balance": 55.0 },
                "not a row",
                { "details": "No id", "date": "03-01-2025", "amount": 5, "balance": 55.0 },
                { "id": 5, "details": "Top-up", "date": "04-01-2025", "amount": "$5", "balance": 60.0 }
            ]
        });
        let edited = decode_edited(&rows).unwrap();
        let skipped: Vec<usize> = edited.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![1, 2, 3]);
        assert_eq!(edited.skipped[0].reason, SkipReason::BadDate("N/A".into()));
        assert_eq!(edited.skipped[1].reason, SkipReason::NotAnObject);
        assert!(matches!(edited.skipped[2].reason, SkipReason::Decode(_)));

        assert_eq!(edited.transactions.len(), 2);
        assert_eq!(edited.transactions[1].amount_literal.as_deref(), Some("$5"));
    }

    #[test]
    fn test_wrong_shapes_are_rejected() {
        assert!(decode_edited(&json!({ "rows": [] })).is_err());
        assert!(decode_edited(&json!("transactions")).is_err());
        assert_eq!(decode_edited(&json!([])).unwrap(), EditedRows::default());
    }
}
