//! Recoverable error types.
//!
//! Nothing in here aborts a statement: a `RowSkip` drops one record, a
//! `ReconcileError` flags one entry. Fatal document/extraction failures live
//! in verity-ingest.

use thiserror::Error;

/// Why a monetary string could not become a float.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("currency symbol in {0:?}")]
    CurrencySymbol(String),
    #[error("thousands separator in {0:?}")]
    ThousandsSeparator(String),
    #[error("not a number: {0:?}")]
    NotANumber(String),
    #[error("expected a number or numeric string, found {0}")]
    WrongType(String),
}

/// A single entry that could not be reconciled arithmetically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("could not convert balance {0:?} to a number")]
    UnparsableBalance(String),
    #[error("could not convert amount {0:?} to a number")]
    UnparsableAmount(String),
    #[error("{field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },
}

/// A record dropped during normalization (RowParseSkipped).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row} skipped: {reason}")]
pub struct RowSkip {
    /// Zero-based position in the source (line index for text, array index for payloads).
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognised date {0:?}")]
    BadDate(String),
    #[error("bad {field}: {source}")]
    BadAmount {
        field: &'static str,
        source: AmountError,
    },
    #[error("record is not an object")]
    NotAnObject,
    #[error("{0}")]
    Decode(String),
}

/// Edited data that is neither a transaction list nor a statement object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected an array of transactions or an object with a `transactions` array, found {0}")]
pub struct EditedShapeError(pub String);

impl RowSkip {
    pub fn new(row: usize, reason: SkipReason) -> Self {
        Self { row, reason }
    }
}
