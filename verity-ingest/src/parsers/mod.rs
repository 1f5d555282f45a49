//! Raw-text statement parsers.
//!
//! `delimited` handles CSV-like text with a header row. The layout parsers
//! handle fixed-column statement printouts: one transaction per line,
//! recognised by regex, everything else ignored as page furniture.

pub mod amount_balance;
pub mod cheque_ledger;
pub mod delimited;

use verity_core::money::parse_balance_literal;
use verity_core::{AmountError, RowSkip, SkipReason, Transaction};

pub use amount_balance::parse_amount_balance_text;
pub use cheque_ledger::parse_cheque_ledger_text;
pub use delimited::parse_delimited_text;

/// Rows recovered from raw text, plus the rows that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRows {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<RowSkip>,
}

impl ParsedRows {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.skipped.is_empty()
    }
}

/// Printed amount column: thousands separators are allowed in printouts.
pub(crate) fn printed_amount(field: &'static str, s: &str) -> Result<f64, SkipReason> {
    let cleaned = s.trim().replace(',', "");
    if verity_core::money::is_placeholder(&cleaned) {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SkipReason::BadAmount {
            field,
            source: AmountError::NotANumber(s.to_string()),
        })
}

/// Printed balance column (may carry `Cr`/`Dr`).
pub(crate) fn printed_balance(s: &str) -> Result<Option<f64>, SkipReason> {
    parse_balance_literal(s).map_err(|_| SkipReason::BadAmount {
        field: "balance",
        source: AmountError::NotANumber(s.to_string()),
    })
}
