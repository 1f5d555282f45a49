//! Running-balance reconciliation.
//!
//! Walks the transactions in statement order keeping one running value, the
//! previous balance. Entry 0 is the opening-balance anchor. Every later entry
//! with a printed balance must satisfy `previous + amount == balance` within
//! the tolerance. After each comparison the running value moves to the
//! printed balance, so one doctored entry is flagged once and does not
//! cascade.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dates::format_dmy;
use crate::error::ReconcileError;
use crate::model::{Balance, Transaction, TransactionId};

/// Default absolute tolerance between expected and printed balance.
pub const DEFAULT_TOLERANCE: f64 = 0.015;

/// Slack for binary float noise when a difference sits exactly on the tolerance.
const FLOAT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceReconciler {
    pub tolerance: f64,
}

impl Default for BalanceReconciler {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Why an entry was flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchKind {
    Balance {
        expected: f64,
        actual: f64,
        previous: f64,
        amount: f64,
    },
    Error {
        message: String,
    },
}

/// A flagged entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Zero-based position in the sequence.
    pub index: usize,
    pub id: TransactionId,
    pub date: NaiveDate,
    pub details: String,
    #[serde(flatten)]
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry = self.index + 1;
        let date = format_dmy(self.date);
        match &self.kind {
            MismatchKind::Balance {
                expected,
                actual,
                previous,
                amount,
            } => write!(
                f,
                "Mismatch at Entry #{entry} (Date: {date}, Desc: {}): \
                 Expected Balance = {expected:.2}, Actual Balance = {actual:.2}, \
                 Prev Balance = {previous:.2}, +Amount = {amount:.2}",
                self.details
            ),
            MismatchKind::Error { message } => {
                write!(f, "Error at Entry #{entry} (Date: {date}): {message}")
            }
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub mismatches: Vec<Mismatch>,
    /// The input sequence, same order, with `mismatch` flags set.
    pub transactions: Vec<Transaction>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Human-readable description per flagged entry.
    pub fn descriptions(&self) -> Vec<String> {
        self.mismatches.iter().map(|m| m.to_string()).collect()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.mismatch)
    }
}

impl BalanceReconciler {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Reconcile a sequence. Flags from any previous run are reset first, so
    /// this is safe to call again on user-edited data.
    pub fn reconcile(&self, mut transactions: Vec<Transaction>) -> Reconciliation {
        let mut mismatches = Vec::new();
        let mut previous: Option<f64> = None;

        for (index, txn) in transactions.iter_mut().enumerate() {
            txn.mismatch = false;

            let actual = match txn.balance.as_ref().map(Balance::value).transpose() {
                Ok(b) => b.flatten(),
                Err(err) if index == 0 => {
                    warn!(error = %err, "opening balance unusable; anchoring on next balance");
                    continue;
                }
                Err(err) => {
                    // Running value is left as is; the next printed balance re-anchors.
                    mismatches.push(flag_error(index, txn, &err));
                    continue;
                }
            };

            if index == 0 {
                previous = actual;
                continue;
            }

            if let Some(raw) = txn.amount_literal.clone() {
                mismatches.push(flag_error(index, txn, &ReconcileError::UnparsableAmount(raw)));
                if actual.is_some() {
                    previous = actual;
                }
                continue;
            }

            if !txn.amount.is_finite() {
                let err = ReconcileError::NonFinite {
                    field: "amount",
                    value: txn.amount,
                };
                mismatches.push(flag_error(index, txn, &err));
                if actual.is_some() {
                    previous = actual;
                }
                continue;
            }

            let Some(actual) = actual else {
                previous = previous.map(|p| p + txn.amount);
                debug!(index, "no printed balance; carrying running value forward");
                continue;
            };

            let Some(prev) = previous else {
                debug!(index, actual, "no running value yet; anchoring here");
                previous = Some(actual);
                continue;
            };

            let expected = prev + txn.amount;
            if (expected - actual).abs() - self.tolerance > FLOAT_SLACK {
                txn.mismatch = true;
                mismatches.push(Mismatch {
                    index,
                    id: txn.id.clone(),
                    date: txn.date,
                    details: txn.details.clone(),
                    kind: MismatchKind::Balance {
                        expected,
                        actual,
                        previous: prev,
                        amount: txn.amount,
                    },
                });
            }

            previous = Some(actual);
        }

        if !mismatches.is_empty() {
            warn!(flagged = mismatches.len(), total = transactions.len(), "balance mismatches found");
        }

        Reconciliation {
            mismatches,
            transactions,
        }
    }
}

fn flag_error(index: usize, txn: &mut Transaction, err: &ReconcileError) -> Mismatch {
    txn.mismatch = true;
    Mismatch {
        index,
        id: txn.id.clone(),
        date: txn.date,
        details: txn.details.clone(),
        kind: MismatchKind::Error {
            message: err.to_string(),
        },
    }
}
