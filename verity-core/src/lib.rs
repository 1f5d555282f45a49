//! verity-core: canonical statement types, money coercion, and balance reconciliation

pub mod dates;
pub mod edited;
pub mod error;
pub mod model;
pub mod money;
pub mod reconcile;

pub use edited::{decode_edited, EditedRows};
pub use error::{AmountError, EditedShapeError, ReconcileError, RowSkip, SkipReason};
pub use model::{
    AccountInfo, Balance, FraudIssue, IssueSource, IssueType, Statement, Transaction,
    TransactionId,
};
pub use reconcile::{BalanceReconciler, Mismatch, MismatchKind, Reconciliation, DEFAULT_TOLERANCE};
