//! Error taxonomy for the certificate lifecycle engine.
//!
//! Validation, authorization and conflict errors are surfaced synchronously to
//! the caller before any state change. Ledger errors from asynchronous
//! anchoring are never surfaced to the original caller; they are observable
//! only through subsequent status queries or notifications.

use crate::domain::ledger::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad input shape; rejected before any state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller lacks role or ownership; rejected before any state change.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// State transition not permitted from the current status; no mutation.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Gateway liveness check failed before submission.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Submission attempted and rejected, reverted or timed out.
    #[error("ledger failure: {0}")]
    LedgerFailure(String),

    /// Persistence-layer failure (propagated from the storage boundary).
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<LedgerError> for CoreError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Unavailable(msg) => CoreError::LedgerUnavailable(msg),
            other => CoreError::LedgerFailure(other.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
