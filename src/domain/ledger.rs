//! The narrow contract interface to the blockchain ledger.
//!
//! The ledger is an opaque append-only service addressed by certificate hash.
//! This trait is the only seam through which the engine talks to it; it is
//! injected into the anchoring coordinator and the verification service so
//! that tests can substitute a mock gateway.

use async_trait::async_trait;
use primitive_types::H256;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Liveness check failed; no submission was attempted.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The contract rejected or reverted the transaction (includes
    /// duplicate-hash rejection).
    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),

    #[error("ledger call timed out after {0}s")]
    Timeout(u64),

    #[error("ledger network error: {0}")]
    Network(String),
}

/// Facts submitted alongside the certificate hash when anchoring.
#[derive(Debug, Clone)]
pub struct AnchorRequest {
    pub cert_hash: H256,
    pub student_address: String,
    pub student_id: String,
    pub university_code: String,
    pub company_code: String,
    pub start_unix: i64,
    pub end_unix: i64,
}

/// One member of a batch submission. The batch shares a single
/// university/company pair and lands in a single transaction.
#[derive(Debug, Clone)]
pub struct BatchAnchorEntry {
    pub cert_hash: H256,
    pub student_address: String,
    pub student_id: String,
    pub start_unix: i64,
    pub end_unix: i64,
}

#[derive(Debug, Clone)]
pub struct BatchAnchorRequest {
    pub university_code: String,
    pub company_code: String,
    pub entries: Vec<BatchAnchorEntry>,
}

/// Confirmation of an accepted submission.
#[derive(Debug, Clone)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// The ledger's own copy of the anchored certificate facts.
#[derive(Debug, Clone)]
pub struct LedgerRecord {
    pub cert_hash: H256,
    pub student_id: String,
    pub university_code: String,
    pub company_code: String,
    pub start_unix: i64,
    pub end_unix: i64,
    pub valid: bool,
    pub anchored_at: i64,
    pub revoke_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct LedgerStats {
    pub total: u64,
    pub active: u64,
    pub revoked: u64,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Cheap liveness check. Every mutating operation is preceded by this
    /// check so callers can short-circuit with a typed "unavailable" error
    /// instead of failing slowly.
    async fn is_available(&self) -> bool;

    /// Identifier of the chain this gateway is bound to (recorded on the
    /// certificate when anchoring succeeds).
    fn chain_id(&self) -> String;

    /// Single-certificate anchoring.
    async fn submit(&self, req: &AnchorRequest) -> Result<AnchorReceipt, LedgerError>;

    /// Batch anchoring. All-or-nothing: if the underlying transaction
    /// reverts, none of the entries are anchored.
    async fn submit_batch(&self, req: &BatchAnchorRequest) -> Result<AnchorReceipt, LedgerError>;

    /// Read-only lookup; must not mutate ledger or local state.
    async fn query(&self, cert_hash: H256) -> Result<Option<LedgerRecord>, LedgerError>;

    /// Marks the record invalid on-chain. Returns the transaction hash.
    async fn revoke(&self, cert_hash: H256, reason: &str) -> Result<String, LedgerError>;

    async fn statistics(&self) -> Result<LedgerStats, LedgerError>;
}
