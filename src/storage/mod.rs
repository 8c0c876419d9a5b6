//! Storage boundary for the lifecycle engine.
//!
//! Persistence mechanics live outside the core; the engine only relies on
//! the conditional-update operations declared here. The one load-bearing
//! contract is [`CertificateStore::begin_processing`]: a single atomic
//! compare-and-set (`WHERE status IN (...)`) that serves as the anchoring
//! mutual-exclusion gate. Two backends are provided: an in-memory store
//! (tests, local development) and PostgreSQL.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::H256;

use crate::domain::model::{
    Application, ApplicationStatus, Certificate, CompanyReview, DraftUpdate, NewApplication,
    NewCertificate, OrgKind, Organization, RejectionStage, UniversityReview, WhitelistEntry,
};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a new draft application with its generated number and the
    /// university resolved from the whitelist.
    async fn insert(
        &self,
        new: &NewApplication,
        app_no: &str,
        university_code: &str,
    ) -> Result<Application>;

    async fn get(&self, id: i64) -> Result<Option<Application>>;

    async fn list_for_student(&self, student_user_id: i64) -> Result<Vec<Application>>;

    /// Applies only the fields present in the update. Caller guarantees the
    /// application is in DRAFT.
    async fn update_draft(&self, id: i64, update: &DraftUpdate) -> Result<()>;

    /// Conditional status transition. Returns false (and mutates nothing)
    /// when the current status is not in `from`.
    async fn set_status(
        &self,
        id: i64,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool>;

    /// Persists an accepted company review together with the status
    /// transition, atomically.
    async fn record_company_review(
        &self,
        id: i64,
        review: &CompanyReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool>;

    /// Persists an accepted university review together with the status
    /// transition, atomically.
    async fn record_university_review(
        &self,
        id: i64,
        review: &UniversityReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool>;

    /// Persists a rejection (stage + reason) and moves to REJECTED.
    async fn record_rejection(
        &self,
        id: i64,
        stage: RejectionStage,
        reason: &str,
        from: &[ApplicationStatus],
    ) -> Result<bool>;

    /// Links the issued certificate. Conditional on no existing link; the
    /// link is immutable once set.
    async fn link_certificate(&self, id: i64, certificate_id: i64) -> Result<bool>;

    /// Removes the link, conditional on it pointing at the given
    /// certificate. Exists solely to roll back an approval that lost its
    /// race after linking; a settled link is never touched.
    async fn unlink_certificate(&self, id: i64, certificate_id: i64) -> Result<bool>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn insert(&self, new: &NewCertificate) -> Result<Certificate>;

    async fn get(&self, id: i64) -> Result<Option<Certificate>>;
    async fn get_by_verify_code(&self, verify_code: &str) -> Result<Option<Certificate>>;
    async fn get_by_cert_no(&self, cert_no: &str) -> Result<Option<Certificate>>;
    async fn get_by_hash(&self, cert_hash: H256) -> Result<Option<Certificate>>;

    /// The anchoring gate: atomically moves PENDING or FAILED to PROCESSING
    /// and assigns `cert_hash` if it has never been set. Returns false (no
    /// mutation) when the certificate is in any other status — a concurrent
    /// attempt already holds the gate or the certificate is terminal.
    async fn begin_processing(&self, id: i64, cert_hash: H256) -> Result<bool>;

    /// PROCESSING -> ACTIVE with the ledger confirmation details.
    async fn mark_active(
        &self,
        id: i64,
        tx_hash: &str,
        block_number: u64,
        chain_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// PROCESSING -> FAILED with an operator-facing error note.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<bool>;

    /// ACTIVE -> REVOKED. Local state always wins for revocation.
    async fn mark_revoked(
        &self,
        id: i64,
        reason: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Certificates stuck in PROCESSING since before `older_than` (used by
    /// the reconciliation sweep to force them back to FAILED).
    async fn find_stuck_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>>;

    /// Removes a certificate row. Only used to discard a certificate whose
    /// issuing approval lost its race before the application was linked or
    /// approved; a certificate that has ever held the anchoring gate is
    /// never deleted.
    async fn delete(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait WhitelistStore: Send + Sync {
    async fn get(&self, student_id: &str) -> Result<Option<WhitelistEntry>>;

    async fn insert(&self, student_id: &str, university_code: &str) -> Result<WhitelistEntry>;

    /// Flags the entry used. Conditional on it not being used yet; a second
    /// registration attempt returns false.
    async fn consume(&self, student_id: &str) -> Result<bool>;

    /// Administrative reset of the single-use flag.
    async fn reset(&self, student_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Idempotent upsert by unique code: reuse if a matching code exists,
    /// else create.
    async fn upsert(&self, code: &str, name: &str, kind: OrgKind) -> Result<Organization>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Organization>>;

    /// Binds an approved user to the organization.
    async fn bind_member(&self, code: &str, user_id: i64) -> Result<()>;
}

/// One verification attempt, recorded for rate-visibility and fraud
/// monitoring. Written best-effort; never blocks the verification response.
#[derive(Debug, Clone)]
pub struct VerificationAudit {
    pub key_kind: String,
    pub key: String,
    pub origin: String,
    pub found: bool,
    pub valid: bool,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_verification(&self, audit: &VerificationAudit) -> Result<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Fire-and-forget message creation addressed to a user. Best-effort
    /// persistence only.
    async fn push(&self, user_id: i64, title: &str, body: &str) -> Result<()>;
}
