//! Certificate entity and its anchoring state machine.

use chrono::{DateTime, Utc};
use primitive_types::H256;

use crate::crypto::hashing::{compute_certificate_hash, date_to_unix};

/// Anchoring status of a [`Certificate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStatus {
    /// Created by university approval; not yet anchored.
    Pending,
    /// An anchoring attempt is in flight. Entering this state is the
    /// mutual-exclusion gate against concurrent submissions.
    Processing,
    /// Confirmed on-chain.
    Active,
    /// Last anchoring attempt failed; retry-safe.
    Failed,
    /// Terminal and irreversible.
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Pending => "PENDING",
            CertificateStatus::Processing => "PROCESSING",
            CertificateStatus::Active => "ACTIVE",
            CertificateStatus::Failed => "FAILED",
            CertificateStatus::Revoked => "REVOKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING" => CertificateStatus::Pending,
            "PROCESSING" => CertificateStatus::Processing,
            "ACTIVE" => CertificateStatus::Active,
            "FAILED" => CertificateStatus::Failed,
            "REVOKED" => CertificateStatus::Revoked,
            _ => return None,
        })
    }

    pub fn can_transition(self, to: CertificateStatus) -> bool {
        use CertificateStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Active)
                | (Processing, Failed)
                | (Active, Revoked)
        )
    }
}

/// The issued credential. Facts are copied from the approved application at
/// issuance time (a point-in-time record, not live-linked).
#[derive(Debug, Clone)]
pub struct Certificate {
    pub id: i64,
    /// Unique human-facing certificate number, e.g. `CERT202406XYZ123`.
    pub cert_no: String,
    pub application_id: i64,
    pub student_id: String,
    pub student_user_id: i64,
    pub student_wallet: Option<String>,
    pub university_code: String,
    pub company_code: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub evaluation: Option<String>,
    pub status: CertificateStatus,
    /// Public, unique, unguessable lookup key for verification.
    pub verify_code: String,
    pub verify_url: String,
    pub qr_payload: String,
    /// Computed exactly once, at the first anchoring attempt. Present iff
    /// status is PROCESSING, ACTIVE, FAILED or REVOKED.
    pub cert_hash: Option<H256>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub chain_id: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    /// Operator-facing note from the last failed anchoring attempt.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set on every status transition; drives the reconciliation sweep.
    pub status_changed_at: DateTime<Utc>,
}

impl Certificate {
    /// Derives the certificate hash from the immutable facts. Deterministic:
    /// re-deriving after a failed attempt yields the same digest, which makes
    /// retries idempotent from the ledger's point of view.
    pub fn derive_hash(&self) -> H256 {
        compute_certificate_hash(
            &self.student_id,
            &self.university_code,
            &self.company_code,
            &self.position,
            date_to_unix(self.start_date),
            date_to_unix(self.end_date),
            &self.cert_no,
        )
    }

    /// Address submitted to the ledger for this certificate's student. Falls
    /// back to the student identifier when no wallet was captured.
    pub fn student_address(&self) -> String {
        self.student_wallet
            .clone()
            .unwrap_or_else(|| self.student_id.clone())
    }
}

/// Input for materializing a certificate on university approval.
#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub cert_no: String,
    pub application_id: i64,
    pub student_id: String,
    pub student_user_id: i64,
    pub student_wallet: Option<String>,
    pub university_code: String,
    pub company_code: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub evaluation: Option<String>,
    pub verify_code: String,
    pub verify_url: String,
    pub qr_payload: String,
}

#[cfg(test)]
mod tests {
    use super::CertificateStatus::*;
    use super::*;

    #[test]
    fn anchoring_transitions() {
        assert!(Pending.can_transition(Processing));
        assert!(Failed.can_transition(Processing));
        assert!(Processing.can_transition(Active));
        assert!(Processing.can_transition(Failed));
        assert!(Active.can_transition(Revoked));
    }

    #[test]
    fn revoked_is_irreversible_and_pending_cannot_skip() {
        for to in [Pending, Processing, Active, Failed, Revoked] {
            assert!(!Revoked.can_transition(to));
        }
        assert!(!Pending.can_transition(Active));
        assert!(!Pending.can_transition(Revoked));
        assert!(!Failed.can_transition(Active));
    }
}
