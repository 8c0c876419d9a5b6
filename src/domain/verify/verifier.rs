use chrono::Utc;
use std::sync::Arc;

use super::VerifyKey;
use crate::domain::ledger::{LedgerGateway, LedgerRecord};
use crate::domain::model::{Certificate, CertificateStatus};
use crate::storage::{AuditStore, CertificateStore, VerificationAudit};

/// What the ledger said about a certificate hash, when it was consulted.
#[derive(Debug, Clone)]
pub struct LedgerVerdict {
    /// False when the ledger could not be reached; `found`/`valid` are then
    /// meaningless and the verdict falls back to the local record.
    pub available: bool,
    pub found: bool,
    pub valid: bool,
    pub record: Option<LedgerRecord>,
}

/// The composite verification verdict returned to the public endpoint.
#[derive(Debug, Clone)]
pub struct VerificationVerdict {
    pub found: bool,
    pub valid: bool,
    pub status: Option<CertificateStatus>,
    pub certificate: Option<Certificate>,
    pub ledger: Option<LedgerVerdict>,
}

impl VerificationVerdict {
    fn not_found() -> Self {
        Self {
            found: false,
            valid: false,
            status: None,
            certificate: None,
            ledger: None,
        }
    }
}

pub struct VerificationService {
    certificates: Arc<dyn CertificateStore>,
    ledger: Arc<dyn LedgerGateway>,
    audits: Arc<dyn AuditStore>,
}

impl VerificationService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        ledger: Arc<dyn LedgerGateway>,
        audits: Arc<dyn AuditStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            certificates,
            ledger,
            audits,
        })
    }

    /// Resolves a verification key to a verdict.
    ///
    /// A locally REVOKED certificate is invalid unconditionally. Otherwise
    /// the verdict is the union of the local and the on-chain view, so a
    /// certificate issued but not yet anchored still verifies, and an
    /// anchored one stays verifiable while the database and the chain
    /// disagree transiently.
    pub async fn resolve(&self, key: &VerifyKey, origin: &str) -> anyhow::Result<VerificationVerdict> {
        let local = match key {
            VerifyKey::Code(code) => self.certificates.get_by_verify_code(code).await?,
            VerifyKey::Number(no) => self.certificates.get_by_cert_no(no).await?,
            VerifyKey::Hash(hash) => self.certificates.get_by_hash(*hash).await?,
        };

        let verdict = match local {
            Some(cert) if cert.status == CertificateStatus::Revoked => VerificationVerdict {
                found: true,
                valid: false,
                status: Some(cert.status),
                certificate: Some(cert),
                ledger: None,
            },
            Some(cert) => {
                let ledger = match cert.cert_hash {
                    Some(hash) => Some(self.consult_ledger(hash).await),
                    None => None,
                };
                let locally_valid = matches!(
                    cert.status,
                    CertificateStatus::Active | CertificateStatus::Pending
                );
                let ledger_valid = ledger.as_ref().map(|l| l.valid).unwrap_or(false);
                VerificationVerdict {
                    found: true,
                    valid: locally_valid || ledger_valid,
                    status: Some(cert.status),
                    certificate: Some(cert),
                    ledger,
                }
            }
            // Hash keys fall through to the ledger: a record anchored by
            // another deployment of the same contract is still verifiable.
            None => match key {
                VerifyKey::Hash(hash) => {
                    let ledger = self.consult_ledger(*hash).await;
                    VerificationVerdict {
                        found: ledger.found,
                        valid: ledger.valid,
                        status: None,
                        certificate: None,
                        ledger: Some(ledger),
                    }
                }
                _ => VerificationVerdict::not_found(),
            },
        };

        self.spawn_audit(key, origin, &verdict);
        Ok(verdict)
    }

    async fn consult_ledger(&self, hash: primitive_types::H256) -> LedgerVerdict {
        match self.ledger.query(hash).await {
            Ok(Some(record)) => LedgerVerdict {
                available: true,
                found: true,
                valid: record.valid,
                record: Some(record),
            },
            Ok(None) => LedgerVerdict {
                available: true,
                found: false,
                valid: false,
                record: None,
            },
            Err(e) => {
                eprintln!(
                    "> VerificationService: ledger query failed for 0x{}: {}",
                    hex::encode(hash.as_bytes()),
                    e
                );
                LedgerVerdict {
                    available: false,
                    found: false,
                    valid: false,
                    record: None,
                }
            }
        }
    }

    /// Records the attempt without blocking the response. Audit failure is
    /// logged and otherwise ignored.
    fn spawn_audit(&self, key: &VerifyKey, origin: &str, verdict: &VerificationVerdict) {
        let audit = VerificationAudit {
            key_kind: key.kind().to_string(),
            key: key.display(),
            origin: origin.to_string(),
            found: verdict.found,
            valid: verdict.valid,
            at: Utc::now(),
        };
        let audits = self.audits.clone();
        tokio::spawn(async move {
            if let Err(e) = audits.record_verification(&audit).await {
                eprintln!("> VerificationService: failed to record audit: {}", e);
            }
        });
    }
}
