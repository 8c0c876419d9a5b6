//! The anchoring coordinator.
//!
//! Drives a certificate from "ready to anchor" to "confirmed on-chain" or
//! "failed". Anchoring requests are fire-and-forget: callers enqueue a job
//! and return immediately; a dedicated worker task performs the ledger
//! round-trip. The `PENDING/FAILED -> PROCESSING` transition is the sole
//! concurrency guard and is enforced as an atomic conditional update in the
//! store, never as a check-then-act sequence.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{interval, timeout};

use crate::crypto::hashing::date_to_unix;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::ledger::{
    AnchorRequest, BatchAnchorEntry, BatchAnchorRequest, LedgerError, LedgerGateway,
};
use crate::domain::model::{Actor, Certificate, CertificateStatus, Role};
use crate::infra::render::ArtifactRenderer;
use crate::storage::{CertificateStore, NotificationStore};

/// Hard cap on batch anchoring. Larger sets are rejected outright, never
/// silently truncated.
pub const MAX_BATCH_SIZE: usize = 50;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum AnchorJob {
    Single(i64),
    Batch(Vec<i64>),
}

/// Result of one anchoring attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// The submission was confirmed on-chain.
    Anchored { tx_hash: String, block_number: u64 },
    /// The gate was not taken: another attempt is in flight or the
    /// certificate is not in PENDING/FAILED.
    Skipped,
    /// The submission failed; the certificate is now FAILED and retry-safe.
    Failed(String),
}

/// Result of one batch anchoring attempt.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub anchored: Vec<i64>,
    pub skipped: Vec<i64>,
    pub failed: Vec<i64>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
}

pub struct AnchorService {
    certificates: Arc<dyn CertificateStore>,
    ledger: Arc<dyn LedgerGateway>,
    renderer: Arc<dyn ArtifactRenderer>,
    notifications: Arc<dyn NotificationStore>,
    /// Upper bound on one ledger call; a timeout counts as a submission
    /// failure.
    ledger_timeout_secs: u64,
    job_tx: mpsc::Sender<AnchorJob>,
    job_rx: Mutex<Option<mpsc::Receiver<AnchorJob>>>,
    shutdown: Arc<Notify>,
}

impl AnchorService {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        ledger: Arc<dyn LedgerGateway>,
        renderer: Arc<dyn ArtifactRenderer>,
        notifications: Arc<dyn NotificationStore>,
        ledger_timeout_secs: u64,
    ) -> Arc<Self> {
        let (job_tx, job_rx) = mpsc::channel(QUEUE_CAPACITY);
        Arc::new(Self {
            certificates,
            ledger,
            renderer,
            notifications,
            ledger_timeout_secs,
            job_tx,
            job_rx: Mutex::new(Some(job_rx)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Enqueues a single anchoring attempt and returns immediately. The
    /// outcome surfaces through subsequent status queries, never through
    /// this call.
    pub async fn enqueue(&self, certificate_id: i64) -> CoreResult<()> {
        self.certificates
            .get(certificate_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("certificate {}", certificate_id)))?;
        self.job_tx
            .send(AnchorJob::Single(certificate_id))
            .await
            .map_err(|e| CoreError::Storage(anyhow::anyhow!("anchor queue closed: {}", e)))?;
        Ok(())
    }

    /// Enqueues a batch anchoring attempt. The size cap is validated
    /// synchronously so the caller gets an immediate rejection.
    pub async fn enqueue_batch(&self, certificate_ids: Vec<i64>) -> CoreResult<()> {
        if certificate_ids.is_empty() {
            return Err(CoreError::Validation("batch is empty".to_string()));
        }
        if certificate_ids.len() > MAX_BATCH_SIZE {
            return Err(CoreError::Validation(format!(
                "batch of {} exceeds the maximum of {} certificates",
                certificate_ids.len(),
                MAX_BATCH_SIZE
            )));
        }
        self.job_tx
            .send(AnchorJob::Batch(certificate_ids))
            .await
            .map_err(|e| CoreError::Storage(anyhow::anyhow!("anchor queue closed: {}", e)))?;
        Ok(())
    }

    /// Performs one anchoring attempt. Called by the worker; also callable
    /// directly (manual retry, tests).
    pub async fn anchor_certificate(&self, certificate_id: i64) -> CoreResult<AnchorOutcome> {
        let cert = self
            .certificates
            .get(certificate_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("certificate {}", certificate_id)))?;

        // The hash is a pure function of immutable facts, so recomputing it
        // for a retry yields the same digest the first attempt assigned.
        let cert_hash = cert.cert_hash.unwrap_or_else(|| cert.derive_hash());

        let gated = self
            .certificates
            .begin_processing(certificate_id, cert_hash)
            .await?;
        if !gated {
            println!(
                "> AnchorService: certificate {} not eligible for anchoring (already in flight or terminal), skipping.",
                certificate_id
            );
            return Ok(AnchorOutcome::Skipped);
        }

        if !self.ledger.is_available().await {
            let msg = "ledger unavailable: liveness check failed before submission";
            self.certificates.mark_failed(certificate_id, msg).await?;
            eprintln!(
                "> AnchorService: certificate {} -> FAILED ({})",
                certificate_id, msg
            );
            return Ok(AnchorOutcome::Failed(msg.to_string()));
        }

        let request = AnchorRequest {
            cert_hash,
            student_address: cert.student_address(),
            student_id: cert.student_id.clone(),
            university_code: cert.university_code.clone(),
            company_code: cert.company_code.clone(),
            start_unix: date_to_unix(cert.start_date),
            end_unix: date_to_unix(cert.end_date),
        };

        let submit_result = match timeout(
            Duration::from_secs(self.ledger_timeout_secs),
            self.ledger.submit(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.ledger_timeout_secs)),
        };

        match submit_result {
            Ok(receipt) => {
                let applied = self
                    .certificates
                    .mark_active(
                        certificate_id,
                        &receipt.tx_hash,
                        receipt.block_number,
                        &self.ledger.chain_id(),
                        Utc::now(),
                    )
                    .await?;
                if !applied {
                    // The reconciliation sweep (or a concurrent actor) forced
                    // the row out of PROCESSING while the submission was in
                    // flight. The local record stays FAILED; a retry will
                    // reuse the same hash and the chain will report the
                    // existing record.
                    let msg = format!(
                        "confirmation landed after the attempt was reconciled (tx={})",
                        receipt.tx_hash
                    );
                    eprintln!(
                        "> AnchorService: certificate {} left PROCESSING before confirmation could apply ({})",
                        certificate_id, msg
                    );
                    return Ok(AnchorOutcome::Failed(msg));
                }
                println!(
                    "> AnchorService: certificate {} -> ACTIVE (tx={} block={} hash={})",
                    certificate_id,
                    receipt.tx_hash,
                    receipt.block_number,
                    hex::encode(cert_hash.as_bytes())
                );
                if let Some(active) = self.certificates.get(certificate_id).await? {
                    self.run_post_anchor_effects(&active).await;
                }
                Ok(AnchorOutcome::Anchored {
                    tx_hash: receipt.tx_hash,
                    block_number: receipt.block_number,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                if self.certificates.mark_failed(certificate_id, &msg).await? {
                    eprintln!(
                        "> AnchorService: certificate {} -> FAILED ({})",
                        certificate_id, msg
                    );
                } else {
                    eprintln!(
                        "> AnchorService: certificate {} already left PROCESSING, failure note dropped ({})",
                        certificate_id, msg
                    );
                }
                Ok(AnchorOutcome::Failed(msg))
            }
        }
    }

    /// Best-effort side effects after ACTIVE: document rendering and
    /// notification. Their failure is logged and never reverts the state.
    async fn run_post_anchor_effects(&self, cert: &Certificate) {
        match self.renderer.render(cert).await {
            Ok(artifact) => println!(
                "> AnchorService: rendered certificate document for {} ({} bytes, content hash {})",
                cert.cert_no,
                artifact.bytes.len(),
                hex::encode(artifact.content_hash.as_bytes())
            ),
            Err(e) => eprintln!(
                "> AnchorService: document rendering failed for {} (certificate stays ACTIVE): {}",
                cert.cert_no, e
            ),
        }
        if let Err(e) = self
            .notifications
            .push(
                cert.student_user_id,
                "Certificate anchored",
                &format!(
                    "Certificate {} is now verifiable at {}",
                    cert.cert_no, cert.verify_url
                ),
            )
            .await
        {
            eprintln!(
                "> AnchorService: failed to notify user {} about {}: {}",
                cert.student_user_id, cert.cert_no, e
            );
        }
    }

    /// Performs one batch anchoring attempt. The underlying submission is a
    /// single transaction, so the outcome is uniform: on success every gated
    /// member becomes ACTIVE sharing the same receipt, on failure every
    /// gated member becomes FAILED.
    pub async fn anchor_batch(&self, certificate_ids: Vec<i64>) -> CoreResult<BatchOutcome> {
        if certificate_ids.is_empty() {
            return Err(CoreError::Validation("batch is empty".to_string()));
        }
        if certificate_ids.len() > MAX_BATCH_SIZE {
            return Err(CoreError::Validation(format!(
                "batch of {} exceeds the maximum of {} certificates",
                certificate_ids.len(),
                MAX_BATCH_SIZE
            )));
        }

        let mut certs = Vec::with_capacity(certificate_ids.len());
        for id in &certificate_ids {
            let cert = self
                .certificates
                .get(*id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("certificate {}", id)))?;
            certs.push(cert);
        }

        // One transaction carries one university/company pair.
        let university_code = certs[0].university_code.clone();
        let company_code = certs[0].company_code.clone();
        if certs
            .iter()
            .any(|c| c.university_code != university_code || c.company_code != company_code)
        {
            return Err(CoreError::Validation(
                "batch members must share one university and one company".to_string(),
            ));
        }

        let mut outcome = BatchOutcome::default();
        let mut gated: Vec<(i64, Certificate, primitive_types::H256)> = Vec::new();
        for cert in certs {
            let cert_hash = cert.cert_hash.unwrap_or_else(|| cert.derive_hash());
            if self.certificates.begin_processing(cert.id, cert_hash).await? {
                gated.push((cert.id, cert, cert_hash));
            } else {
                println!(
                    "> AnchorService: batch member {} not in PENDING/FAILED, skipping.",
                    cert.id
                );
                outcome.skipped.push(cert.id);
            }
        }

        if gated.is_empty() {
            return Ok(outcome);
        }

        if !self.ledger.is_available().await {
            let msg = "ledger unavailable: liveness check failed before submission";
            for (id, _, _) in &gated {
                if !self.certificates.mark_failed(*id, msg).await? {
                    eprintln!(
                        "> AnchorService: batch member {} already left PROCESSING, failure note dropped",
                        id
                    );
                }
                outcome.failed.push(*id);
            }
            eprintln!(
                "> AnchorService: batch of {} -> FAILED ({})",
                gated.len(),
                msg
            );
            return Ok(outcome);
        }

        let request = BatchAnchorRequest {
            university_code,
            company_code,
            entries: gated
                .iter()
                .map(|(_, cert, hash)| BatchAnchorEntry {
                    cert_hash: *hash,
                    student_address: cert.student_address(),
                    student_id: cert.student_id.clone(),
                    start_unix: date_to_unix(cert.start_date),
                    end_unix: date_to_unix(cert.end_date),
                })
                .collect(),
        };

        let submit_result = match timeout(
            Duration::from_secs(self.ledger_timeout_secs),
            self.ledger.submit_batch(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.ledger_timeout_secs)),
        };

        match submit_result {
            Ok(receipt) => {
                let chain_id = self.ledger.chain_id();
                let issued_at = Utc::now();
                for (id, _, _) in &gated {
                    let applied = self
                        .certificates
                        .mark_active(*id, &receipt.tx_hash, receipt.block_number, &chain_id, issued_at)
                        .await?;
                    if !applied {
                        eprintln!(
                            "> AnchorService: batch member {} left PROCESSING before confirmation could apply, reporting it failed",
                            id
                        );
                        outcome.failed.push(*id);
                        continue;
                    }
                    outcome.anchored.push(*id);
                    if let Some(active) = self.certificates.get(*id).await? {
                        self.run_post_anchor_effects(&active).await;
                    }
                }
                println!(
                    "> AnchorService: batch of {} -> ACTIVE (tx={} block={})",
                    gated.len(),
                    receipt.tx_hash,
                    receipt.block_number
                );
                outcome.tx_hash = Some(receipt.tx_hash);
                outcome.block_number = Some(receipt.block_number);
                Ok(outcome)
            }
            Err(e) => {
                let msg = e.to_string();
                for (id, _, _) in &gated {
                    if !self.certificates.mark_failed(*id, &msg).await? {
                        eprintln!(
                            "> AnchorService: batch member {} already left PROCESSING, failure note dropped",
                            id
                        );
                    }
                    outcome.failed.push(*id);
                }
                eprintln!(
                    "> AnchorService: batch of {} -> FAILED ({})",
                    gated.len(),
                    msg
                );
                Ok(outcome)
            }
        }
    }

    /// Revokes an ACTIVE certificate. The local record always wins: if the
    /// ledger call fails, the certificate still becomes REVOKED and the
    /// discrepancy is logged for reconciliation.
    pub async fn revoke_certificate(
        &self,
        actor: &Actor,
        certificate_id: i64,
        reason: &str,
    ) -> CoreResult<Certificate> {
        if reason.trim().is_empty() {
            return Err(CoreError::Validation(
                "revocation reason must not be empty".to_string(),
            ));
        }
        let cert = self
            .certificates
            .get(certificate_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("certificate {}", certificate_id)))?;

        let authorized = actor.role == Role::Admin
            || (actor.role == Role::University && actor.is_member_of(&cert.university_code));
        if !authorized {
            return Err(CoreError::Authorization(
                "only the issuing university or an admin may revoke".to_string(),
            ));
        }
        if cert.status != CertificateStatus::Active {
            return Err(CoreError::Conflict(format!(
                "certificate {} is {}, only ACTIVE certificates can be revoked",
                certificate_id,
                cert.status.as_str()
            )));
        }

        if let Some(cert_hash) = cert.cert_hash {
            if self.ledger.is_available().await {
                let revoke_result = match timeout(
                    Duration::from_secs(self.ledger_timeout_secs),
                    self.ledger.revoke(cert_hash, reason),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LedgerError::Timeout(self.ledger_timeout_secs)),
                };
                match revoke_result {
                    Ok(tx_hash) => println!(
                        "> AnchorService: revoked certificate {} on-chain (tx={})",
                        certificate_id, tx_hash
                    ),
                    Err(e) => eprintln!(
                        "> AnchorService: WARNING: on-chain revoke failed for certificate {}; local record revoked anyway, needs reconciliation: {}",
                        certificate_id, e
                    ),
                }
            } else {
                eprintln!(
                    "> AnchorService: WARNING: ledger unavailable while revoking certificate {}; local record revoked anyway, needs reconciliation.",
                    certificate_id
                );
            }
        }

        let revoked = self
            .certificates
            .mark_revoked(certificate_id, reason, Utc::now())
            .await?;
        if !revoked {
            return Err(CoreError::Conflict(format!(
                "certificate {} changed status while revoking",
                certificate_id
            )));
        }

        if let Err(e) = self
            .notifications
            .push(
                cert.student_user_id,
                "Certificate revoked",
                &format!("Certificate {} was revoked: {}", cert.cert_no, reason),
            )
            .await
        {
            eprintln!(
                "> AnchorService: failed to notify user {} about revocation: {}",
                cert.student_user_id, e
            );
        }

        self.certificates
            .get(certificate_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("certificate {}", certificate_id)))
    }

    /// Forces certificates stuck in PROCESSING past the timeout window back
    /// to FAILED. Run periodically by the sweep task; also callable as a
    /// manual override.
    pub async fn reconcile_stuck(&self) -> CoreResult<usize> {
        // Twice the call timeout: an in-flight attempt has certainly either
        // resolved or timed out by then.
        let window = chrono::Duration::seconds((self.ledger_timeout_secs * 2) as i64);
        let cutoff = Utc::now() - window;
        let stuck = self.certificates.find_stuck_processing(cutoff).await?;
        let mut reconciled = 0;
        for id in stuck {
            if self
                .certificates
                .mark_failed(id, "anchoring attempt timed out (reconciliation sweep)")
                .await?
            {
                println!(
                    "> AnchorService: reconciliation sweep forced certificate {} PROCESSING -> FAILED",
                    id
                );
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }

    /// Starts the worker task consuming the anchoring queue.
    pub fn start_worker(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut rx = match self.job_rx.lock().await.take() {
                Some(rx) => rx,
                None => {
                    eprintln!("> AnchorService: worker already started, ignoring.");
                    return;
                }
            };
            let shutdown = self.shutdown.clone();
            loop {
                tokio::select! {
                    job = rx.recv() => match job {
                        Some(AnchorJob::Single(id)) => {
                            if let Err(e) = self.anchor_certificate(id).await {
                                eprintln!("> AnchorService: anchoring of certificate {} errored: {}", id, e);
                            }
                        }
                        Some(AnchorJob::Batch(ids)) => {
                            if let Err(e) = self.anchor_batch(ids).await {
                                eprintln!("> AnchorService: batch anchoring errored: {}", e);
                            }
                        }
                        None => break,
                    },
                    _ = shutdown.notified() => {
                        println!("> AnchorService: worker shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Starts the periodic reconciliation sweep.
    pub fn start_reconciliation_sweep(self: Arc<Self>, interval_secs: u64) {
        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
            let shutdown = self.shutdown.clone();
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(e) = self.reconcile_stuck().await {
                            eprintln!("> AnchorService: reconciliation sweep errored: {}", e);
                        }
                    }
                    _ = shutdown.notified() => {
                        println!("> AnchorService: reconciliation sweep shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Stops the worker and the sweep.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}
