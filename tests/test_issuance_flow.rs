//! End-to-end lifecycle: application through approval, anchoring and
//! revocation.

mod common;

use common::*;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use cert_anchor::app::anchor::{AnchorOutcome, AnchorService};
use cert_anchor::app::workflow::WorkflowService;
use cert_anchor::domain::ledger::AnchorReceipt;
use cert_anchor::domain::model::{
    Application, ApplicationStatus, CertificateStatus, CompanyReview, DraftUpdate, NewApplication,
    RejectionStage, UniversityReview,
};
use cert_anchor::domain::verify::VerifyKey;
use cert_anchor::infra::render::TextCertificateRenderer;
use cert_anchor::storage::{ApplicationStore, MemoryStore, WhitelistStore};

#[tokio::test]
async fn full_lifecycle_issue_anchor_revoke() {
    let fx = fixture();
    whitelist(&fx, "S1").await;

    // Student drafts and submits.
    let app = fx
        .workflow
        .create_application(&student(1), new_application("S1", 1))
        .await
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::Draft);
    assert_eq!(app.university_code, "U");

    fx.workflow.submit(&student(1), app.id).await.unwrap();

    // Company approves with a score; the signature digest is recorded.
    let app = fx
        .workflow
        .company_approve(&company_member(100, "C"), app.id, 90, Some("Strong intern".to_string()))
        .await
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::CompanyApproved);
    assert_eq!(app.company_score, Some(90));
    assert!(app.company_signature.is_some());

    // University approval issues a PENDING certificate with no hash yet.
    let (app, cert) = fx
        .workflow
        .university_approve(&university_member(200, "U"), app.id, None)
        .await
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::Approved);
    assert_eq!(app.certificate_id, Some(cert.id));
    assert_eq!(cert.status, CertificateStatus::Pending);
    assert!(cert.cert_hash.is_none());
    assert!(cert.cert_no.starts_with("CERT"));

    // Anchoring confirms on the mock chain.
    fx.ledger.push_submit_result(Ok(AnchorReceipt {
        tx_hash: "0xabc".to_string(),
        block_number: 1000,
    }));
    let outcome = fx.anchors.anchor_certificate(cert.id).await.unwrap();
    assert_eq!(
        outcome,
        AnchorOutcome::Anchored {
            tx_hash: "0xabc".to_string(),
            block_number: 1000
        }
    );

    let cert = get_cert(&fx, cert.id).await;
    assert_eq!(cert.status, CertificateStatus::Active);
    assert!(cert.cert_hash.is_some());
    assert_eq!(cert.tx_hash.as_deref(), Some("0xabc"));
    assert_eq!(cert.block_number, Some(1000));
    assert_eq!(cert.chain_id.as_deref(), Some("mock-chain"));

    // The student was notified about issuance and anchoring.
    assert!(!fx.store.notifications_for(1).await.is_empty());

    // Revocation is terminal and wins locally.
    let cert = fx
        .anchors
        .revoke_certificate(&university_member(200, "U"), cert.id, "misconduct")
        .await
        .unwrap();
    assert_eq!(cert.status, CertificateStatus::Revoked);
    assert_eq!(cert.revoke_reason.as_deref(), Some("misconduct"));
    assert_eq!(fx.ledger.revoked.lock().unwrap().len(), 1);

    // A revoked certificate never verifies valid.
    let verdict = fx
        .verifier
        .resolve(&VerifyKey::Code(cert.verify_code.clone()), "test")
        .await
        .unwrap();
    assert!(verdict.found);
    assert!(!verdict.valid);
    assert_eq!(verdict.status, Some(CertificateStatus::Revoked));
}

#[tokio::test]
async fn draft_editing_and_withdrawal() {
    let fx = fixture();
    whitelist(&fx, "S2").await;

    let app = fx
        .workflow
        .create_application(&student(2), new_application("S2", 2))
        .await
        .unwrap();

    // Draft edits apply only the provided fields.
    let app = fx
        .workflow
        .update_draft(
            &student(2),
            app.id,
            DraftUpdate {
                position: Some("Backend Intern".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(app.position, "Backend Intern");
    assert_eq!(app.company_code, "C");

    fx.workflow.submit(&student(2), app.id).await.unwrap();

    // Editing after submission is a conflict.
    let err = fx
        .workflow
        .update_draft(
            &student(2),
            app.id,
            DraftUpdate {
                position: Some("Other".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conflict"));

    // Withdrawal is allowed before the company signs.
    let app = fx.workflow.withdraw(&student(2), app.id).await.unwrap();
    assert_eq!(app.status, ApplicationStatus::Withdrawn);

    // And terminal: nothing moves afterwards.
    assert!(fx.workflow.submit(&student(2), app.id).await.is_err());
}

#[tokio::test]
async fn withdrawal_blocked_after_company_signature() {
    let fx = fixture();
    whitelist(&fx, "S3").await;

    let app = fx
        .workflow
        .create_application(&student(3), new_application("S3", 3))
        .await
        .unwrap();
    fx.workflow.submit(&student(3), app.id).await.unwrap();
    fx.workflow
        .company_approve(&company_member(100, "C"), app.id, 75, None)
        .await
        .unwrap();

    let err = fx.workflow.withdraw(&student(3), app.id).await.unwrap_err();
    assert!(err.to_string().contains("conflict"));
}

#[tokio::test]
async fn rejection_records_stage_and_reason() {
    let fx = fixture();
    whitelist(&fx, "S4").await;

    let app = fx
        .workflow
        .create_application(&student(4), new_application("S4", 4))
        .await
        .unwrap();
    fx.workflow.submit(&student(4), app.id).await.unwrap();

    // A rejection without a reason is invalid input.
    assert!(fx
        .workflow
        .company_reject(&company_member(100, "C"), app.id, "  ")
        .await
        .is_err());

    let app = fx
        .workflow
        .company_reject(&company_member(100, "C"), app.id, "dates do not match records")
        .await
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::Rejected);
    assert_eq!(
        app.rejection_reason.as_deref(),
        Some("dates do not match records")
    );
    assert!(app.rejection_stage.is_some());
}

#[tokio::test]
async fn authorization_boundaries() {
    let fx = fixture();
    whitelist(&fx, "S5").await;

    let app = fx
        .workflow
        .create_application(&student(5), new_application("S5", 5))
        .await
        .unwrap();
    fx.workflow.submit(&student(5), app.id).await.unwrap();

    // A member of another company cannot review.
    assert!(fx
        .workflow
        .company_approve(&company_member(100, "OTHER"), app.id, 90, None)
        .await
        .is_err());

    // Another student cannot see the application; the owner can.
    assert!(fx.workflow.get_application(&student(6), app.id).await.is_err());
    assert!(fx.workflow.get_application(&student(5), app.id).await.is_ok());
    assert!(fx.workflow.get_application(&admin(999), app.id).await.is_ok());

    // Universities cannot approve before the company does.
    assert!(fx
        .workflow
        .university_approve(&university_member(200, "U"), app.id, None)
        .await
        .is_err());
}

#[tokio::test]
async fn double_approval_issues_one_certificate() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "S6", 6).await;

    let cert = get_cert(&fx, cert_id).await;
    let app = get_app(&fx, cert.application_id).await;

    // A second university approval must not mint another certificate.
    let err = fx
        .workflow
        .university_approve(&university_member(200, "U"), app.id, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conflict"));
    assert_eq!(app.certificate_id, Some(cert_id));
}

#[tokio::test]
async fn score_bounds_are_enforced() {
    let fx = fixture();
    whitelist(&fx, "S7").await;

    let app = fx
        .workflow
        .create_application(&student(7), new_application("S7", 7))
        .await
        .unwrap();
    fx.workflow.submit(&student(7), app.id).await.unwrap();

    for bad in [0, -5, 101] {
        assert!(fx
            .workflow
            .company_approve(&company_member(100, "C"), app.id, bad, None)
            .await
            .is_err());
    }
    assert!(fx
        .workflow
        .company_approve(&company_member(100, "C"), app.id, 100, None)
        .await
        .is_ok());
}

/// Delegates to the memory store but loses a chosen race, reproducing the
/// interleavings of two concurrent university reviews deterministically.
struct RacingApplicationStore {
    inner: Arc<MemoryStore>,
    /// Deny the certificate link, as if a concurrent approval linked first.
    lose_link: bool,
    /// Commit a university rejection just before the approval's review
    /// update, as if a concurrent reject landed in between.
    reject_before_review: bool,
}

#[async_trait]
impl ApplicationStore for RacingApplicationStore {
    async fn insert(
        &self,
        new: &NewApplication,
        app_no: &str,
        university_code: &str,
    ) -> Result<Application> {
        ApplicationStore::insert(self.inner.as_ref(), new, app_no, university_code).await
    }

    async fn get(&self, id: i64) -> Result<Option<Application>> {
        ApplicationStore::get(self.inner.as_ref(), id).await
    }

    async fn list_for_student(&self, student_user_id: i64) -> Result<Vec<Application>> {
        self.inner.list_for_student(student_user_id).await
    }

    async fn update_draft(&self, id: i64, update: &DraftUpdate) -> Result<()> {
        self.inner.update_draft(id, update).await
    }

    async fn set_status(
        &self,
        id: i64,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        self.inner.set_status(id, from, to).await
    }

    async fn record_company_review(
        &self,
        id: i64,
        review: &CompanyReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        self.inner.record_company_review(id, review, from, to).await
    }

    async fn record_university_review(
        &self,
        id: i64,
        review: &UniversityReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        if self.reject_before_review {
            self.inner
                .record_rejection(
                    id,
                    RejectionStage::University,
                    "raced",
                    &[ApplicationStatus::UniversityReviewing],
                )
                .await?;
        }
        self.inner
            .record_university_review(id, review, from, to)
            .await
    }

    async fn record_rejection(
        &self,
        id: i64,
        stage: RejectionStage,
        reason: &str,
        from: &[ApplicationStatus],
    ) -> Result<bool> {
        self.inner.record_rejection(id, stage, reason, from).await
    }

    async fn link_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        if self.lose_link {
            return Ok(false);
        }
        self.inner.link_certificate(id, certificate_id).await
    }

    async fn unlink_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        self.inner.unlink_certificate(id, certificate_id).await
    }
}

fn racing_fixture(
    lose_link: bool,
    reject_before_review: bool,
) -> (Arc<MemoryStore>, Arc<WorkflowService>) {
    let store = Arc::new(MemoryStore::new());
    let apps = Arc::new(RacingApplicationStore {
        inner: store.clone(),
        lose_link,
        reject_before_review,
    });
    let ledger = MockLedger::new();
    let anchors = AnchorService::new(
        store.clone(),
        ledger,
        Arc::new(TextCertificateRenderer),
        store.clone(),
        5,
    );
    let workflow = WorkflowService::new(
        apps,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        anchors,
        "https://certs.example".to_string(),
        false,
    );
    (store, workflow)
}

async fn drive_to_company_approved(store: &Arc<MemoryStore>, workflow: &WorkflowService) -> i64 {
    WhitelistStore::insert(store.as_ref(), "S8", "U")
        .await
        .unwrap();
    let app = workflow
        .create_application(&student(8), new_application("S8", 8))
        .await
        .unwrap();
    workflow.submit(&student(8), app.id).await.unwrap();
    workflow
        .company_approve(&company_member(100, "C"), app.id, 90, None)
        .await
        .unwrap();
    app.id
}

#[tokio::test]
async fn lost_link_race_discards_the_inserted_certificate() {
    let (store, workflow) = racing_fixture(true, false);
    let app_id = drive_to_company_approved(&store, &workflow).await;

    let err = workflow
        .university_approve(&university_member(200, "U"), app_id, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conflict"));

    // The losing row must not survive as a verifiable, anchorable
    // PENDING certificate.
    assert_eq!(store.certificate_count().await, 0);
}

#[tokio::test]
async fn rejection_racing_approval_leaves_no_certificate() {
    let (store, workflow) = racing_fixture(false, true);
    let app_id = drive_to_company_approved(&store, &workflow).await;

    let err = workflow
        .university_approve(&university_member(200, "U"), app_id, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conflict"));

    // Rejection is terminal and issues nothing: no link, no row.
    let app = ApplicationStore::get(store.as_ref(), app_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.status, ApplicationStatus::Rejected);
    assert_eq!(app.certificate_id, None);
    assert_eq!(store.certificate_count().await, 0);
}
