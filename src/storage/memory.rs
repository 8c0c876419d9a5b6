//! In-memory store backing the test suite and local development.
//!
//! All maps live behind a single async mutex, which makes every conditional
//! update naturally atomic: the compare and the set happen under one lock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::H256;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::model::{
    Application, ApplicationStatus, Certificate, CertificateStatus, CompanyReview, DraftUpdate,
    NewApplication, NewCertificate, OrgKind, Organization, RejectionStage, UniversityReview,
    WhitelistEntry,
};
use crate::storage::{
    ApplicationStore, AuditStore, CertificateStore, NotificationStore, OrganizationStore,
    VerificationAudit, WhitelistStore,
};

#[derive(Default)]
struct Inner {
    applications: HashMap<i64, Application>,
    certificates: HashMap<i64, Certificate>,
    whitelist: HashMap<String, WhitelistEntry>,
    organizations: HashMap<String, Organization>,
    org_members: Vec<(String, i64)>,
    audits: Vec<VerificationAudit>,
    notifications: Vec<(i64, String, String)>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded verification audits (test inspection).
    pub async fn verification_audits(&self) -> Vec<VerificationAudit> {
        self.inner.lock().await.audits.clone()
    }

    /// Rewinds a certificate's status-change clock (test inspection of the
    /// reconciliation sweep).
    pub async fn backdate_status_change(&self, id: i64, at: DateTime<Utc>) {
        if let Some(cert) = self.inner.lock().await.certificates.get_mut(&id) {
            cert.status_changed_at = at;
        }
    }

    /// Number of certificate rows (test inspection).
    pub async fn certificate_count(&self) -> usize {
        self.inner.lock().await.certificates.len()
    }

    /// Notifications addressed to a user (test inspection).
    pub async fn notifications_for(&self, user_id: i64) -> Vec<(String, String)> {
        self.inner
            .lock()
            .await
            .notifications
            .iter()
            .filter(|(uid, _, _)| *uid == user_id)
            .map(|(_, title, body)| (title.clone(), body.clone()))
            .collect()
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert(
        &self,
        new: &NewApplication,
        app_no: &str,
        university_code: &str,
    ) -> Result<Application> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let app = Application {
            id: inner.next_id(),
            app_no: app_no.to_string(),
            student_id: new.student_id.clone(),
            student_user_id: new.student_user_id,
            student_wallet: new.student_wallet.clone(),
            university_code: university_code.to_string(),
            company_code: new.company_code.clone(),
            position: new.position.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            description: new.description.clone(),
            status: ApplicationStatus::Draft,
            company_score: None,
            company_evaluation: None,
            company_signature: None,
            company_reviewer: None,
            company_reviewed_at: None,
            university_note: None,
            university_approver: None,
            university_reviewed_at: None,
            certificate_id: None,
            rejection_stage: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        inner.applications.insert(app.id, app.clone());
        Ok(app)
    }

    async fn get(&self, id: i64) -> Result<Option<Application>> {
        Ok(self.inner.lock().await.applications.get(&id).cloned())
    }

    async fn list_for_student(&self, student_user_id: i64) -> Result<Vec<Application>> {
        let inner = self.inner.lock().await;
        let mut apps: Vec<_> = inner
            .applications
            .values()
            .filter(|a| a.student_user_id == student_user_id)
            .cloned()
            .collect();
        apps.sort_by_key(|a| a.id);
        Ok(apps)
    }

    async fn update_draft(&self, id: i64, update: &DraftUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let app = inner
            .applications
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("application {} not found", id))?;
        if let Some(v) = &update.company_code {
            app.company_code = v.clone();
        }
        if let Some(v) = &update.position {
            app.position = v.clone();
        }
        if let Some(v) = update.start_date {
            app.start_date = v;
        }
        if let Some(v) = update.end_date {
            app.end_date = v;
        }
        if let Some(v) = &update.description {
            app.description = v.clone();
        }
        app.updated_at = Utc::now();
        Ok(())
    }

    async fn set_status(
        &self,
        id: i64,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if !from.contains(&app.status) {
            return Ok(false);
        }
        app.status = to;
        app.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_company_review(
        &self,
        id: i64,
        review: &CompanyReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if !from.contains(&app.status) {
            return Ok(false);
        }
        app.company_score = Some(review.score);
        app.company_evaluation = review.evaluation.clone();
        app.company_signature = Some(review.signature.clone());
        app.company_reviewer = Some(review.reviewer.clone());
        app.company_reviewed_at = Some(review.reviewed_at);
        app.status = to;
        app.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_university_review(
        &self,
        id: i64,
        review: &UniversityReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if !from.contains(&app.status) {
            return Ok(false);
        }
        app.university_note = review.note.clone();
        app.university_approver = Some(review.approver.clone());
        app.university_reviewed_at = Some(review.reviewed_at);
        app.status = to;
        app.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_rejection(
        &self,
        id: i64,
        stage: RejectionStage,
        reason: &str,
        from: &[ApplicationStatus],
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if !from.contains(&app.status) {
            return Ok(false);
        }
        app.rejection_stage = Some(stage);
        app.rejection_reason = Some(reason.to_string());
        app.status = ApplicationStatus::Rejected;
        app.updated_at = Utc::now();
        Ok(true)
    }

    async fn link_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if app.certificate_id.is_some() {
            return Ok(false);
        }
        app.certificate_id = Some(certificate_id);
        app.updated_at = Utc::now();
        Ok(true)
    }

    async fn unlink_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let app = match inner.applications.get_mut(&id) {
            Some(a) => a,
            None => return Ok(false),
        };
        if app.certificate_id != Some(certificate_id) {
            return Ok(false);
        }
        app.certificate_id = None;
        app.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn insert(&self, new: &NewCertificate) -> Result<Certificate> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let cert = Certificate {
            id: inner.next_id(),
            cert_no: new.cert_no.clone(),
            application_id: new.application_id,
            student_id: new.student_id.clone(),
            student_user_id: new.student_user_id,
            student_wallet: new.student_wallet.clone(),
            university_code: new.university_code.clone(),
            company_code: new.company_code.clone(),
            position: new.position.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            description: new.description.clone(),
            evaluation: new.evaluation.clone(),
            status: CertificateStatus::Pending,
            verify_code: new.verify_code.clone(),
            verify_url: new.verify_url.clone(),
            qr_payload: new.qr_payload.clone(),
            cert_hash: None,
            tx_hash: None,
            block_number: None,
            chain_id: None,
            issued_at: None,
            revoked_at: None,
            revoke_reason: None,
            last_error: None,
            created_at: now,
            status_changed_at: now,
        };
        inner.certificates.insert(cert.id, cert.clone());
        Ok(cert)
    }

    async fn get(&self, id: i64) -> Result<Option<Certificate>> {
        Ok(self.inner.lock().await.certificates.get(&id).cloned())
    }

    async fn get_by_verify_code(&self, verify_code: &str) -> Result<Option<Certificate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .certificates
            .values()
            .find(|c| c.verify_code == verify_code)
            .cloned())
    }

    async fn get_by_cert_no(&self, cert_no: &str) -> Result<Option<Certificate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .certificates
            .values()
            .find(|c| c.cert_no == cert_no)
            .cloned())
    }

    async fn get_by_hash(&self, cert_hash: H256) -> Result<Option<Certificate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .certificates
            .values()
            .find(|c| c.cert_hash == Some(cert_hash))
            .cloned())
    }

    async fn begin_processing(&self, id: i64, cert_hash: H256) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let cert = match inner.certificates.get_mut(&id) {
            Some(c) => c,
            None => return Ok(false),
        };
        if !matches!(
            cert.status,
            CertificateStatus::Pending | CertificateStatus::Failed
        ) {
            return Ok(false);
        }
        cert.status = CertificateStatus::Processing;
        cert.cert_hash.get_or_insert(cert_hash);
        cert.status_changed_at = Utc::now();
        Ok(true)
    }

    async fn mark_active(
        &self,
        id: i64,
        tx_hash: &str,
        block_number: u64,
        chain_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let cert = match inner.certificates.get_mut(&id) {
            Some(c) => c,
            None => return Ok(false),
        };
        if cert.status != CertificateStatus::Processing {
            return Ok(false);
        }
        cert.status = CertificateStatus::Active;
        cert.tx_hash = Some(tx_hash.to_string());
        cert.block_number = Some(block_number);
        cert.chain_id = Some(chain_id.to_string());
        cert.issued_at = Some(issued_at);
        cert.last_error = None;
        cert.status_changed_at = Utc::now();
        Ok(true)
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let cert = match inner.certificates.get_mut(&id) {
            Some(c) => c,
            None => return Ok(false),
        };
        if cert.status != CertificateStatus::Processing {
            return Ok(false);
        }
        cert.status = CertificateStatus::Failed;
        cert.last_error = Some(error.to_string());
        cert.status_changed_at = Utc::now();
        Ok(true)
    }

    async fn mark_revoked(
        &self,
        id: i64,
        reason: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let cert = match inner.certificates.get_mut(&id) {
            Some(c) => c,
            None => return Ok(false),
        };
        if cert.status != CertificateStatus::Active {
            return Ok(false);
        }
        cert.status = CertificateStatus::Revoked;
        cert.revoked_at = Some(revoked_at);
        cert.revoke_reason = Some(reason.to_string());
        cert.status_changed_at = Utc::now();
        Ok(true)
    }

    async fn find_stuck_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<i64> = inner
            .certificates
            .values()
            .filter(|c| {
                c.status == CertificateStatus::Processing && c.status_changed_at < older_than
            })
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.inner.lock().await.certificates.remove(&id).is_some())
    }
}

#[async_trait]
impl WhitelistStore for MemoryStore {
    async fn get(&self, student_id: &str) -> Result<Option<WhitelistEntry>> {
        Ok(self.inner.lock().await.whitelist.get(student_id).cloned())
    }

    async fn insert(&self, student_id: &str, university_code: &str) -> Result<WhitelistEntry> {
        let mut inner = self.inner.lock().await;
        let entry = WhitelistEntry {
            id: inner.next_id(),
            student_id: student_id.to_string(),
            university_code: university_code.to_string(),
            used: false,
            used_at: None,
            created_at: Utc::now(),
        };
        inner.whitelist.insert(student_id.to_string(), entry.clone());
        Ok(entry)
    }

    async fn consume(&self, student_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let entry = match inner.whitelist.get_mut(student_id) {
            Some(e) => e,
            None => return Ok(false),
        };
        if entry.used {
            return Ok(false);
        }
        entry.used = true;
        entry.used_at = Some(Utc::now());
        Ok(true)
    }

    async fn reset(&self, student_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let entry = match inner.whitelist.get_mut(student_id) {
            Some(e) => e,
            None => return Ok(false),
        };
        entry.used = false;
        entry.used_at = None;
        Ok(true)
    }
}

#[async_trait]
impl OrganizationStore for MemoryStore {
    async fn upsert(&self, code: &str, name: &str, kind: OrgKind) -> Result<Organization> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.organizations.get(code) {
            return Ok(existing.clone());
        }
        let org = Organization {
            id: inner.next_id(),
            code: code.to_string(),
            name: name.to_string(),
            kind,
            created_at: Utc::now(),
        };
        inner.organizations.insert(code.to_string(), org.clone());
        Ok(org)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Organization>> {
        Ok(self.inner.lock().await.organizations.get(code).cloned())
    }

    async fn bind_member(&self, code: &str, user_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner
            .org_members
            .iter()
            .any(|(c, u)| c == code && *u == user_id)
        {
            inner.org_members.push((code.to_string(), user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn record_verification(&self, audit: &VerificationAudit) -> Result<()> {
        self.inner.lock().await.audits.push(audit.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn push(&self, user_id: i64, title: &str, body: &str) -> Result<()> {
        self.inner
            .lock()
            .await
            .notifications
            .push((user_id, title.to_string(), body.to_string()));
        Ok(())
    }
}
