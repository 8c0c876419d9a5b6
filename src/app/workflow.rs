//! The approval workflow.
//!
//! Guards every application transition with the state-machine table and the
//! caller's role, persists accepted reviews atomically with the transition,
//! and materializes the certificate on final approval. All status changes go
//! through conditional store updates, so a lost race surfaces as a CONFLICT
//! instead of a double transition.

use chrono::Utc;
use std::sync::Arc;

use crate::app::anchor::AnchorService;
use crate::crypto::hashing::company_signature_digest;
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::model::codes;
use crate::domain::model::{
    Actor, Application, ApplicationStatus, Certificate, CompanyReview, DraftUpdate,
    NewApplication, NewCertificate, OrgKind, Organization, RejectionStage, Role,
    UniversityReview, WhitelistEntry,
};
use crate::storage::{
    ApplicationStore, CertificateStore, NotificationStore, OrganizationStore, WhitelistStore,
};

pub struct WorkflowService {
    applications: Arc<dyn ApplicationStore>,
    certificates: Arc<dyn CertificateStore>,
    whitelist: Arc<dyn WhitelistStore>,
    organizations: Arc<dyn OrganizationStore>,
    notifications: Arc<dyn NotificationStore>,
    anchors: Arc<AnchorService>,
    verify_base_url: String,
    /// When set, a freshly issued certificate is enqueued for anchoring
    /// immediately instead of waiting for an explicit trigger.
    anchor_immediately: bool,
}

impl WorkflowService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        certificates: Arc<dyn CertificateStore>,
        whitelist: Arc<dyn WhitelistStore>,
        organizations: Arc<dyn OrganizationStore>,
        notifications: Arc<dyn NotificationStore>,
        anchors: Arc<AnchorService>,
        verify_base_url: String,
        anchor_immediately: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            applications,
            certificates,
            whitelist,
            organizations,
            notifications,
            anchors,
            verify_base_url,
            anchor_immediately,
        })
    }

    // ----- student registration -----------------------------------------

    /// Registers a student against their whitelist entry. The entry is
    /// consumed exactly once; a repeated attempt is a CONFLICT.
    pub async fn register_student(&self, student_id: &str) -> CoreResult<WhitelistEntry> {
        let entry = self
            .whitelist
            .get(student_id)
            .await?
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "student {} is not whitelisted by any university",
                    student_id
                ))
            })?;
        if !self.whitelist.consume(student_id).await? {
            return Err(CoreError::Conflict(format!(
                "whitelist entry for {} has already been used",
                student_id
            )));
        }
        println!(
            "> WorkflowService: student {} registered under university {}",
            student_id, entry.university_code
        );
        self.whitelist
            .get(student_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("whitelist entry for {}", student_id)))
    }

    pub async fn whitelist_status(&self, student_id: &str) -> CoreResult<Option<WhitelistEntry>> {
        Ok(self.whitelist.get(student_id).await?)
    }

    pub async fn add_whitelist_entry(
        &self,
        actor: &Actor,
        student_id: &str,
        university_code: &str,
    ) -> CoreResult<WhitelistEntry> {
        self.require_admin(actor)?;
        Ok(self.whitelist.insert(student_id, university_code).await?)
    }

    pub async fn reset_whitelist(&self, actor: &Actor, student_id: &str) -> CoreResult<()> {
        self.require_admin(actor)?;
        if !self.whitelist.reset(student_id).await? {
            return Err(CoreError::NotFound(format!(
                "whitelist entry for {}",
                student_id
            )));
        }
        Ok(())
    }

    // ----- applications ---------------------------------------------------

    /// Creates a draft application. The university is never caller-supplied;
    /// it is resolved from the student's whitelist entry.
    pub async fn create_application(
        &self,
        actor: &Actor,
        new: NewApplication,
    ) -> CoreResult<Application> {
        if actor.role != Role::Student {
            return Err(CoreError::Authorization(
                "only students create applications".to_string(),
            ));
        }
        validate_dates(new.start_date, new.end_date)?;
        if new.company_code.trim().is_empty() || new.position.trim().is_empty() {
            return Err(CoreError::Validation(
                "company code and position are required".to_string(),
            ));
        }

        let entry = self
            .whitelist
            .get(&new.student_id)
            .await?
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "student {} is not whitelisted by any university",
                    new.student_id
                ))
            })?;

        let app_no = codes::new_application_no();
        let app = self
            .applications
            .insert(&new, &app_no, &entry.university_code)
            .await?;
        println!(
            "> WorkflowService: application {} created for student {} ({} / {})",
            app.app_no, app.student_id, app.company_code, app.university_code
        );
        Ok(app)
    }

    /// Fetches an application, visible to its owner, members of the named
    /// company or university, and admins.
    pub async fn get_application(&self, actor: &Actor, id: i64) -> CoreResult<Application> {
        let app = self.load(id).await?;
        let visible = match actor.role {
            Role::Student => app.student_user_id == actor.user_id,
            Role::Company => actor.is_member_of(&app.company_code),
            Role::University => actor.is_member_of(&app.university_code),
            Role::Admin => true,
        };
        if !visible {
            return Err(CoreError::Authorization(
                "not a party to this application".to_string(),
            ));
        }
        Ok(app)
    }

    pub async fn list_my_applications(&self, actor: &Actor) -> CoreResult<Vec<Application>> {
        Ok(self.applications.list_for_student(actor.user_id).await?)
    }

    /// Edits a draft. Only the owning student, only in DRAFT.
    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: i64,
        update: DraftUpdate,
    ) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_owner(actor, &app)?;
        if app.status != ApplicationStatus::Draft {
            return Err(CoreError::Conflict(format!(
                "application {} is {}, only drafts are editable",
                app.app_no,
                app.status.as_str()
            )));
        }
        if update.is_empty() {
            return Ok(app);
        }
        let start = update.start_date.unwrap_or(app.start_date);
        let end = update.end_date.unwrap_or(app.end_date);
        validate_dates(start, end)?;
        self.applications.update_draft(id, &update).await?;
        self.load(id).await
    }

    /// DRAFT -> SUBMITTED, by the owner.
    pub async fn submit(&self, actor: &Actor, id: i64) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_owner(actor, &app)?;
        self.transition(id, &[ApplicationStatus::Draft], ApplicationStatus::Submitted)
            .await?;
        println!("> WorkflowService: application {} submitted", app.app_no);
        self.load(id).await
    }

    /// Student-initiated withdrawal, only before the company has signed.
    pub async fn withdraw(&self, actor: &Actor, id: i64) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_owner(actor, &app)?;
        self.transition(
            id,
            &[
                ApplicationStatus::Submitted,
                ApplicationStatus::CompanyReviewing,
            ],
            ApplicationStatus::Withdrawn,
        )
        .await?;
        println!("> WorkflowService: application {} withdrawn", app.app_no);
        self.load(id).await
    }

    // ----- company review ---------------------------------------------------

    /// SUBMITTED -> COMPANY_REVIEWING, claimed by a member of the named
    /// company.
    pub async fn start_company_review(&self, actor: &Actor, id: i64) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_company(actor, &app)?;
        self.transition(
            id,
            &[ApplicationStatus::Submitted],
            ApplicationStatus::CompanyReviewing,
        )
        .await?;
        self.load(id).await
    }

    /// Company approval with a mandatory score. Submitting directly from
    /// SUBMITTED is allowed; the review stage is entered implicitly.
    pub async fn company_approve(
        &self,
        actor: &Actor,
        id: i64,
        score: i32,
        evaluation: Option<String>,
    ) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_company(actor, &app)?;
        if !(1..=100).contains(&score) {
            return Err(CoreError::Validation(format!(
                "score {} out of range, expected 1..=100",
                score
            )));
        }

        if app.status == ApplicationStatus::Submitted {
            self.transition(
                id,
                &[ApplicationStatus::Submitted],
                ApplicationStatus::CompanyReviewing,
            )
            .await?;
        }

        let reviewed_at = Utc::now();
        let reviewer = format!("user:{}", actor.user_id);
        let signature =
            company_signature_digest(score, evaluation.as_deref(), &reviewer, reviewed_at);
        let review = CompanyReview {
            score,
            evaluation,
            signature,
            reviewer,
            reviewed_at,
        };
        let moved = self
            .applications
            .record_company_review(
                id,
                &review,
                &[ApplicationStatus::CompanyReviewing],
                ApplicationStatus::CompanyApproved,
            )
            .await?;
        if !moved {
            return Err(CoreError::Conflict(format!(
                "application {} changed status during company review",
                app.app_no
            )));
        }
        println!(
            "> WorkflowService: application {} approved by company {} (score {})",
            app.app_no, app.company_code, score
        );
        self.notify(
            app.student_user_id,
            "Company review complete",
            &format!("Application {} was approved by the company.", app.app_no),
        )
        .await;
        self.load(id).await
    }

    /// Company rejection with a mandatory reason. Reachable from SUBMITTED
    /// (implicit review start), COMPANY_REVIEWING and COMPANY_APPROVED.
    pub async fn company_reject(
        &self,
        actor: &Actor,
        id: i64,
        reason: &str,
    ) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_company(actor, &app)?;
        require_reason(reason)?;

        if app.status == ApplicationStatus::Submitted {
            self.transition(
                id,
                &[ApplicationStatus::Submitted],
                ApplicationStatus::CompanyReviewing,
            )
            .await?;
        }

        let moved = self
            .applications
            .record_rejection(
                id,
                RejectionStage::Company,
                reason,
                &[
                    ApplicationStatus::CompanyReviewing,
                    ApplicationStatus::CompanyApproved,
                ],
            )
            .await?;
        if !moved {
            return Err(CoreError::Conflict(format!(
                "application {} cannot be rejected from its current status",
                app.app_no
            )));
        }
        println!(
            "> WorkflowService: application {} rejected by company {}",
            app.app_no, app.company_code
        );
        self.notify(
            app.student_user_id,
            "Application rejected",
            &format!("Application {} was rejected by the company: {}", app.app_no, reason),
        )
        .await;
        self.load(id).await
    }

    // ----- university review ------------------------------------------------

    /// COMPANY_APPROVED -> UNIVERSITY_REVIEWING, claimed by a member of the
    /// named university.
    pub async fn start_university_review(&self, actor: &Actor, id: i64) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_university(actor, &app)?;
        self.transition(
            id,
            &[ApplicationStatus::CompanyApproved],
            ApplicationStatus::UniversityReviewing,
        )
        .await?;
        self.load(id).await
    }

    /// Final approval: moves the application to APPROVED and materializes the
    /// certificate (PENDING, no hash yet). Approving directly from
    /// COMPANY_APPROVED enters the review stage implicitly.
    pub async fn university_approve(
        &self,
        actor: &Actor,
        id: i64,
        note: Option<String>,
    ) -> CoreResult<(Application, Certificate)> {
        let app = self.load(id).await?;
        self.require_university(actor, &app)?;
        if app.certificate_id.is_some() {
            return Err(CoreError::Conflict(format!(
                "application {} already has a certificate",
                app.app_no
            )));
        }

        if app.status == ApplicationStatus::CompanyApproved {
            self.transition(
                id,
                &[ApplicationStatus::CompanyApproved],
                ApplicationStatus::UniversityReviewing,
            )
            .await?;
        }

        let verify_code = codes::new_verification_code();
        let verify_url = codes::verify_url(&self.verify_base_url, &verify_code);
        let new_cert = NewCertificate {
            cert_no: codes::new_certificate_no(),
            application_id: app.id,
            student_id: app.student_id.clone(),
            student_user_id: app.student_user_id,
            student_wallet: app.student_wallet.clone(),
            university_code: app.university_code.clone(),
            company_code: app.company_code.clone(),
            position: app.position.clone(),
            start_date: app.start_date,
            end_date: app.end_date,
            description: app.description.clone(),
            evaluation: app.company_evaluation.clone(),
            verify_code,
            qr_payload: verify_url.clone(),
            verify_url,
        };
        let cert = self.certificates.insert(&new_cert).await?;

        if !self.applications.link_certificate(id, cert.id).await? {
            // A concurrent approval won the link. Discard the losing row so
            // it can never be verified or anchored.
            self.discard_certificate(&cert).await;
            return Err(CoreError::Conflict(format!(
                "application {} already has a certificate",
                app.app_no
            )));
        }

        let review = UniversityReview {
            note,
            approver: format!("user:{}", actor.user_id),
            reviewed_at: Utc::now(),
        };
        let moved = self
            .applications
            .record_university_review(
                id,
                &review,
                &[ApplicationStatus::UniversityReviewing],
                ApplicationStatus::Approved,
            )
            .await?;
        if !moved {
            // A concurrent rejection or withdrawal reached a terminal status
            // first. Terminal statuses issue nothing, so the certificate must
            // not survive: unlink it and discard the row.
            match self.applications.unlink_certificate(id, cert.id).await {
                Ok(true) => {}
                Ok(false) => eprintln!(
                    "> WorkflowService: WARNING: certificate {} was no longer linked to application {} while rolling back",
                    cert.cert_no, app.app_no
                ),
                Err(e) => eprintln!(
                    "> WorkflowService: WARNING: failed to unlink certificate {} from application {}: {}",
                    cert.cert_no, app.app_no, e
                ),
            }
            self.discard_certificate(&cert).await;
            return Err(CoreError::Conflict(format!(
                "application {} changed status during university review",
                app.app_no
            )));
        }
        println!(
            "> WorkflowService: application {} approved, certificate {} issued (PENDING)",
            app.app_no, cert.cert_no
        );
        self.notify(
            app.student_user_id,
            "Certificate issued",
            &format!(
                "Certificate {} was issued for application {}.",
                cert.cert_no, app.app_no
            ),
        )
        .await;

        if self.anchor_immediately {
            if let Err(e) = self.anchors.enqueue(cert.id).await {
                eprintln!(
                    "> WorkflowService: failed to enqueue certificate {} for anchoring: {}",
                    cert.cert_no, e
                );
            }
        }

        let app = self.load(id).await?;
        let cert = self
            .certificates
            .get(cert.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("certificate {}", cert.id)))?;
        Ok((app, cert))
    }

    /// University rejection with a mandatory reason. Reachable from
    /// COMPANY_APPROVED (implicit review start) and UNIVERSITY_REVIEWING.
    pub async fn university_reject(
        &self,
        actor: &Actor,
        id: i64,
        reason: &str,
    ) -> CoreResult<Application> {
        let app = self.load(id).await?;
        self.require_university(actor, &app)?;
        require_reason(reason)?;

        let moved = self
            .applications
            .record_rejection(
                id,
                RejectionStage::University,
                reason,
                &[
                    ApplicationStatus::CompanyApproved,
                    ApplicationStatus::UniversityReviewing,
                ],
            )
            .await?;
        if !moved {
            return Err(CoreError::Conflict(format!(
                "application {} cannot be rejected from its current status",
                app.app_no
            )));
        }
        println!(
            "> WorkflowService: application {} rejected by university {}",
            app.app_no, app.university_code
        );
        self.notify(
            app.student_user_id,
            "Application rejected",
            &format!(
                "Application {} was rejected by the university: {}",
                app.app_no, reason
            ),
        )
        .await;
        self.load(id).await
    }

    // ----- organizations ------------------------------------------------

    /// Admin approval of an organizational account. Upserts the organization
    /// by its unique code and binds the user to it.
    pub async fn approve_org_account(
        &self,
        actor: &Actor,
        user_id: i64,
        code: &str,
        name: &str,
        kind: OrgKind,
    ) -> CoreResult<Organization> {
        self.require_admin(actor)?;
        if code.trim().is_empty() {
            return Err(CoreError::Validation(
                "organization code is required".to_string(),
            ));
        }
        let org = self.organizations.upsert(code, name, kind).await?;
        self.organizations.bind_member(code, user_id).await?;
        println!(
            "> WorkflowService: user {} approved as member of {} {}",
            user_id,
            kind.as_str(),
            org.code
        );
        self.notify(
            user_id,
            "Account approved",
            &format!("Your account was approved for organization {}.", org.code),
        )
        .await;
        Ok(org)
    }

    // ----- helpers --------------------------------------------------------

    /// Removes a freshly inserted certificate whose approval lost its race.
    /// The row is still PENDING with no hash, so nothing references it yet.
    /// Failure leaves an orphan that verifies valid, hence the loud log.
    async fn discard_certificate(&self, cert: &Certificate) {
        match self.certificates.delete(cert.id).await {
            Ok(true) => println!(
                "> WorkflowService: discarded certificate {} from a lost approval race",
                cert.cert_no
            ),
            Ok(false) => eprintln!(
                "> WorkflowService: WARNING: certificate {} already gone while discarding",
                cert.cert_no
            ),
            Err(e) => eprintln!(
                "> WorkflowService: WARNING: failed to discard certificate {}; orphaned PENDING row needs cleanup: {}",
                cert.cert_no, e
            ),
        }
    }

    async fn load(&self, id: i64) -> CoreResult<Application> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("application {}", id)))
    }

    async fn transition(
        &self,
        id: i64,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> CoreResult<()> {
        debug_assert!(from.iter().all(|f| f.can_transition(to)));
        if self.applications.set_status(id, from, to).await? {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "application {} is not in a status that allows {}",
                id,
                to.as_str()
            )))
        }
    }

    fn require_owner(&self, actor: &Actor, app: &Application) -> CoreResult<()> {
        if actor.role == Role::Student && app.student_user_id == actor.user_id {
            Ok(())
        } else {
            Err(CoreError::Authorization(
                "only the owning student may do this".to_string(),
            ))
        }
    }

    fn require_company(&self, actor: &Actor, app: &Application) -> CoreResult<()> {
        if actor.role == Role::Company && actor.is_member_of(&app.company_code) {
            Ok(())
        } else {
            Err(CoreError::Authorization(format!(
                "only members of company {} may review this application",
                app.company_code
            )))
        }
    }

    fn require_university(&self, actor: &Actor, app: &Application) -> CoreResult<()> {
        if actor.role == Role::University && actor.is_member_of(&app.university_code) {
            Ok(())
        } else {
            Err(CoreError::Authorization(format!(
                "only members of university {} may review this application",
                app.university_code
            )))
        }
    }

    fn require_admin(&self, actor: &Actor) -> CoreResult<()> {
        if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(CoreError::Authorization("admin only".to_string()))
        }
    }

    async fn notify(&self, user_id: i64, title: &str, body: &str) {
        if let Err(e) = self.notifications.push(user_id, title, body).await {
            eprintln!(
                "> WorkflowService: failed to notify user {}: {}",
                user_id, e
            );
        }
    }
}

fn validate_dates(
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> CoreResult<()> {
    if start >= end {
        return Err(CoreError::Validation(
            "internship start date must be before the end date".to_string(),
        ));
    }
    Ok(())
}

fn require_reason(reason: &str) -> CoreResult<()> {
    if reason.trim().is_empty() {
        return Err(CoreError::Validation(
            "a rejection reason is required".to_string(),
        ));
    }
    Ok(())
}
