//! PostgreSQL store implementation using sqlx.
//!
//! The anchoring gate is a single conditional UPDATE (`WHERE status =
//! ANY(...)`), so concurrent anchoring triggers contend inside the database
//! rather than in application code.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::H256;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::domain::model::{
    Application, ApplicationStatus, Certificate, CertificateStatus, CompanyReview, DraftUpdate,
    NewApplication, NewCertificate, OrgKind, Organization, RejectionStage, UniversityReview,
    WhitelistEntry,
};
use crate::storage::{
    ApplicationStore, AuditStore, CertificateStore, NotificationStore, OrganizationStore,
    VerificationAudit, WhitelistStore,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects to the database and creates the engine's tables if needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS applications (
                id BIGSERIAL PRIMARY KEY,
                app_no TEXT NOT NULL UNIQUE,
                student_id TEXT NOT NULL,
                student_user_id BIGINT NOT NULL,
                student_wallet TEXT,
                university_code TEXT NOT NULL,
                company_code TEXT NOT NULL,
                position TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                company_score INT,
                company_evaluation TEXT,
                company_signature TEXT,
                company_reviewer TEXT,
                company_reviewed_at TIMESTAMPTZ,
                university_note TEXT,
                university_approver TEXT,
                university_reviewed_at TIMESTAMPTZ,
                certificate_id BIGINT,
                rejection_stage TEXT,
                rejection_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS certificates (
                id BIGSERIAL PRIMARY KEY,
                cert_no TEXT NOT NULL UNIQUE,
                application_id BIGINT NOT NULL,
                student_id TEXT NOT NULL,
                student_user_id BIGINT NOT NULL,
                student_wallet TEXT,
                university_code TEXT NOT NULL,
                company_code TEXT NOT NULL,
                position TEXT NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                description TEXT NOT NULL,
                evaluation TEXT,
                status TEXT NOT NULL,
                verify_code TEXT NOT NULL UNIQUE,
                verify_url TEXT NOT NULL,
                qr_payload TEXT NOT NULL,
                cert_hash BYTEA UNIQUE,
                tx_hash TEXT,
                block_number BIGINT,
                chain_id TEXT,
                issued_at TIMESTAMPTZ,
                revoked_at TIMESTAMPTZ,
                revoke_reason TEXT,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                status_changed_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS whitelist_entries (
                id BIGSERIAL PRIMARY KEY,
                student_id TEXT NOT NULL UNIQUE,
                university_code TEXT NOT NULL,
                used BOOLEAN NOT NULL DEFAULT false,
                used_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS organizations (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS organization_members (
                org_code TEXT NOT NULL,
                user_id BIGINT NOT NULL,
                PRIMARY KEY (org_code, user_id)
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS verification_audits (
                id BIGSERIAL PRIMARY KEY,
                key_kind TEXT NOT NULL,
                lookup_key TEXT NOT NULL,
                origin TEXT NOT NULL,
                found BOOLEAN NOT NULL,
                valid BOOLEAN NOT NULL,
                at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notifications (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn parse_application_status(s: &str) -> Result<ApplicationStatus> {
    ApplicationStatus::parse(s)
        .ok_or_else(|| anyhow::anyhow!("unknown application status in database: {}", s))
}

fn parse_certificate_status(s: &str) -> Result<CertificateStatus> {
    CertificateStatus::parse(s)
        .ok_or_else(|| anyhow::anyhow!("unknown certificate status in database: {}", s))
}

fn status_codes(from: &[ApplicationStatus]) -> Vec<String> {
    from.iter().map(|s| s.as_str().to_string()).collect()
}

fn row_to_application(row: &PgRow) -> Result<Application> {
    let status: String = row.try_get("status")?;
    let rejection_stage: Option<String> = row.try_get("rejection_stage")?;
    Ok(Application {
        id: row.try_get("id")?,
        app_no: row.try_get("app_no")?,
        student_id: row.try_get("student_id")?,
        student_user_id: row.try_get("student_user_id")?,
        student_wallet: row.try_get("student_wallet")?,
        university_code: row.try_get("university_code")?,
        company_code: row.try_get("company_code")?,
        position: row.try_get("position")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        description: row.try_get("description")?,
        status: parse_application_status(&status)?,
        company_score: row.try_get("company_score")?,
        company_evaluation: row.try_get("company_evaluation")?,
        company_signature: row.try_get("company_signature")?,
        company_reviewer: row.try_get("company_reviewer")?,
        company_reviewed_at: row.try_get("company_reviewed_at")?,
        university_note: row.try_get("university_note")?,
        university_approver: row.try_get("university_approver")?,
        university_reviewed_at: row.try_get("university_reviewed_at")?,
        certificate_id: row.try_get("certificate_id")?,
        rejection_stage: rejection_stage.as_deref().and_then(RejectionStage::parse),
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_certificate(row: &PgRow) -> Result<Certificate> {
    let status: String = row.try_get("status")?;
    let cert_hash: Option<Vec<u8>> = row.try_get("cert_hash")?;
    let cert_hash = match cert_hash {
        Some(bytes) if bytes.len() == 32 => Some(H256::from_slice(&bytes)),
        Some(_) => return Err(anyhow::anyhow!("cert_hash column is not 32 bytes")),
        None => None,
    };
    let block_number: Option<i64> = row.try_get("block_number")?;
    Ok(Certificate {
        id: row.try_get("id")?,
        cert_no: row.try_get("cert_no")?,
        application_id: row.try_get("application_id")?,
        student_id: row.try_get("student_id")?,
        student_user_id: row.try_get("student_user_id")?,
        student_wallet: row.try_get("student_wallet")?,
        university_code: row.try_get("university_code")?,
        company_code: row.try_get("company_code")?,
        position: row.try_get("position")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        description: row.try_get("description")?,
        evaluation: row.try_get("evaluation")?,
        status: parse_certificate_status(&status)?,
        verify_code: row.try_get("verify_code")?,
        verify_url: row.try_get("verify_url")?,
        qr_payload: row.try_get("qr_payload")?,
        cert_hash,
        tx_hash: row.try_get("tx_hash")?,
        block_number: block_number.map(|n| n as u64),
        chain_id: row.try_get("chain_id")?,
        issued_at: row.try_get("issued_at")?,
        revoked_at: row.try_get("revoked_at")?,
        revoke_reason: row.try_get("revoke_reason")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        status_changed_at: row.try_get("status_changed_at")?,
    })
}

fn row_to_whitelist(row: &PgRow) -> Result<WhitelistEntry> {
    Ok(WhitelistEntry {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        university_code: row.try_get("university_code")?,
        used: row.try_get("used")?,
        used_at: row.try_get("used_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_organization(row: &PgRow) -> Result<Organization> {
    let kind: String = row.try_get("kind")?;
    Ok(Organization {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        kind: OrgKind::parse(&kind)
            .ok_or_else(|| anyhow::anyhow!("unknown organization kind in database: {}", kind))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ApplicationStore for PostgresStore {
    async fn insert(
        &self,
        new: &NewApplication,
        app_no: &str,
        university_code: &str,
    ) -> Result<Application> {
        let row = sqlx::query(
            "INSERT INTO applications (
                app_no, student_id, student_user_id, student_wallet,
                university_code, company_code, position, start_date, end_date,
                description, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *",
        )
        .bind(app_no)
        .bind(&new.student_id)
        .bind(new.student_user_id)
        .bind(&new.student_wallet)
        .bind(university_code)
        .bind(&new.company_code)
        .bind(&new.position)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(&new.description)
        .bind(ApplicationStatus::Draft.as_str())
        .fetch_one(&self.pool)
        .await?;
        row_to_application(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Application>> {
        let row = sqlx::query("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_application).transpose()
    }

    async fn list_for_student(&self, student_user_id: i64) -> Result<Vec<Application>> {
        let rows =
            sqlx::query("SELECT * FROM applications WHERE student_user_id = $1 ORDER BY id")
                .bind(student_user_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_application).collect()
    }

    async fn update_draft(&self, id: i64, update: &DraftUpdate) -> Result<()> {
        sqlx::query(
            "UPDATE applications SET
                company_code = COALESCE($2, company_code),
                position = COALESCE($3, position),
                start_date = COALESCE($4, start_date),
                end_date = COALESCE($5, end_date),
                description = COALESCE($6, description),
                updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.company_code)
        .bind(&update.position)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(&update.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: i64,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET status = $2, updated_at = now()
             WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(status_codes(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_company_review(
        &self,
        id: i64,
        review: &CompanyReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET
                company_score = $2,
                company_evaluation = $3,
                company_signature = $4,
                company_reviewer = $5,
                company_reviewed_at = $6,
                status = $7,
                updated_at = now()
             WHERE id = $1 AND status = ANY($8)",
        )
        .bind(id)
        .bind(review.score)
        .bind(&review.evaluation)
        .bind(&review.signature)
        .bind(&review.reviewer)
        .bind(review.reviewed_at)
        .bind(to.as_str())
        .bind(status_codes(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_university_review(
        &self,
        id: i64,
        review: &UniversityReview,
        from: &[ApplicationStatus],
        to: ApplicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET
                university_note = $2,
                university_approver = $3,
                university_reviewed_at = $4,
                status = $5,
                updated_at = now()
             WHERE id = $1 AND status = ANY($6)",
        )
        .bind(id)
        .bind(&review.note)
        .bind(&review.approver)
        .bind(review.reviewed_at)
        .bind(to.as_str())
        .bind(status_codes(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_rejection(
        &self,
        id: i64,
        stage: RejectionStage,
        reason: &str,
        from: &[ApplicationStatus],
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET
                rejection_stage = $2,
                rejection_reason = $3,
                status = $4,
                updated_at = now()
             WHERE id = $1 AND status = ANY($5)",
        )
        .bind(id)
        .bind(stage.as_str())
        .bind(reason)
        .bind(ApplicationStatus::Rejected.as_str())
        .bind(status_codes(from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET certificate_id = $2, updated_at = now()
             WHERE id = $1 AND certificate_id IS NULL",
        )
        .bind(id)
        .bind(certificate_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unlink_certificate(&self, id: i64, certificate_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET certificate_id = NULL, updated_at = now()
             WHERE id = $1 AND certificate_id = $2",
        )
        .bind(id)
        .bind(certificate_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CertificateStore for PostgresStore {
    async fn insert(&self, new: &NewCertificate) -> Result<Certificate> {
        let row = sqlx::query(
            "INSERT INTO certificates (
                cert_no, application_id, student_id, student_user_id,
                student_wallet, university_code, company_code, position,
                start_date, end_date, description, evaluation, status,
                verify_code, verify_url, qr_payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *",
        )
        .bind(&new.cert_no)
        .bind(new.application_id)
        .bind(&new.student_id)
        .bind(new.student_user_id)
        .bind(&new.student_wallet)
        .bind(&new.university_code)
        .bind(&new.company_code)
        .bind(&new.position)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(&new.description)
        .bind(&new.evaluation)
        .bind(CertificateStatus::Pending.as_str())
        .bind(&new.verify_code)
        .bind(&new.verify_url)
        .bind(&new.qr_payload)
        .fetch_one(&self.pool)
        .await?;
        row_to_certificate(&row)
    }

    async fn get(&self, id: i64) -> Result<Option<Certificate>> {
        let row = sqlx::query("SELECT * FROM certificates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_certificate).transpose()
    }

    async fn get_by_verify_code(&self, verify_code: &str) -> Result<Option<Certificate>> {
        let row = sqlx::query("SELECT * FROM certificates WHERE verify_code = $1")
            .bind(verify_code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_certificate).transpose()
    }

    async fn get_by_cert_no(&self, cert_no: &str) -> Result<Option<Certificate>> {
        let row = sqlx::query("SELECT * FROM certificates WHERE cert_no = $1")
            .bind(cert_no)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_certificate).transpose()
    }

    async fn get_by_hash(&self, cert_hash: H256) -> Result<Option<Certificate>> {
        let row = sqlx::query("SELECT * FROM certificates WHERE cert_hash = $1")
            .bind(cert_hash.as_bytes())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_certificate).transpose()
    }

    async fn begin_processing(&self, id: i64, cert_hash: H256) -> Result<bool> {
        // The gate: compare-and-set on status, assigning the hash only once.
        let result = sqlx::query(
            "UPDATE certificates SET
                status = $2,
                cert_hash = COALESCE(cert_hash, $3),
                status_changed_at = now()
             WHERE id = $1 AND status = ANY($4)",
        )
        .bind(id)
        .bind(CertificateStatus::Processing.as_str())
        .bind(cert_hash.as_bytes())
        .bind(vec![
            CertificateStatus::Pending.as_str().to_string(),
            CertificateStatus::Failed.as_str().to_string(),
        ])
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_active(
        &self,
        id: i64,
        tx_hash: &str,
        block_number: u64,
        chain_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE certificates SET
                status = $2,
                tx_hash = $3,
                block_number = $4,
                chain_id = $5,
                issued_at = $6,
                last_error = NULL,
                status_changed_at = now()
             WHERE id = $1 AND status = $7",
        )
        .bind(id)
        .bind(CertificateStatus::Active.as_str())
        .bind(tx_hash)
        .bind(block_number as i64)
        .bind(chain_id)
        .bind(issued_at)
        .bind(CertificateStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE certificates SET
                status = $2,
                last_error = $3,
                status_changed_at = now()
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(CertificateStatus::Failed.as_str())
        .bind(error)
        .bind(CertificateStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_revoked(
        &self,
        id: i64,
        reason: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE certificates SET
                status = $2,
                revoke_reason = $3,
                revoked_at = $4,
                status_changed_at = now()
             WHERE id = $1 AND status = $5",
        )
        .bind(id)
        .bind(CertificateStatus::Revoked.as_str())
        .bind(reason)
        .bind(revoked_at)
        .bind(CertificateStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_stuck_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT id FROM certificates
             WHERE status = $1 AND status_changed_at < $2
             ORDER BY id",
        )
        .bind(CertificateStatus::Processing.as_str())
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(Into::into))
            .collect()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WhitelistStore for PostgresStore {
    async fn get(&self, student_id: &str) -> Result<Option<WhitelistEntry>> {
        let row = sqlx::query("SELECT * FROM whitelist_entries WHERE student_id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_whitelist).transpose()
    }

    async fn insert(&self, student_id: &str, university_code: &str) -> Result<WhitelistEntry> {
        let row = sqlx::query(
            "INSERT INTO whitelist_entries (student_id, university_code)
             VALUES ($1, $2) RETURNING *",
        )
        .bind(student_id)
        .bind(university_code)
        .fetch_one(&self.pool)
        .await?;
        row_to_whitelist(&row)
    }

    async fn consume(&self, student_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE whitelist_entries SET used = true, used_at = now()
             WHERE student_id = $1 AND used = false",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset(&self, student_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE whitelist_entries SET used = false, used_at = NULL
             WHERE student_id = $1",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrganizationStore for PostgresStore {
    async fn upsert(&self, code: &str, name: &str, kind: OrgKind) -> Result<Organization> {
        // Reuse an existing organization with this code; only the name of a
        // newly created row comes from the request.
        let row = sqlx::query(
            "INSERT INTO organizations (code, name, kind) VALUES ($1, $2, $3)
             ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code
             RETURNING *",
        )
        .bind(code)
        .bind(name)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        row_to_organization(&row)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Organization>> {
        let row = sqlx::query("SELECT * FROM organizations WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_organization).transpose()
    }

    async fn bind_member(&self, code: &str, user_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO organization_members (org_code, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(code)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn record_verification(&self, audit: &VerificationAudit) -> Result<()> {
        sqlx::query(
            "INSERT INTO verification_audits (key_kind, lookup_key, origin, found, valid, at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&audit.key_kind)
        .bind(&audit.key)
        .bind(&audit.origin)
        .bind(audit.found)
        .bind(audit.valid)
        .bind(audit.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn push(&self, user_id: i64, title: &str, body: &str) -> Result<()> {
        sqlx::query("INSERT INTO notifications (user_id, title, body) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(title)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
