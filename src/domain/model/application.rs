//! Application entity and its approval state machine.

use chrono::{DateTime, Utc};

/// Lifecycle status of an [`Application`].
///
/// The set of legal transitions forms a DAG (see [`ApplicationStatus::can_transition`]);
/// a status sequence observed on any application is always a path through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    CompanyReviewing,
    CompanyApproved,
    UniversityReviewing,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::CompanyReviewing => "COMPANY_REVIEWING",
            ApplicationStatus::CompanyApproved => "COMPANY_APPROVED",
            ApplicationStatus::UniversityReviewing => "UNIVERSITY_REVIEWING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "DRAFT" => ApplicationStatus::Draft,
            "SUBMITTED" => ApplicationStatus::Submitted,
            "COMPANY_REVIEWING" => ApplicationStatus::CompanyReviewing,
            "COMPANY_APPROVED" => ApplicationStatus::CompanyApproved,
            "UNIVERSITY_REVIEWING" => ApplicationStatus::UniversityReviewing,
            "APPROVED" => ApplicationStatus::Approved,
            "REJECTED" => ApplicationStatus::Rejected,
            "WITHDRAWN" => ApplicationStatus::Withdrawn,
            _ => return None,
        })
    }

    /// Terminal statuses are immutable: no transition ever leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
        )
    }

    /// The full transition table of the approval state machine.
    ///
    /// Withdrawal is student-initiated and only possible before the company
    /// has signed; rejection is reachable from both review stages.
    pub fn can_transition(self, to: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, to),
            (Draft, Submitted)
                | (Submitted, CompanyReviewing)
                | (CompanyReviewing, CompanyApproved)
                | (CompanyApproved, UniversityReviewing)
                | (UniversityReviewing, Approved)
                | (CompanyReviewing, Rejected)
                | (CompanyApproved, Rejected)
                | (UniversityReviewing, Rejected)
                | (Submitted, Withdrawn)
                | (CompanyReviewing, Withdrawn)
        )
    }
}

/// Which review stage produced a rejection. The two are mutually exclusive:
/// an application is rejected by exactly one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionStage {
    Company,
    University,
}

impl RejectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionStage::Company => "COMPANY",
            RejectionStage::University => "UNIVERSITY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPANY" => Some(RejectionStage::Company),
            "UNIVERSITY" => Some(RejectionStage::University),
            _ => None,
        }
    }
}

/// A request for certification, owned by exactly one student.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: i64,
    /// Human-readable application number, e.g. `APP20240601ABCD`.
    pub app_no: String,
    /// Student identifier as registered on the whitelist (hashed into the
    /// certificate hash later, so it must be stable).
    pub student_id: String,
    /// Account id of the owning student.
    pub student_user_id: i64,
    /// Optional on-chain address of the student, captured at creation.
    pub student_wallet: Option<String>,
    /// Resolved from the whitelist at creation time.
    pub university_code: String,
    pub company_code: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub status: ApplicationStatus,

    // Company review fields.
    pub company_score: Option<i32>,
    pub company_evaluation: Option<String>,
    pub company_signature: Option<String>,
    pub company_reviewer: Option<String>,
    pub company_reviewed_at: Option<DateTime<Utc>>,

    // University review fields.
    pub university_note: Option<String>,
    pub university_approver: Option<String>,
    pub university_reviewed_at: Option<DateTime<Utc>>,

    /// Immutable once set: at most one certificate is ever linked.
    pub certificate_id: Option<i64>,
    pub rejection_stage: Option<RejectionStage>,
    pub rejection_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a draft application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub student_id: String,
    pub student_user_id: i64,
    pub student_wallet: Option<String>,
    pub company_code: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
}

/// Partial update of a draft. Only fields explicitly present are applied.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub company_code: Option<String>,
    pub position: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl DraftUpdate {
    pub fn is_empty(&self) -> bool {
        self.company_code.is_none()
            && self.position.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.description.is_none()
    }
}

/// Accepted company review, persisted together with the status transition.
#[derive(Debug, Clone)]
pub struct CompanyReview {
    pub score: i32,
    pub evaluation: Option<String>,
    pub signature: String,
    pub reviewer: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Accepted university review.
#[derive(Debug, Clone)]
pub struct UniversityReview {
    pub note: Option<String>,
    pub approver: String,
    pub reviewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::ApplicationStatus::*;
    use super::*;

    #[test]
    fn happy_path_is_a_legal_sequence() {
        let path = [
            Draft,
            Submitted,
            CompanyReviewing,
            CompanyApproved,
            UniversityReviewing,
            Approved,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_shortcuts_and_no_resurrection() {
        assert!(!Draft.can_transition(Approved));
        assert!(!Draft.can_transition(CompanyApproved));
        assert!(!Submitted.can_transition(Approved));
        for terminal in [Approved, Rejected, Withdrawn] {
            assert!(terminal.is_terminal());
            for to in [
                Draft,
                Submitted,
                CompanyReviewing,
                CompanyApproved,
                UniversityReviewing,
                Approved,
                Rejected,
                Withdrawn,
            ] {
                assert!(!terminal.can_transition(to));
            }
        }
    }

    #[test]
    fn withdrawal_only_before_company_signs() {
        assert!(Submitted.can_transition(Withdrawn));
        assert!(CompanyReviewing.can_transition(Withdrawn));
        assert!(!CompanyApproved.can_transition(Withdrawn));
        assert!(!UniversityReviewing.can_transition(Withdrawn));
        assert!(!Draft.can_transition(Withdrawn));
    }

    #[test]
    fn status_codes_round_trip() {
        for s in [
            Draft,
            Submitted,
            CompanyReviewing,
            CompanyApproved,
            UniversityReviewing,
            Approved,
            Rejected,
            Withdrawn,
        ] {
            assert_eq!(ApplicationStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ApplicationStatus::parse("NOPE"), None);
    }
}
