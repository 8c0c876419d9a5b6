//! Actors, organizations and the registration whitelist.

use chrono::{DateTime, Utc};

/// Role of the authenticated caller. Authentication itself happens outside
/// the core; handlers receive a pre-authenticated [`Actor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Company,
    University,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Company => "company",
            Role::University => "university",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "company" => Some(Role::Company),
            "university" => Some(Role::University),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Pre-authenticated caller identity, handed in at the transport boundary.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    /// Organization membership for company/university users.
    pub org_code: Option<String>,
}

impl Actor {
    pub fn is_member_of(&self, org_code: &str) -> bool {
        self.org_code.as_deref() == Some(org_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgKind {
    Company,
    University,
}

impl OrgKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgKind::Company => "COMPANY",
            OrgKind::University => "UNIVERSITY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "COMPANY" => Some(OrgKind::Company),
            "UNIVERSITY" => Some(OrgKind::University),
            _ => None,
        }
    }
}

/// Organization record, addressed by its unique code. Approving an
/// organizational account upserts by code: reuse if a matching code exists,
/// else create.
#[derive(Debug, Clone)]
pub struct Organization {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub kind: OrgKind,
    pub created_at: DateTime<Utc>,
}

/// Pre-authorization record binding a student identifier to a university.
/// Consumed (flagged used) exactly once, at registration time.
#[derive(Debug, Clone)]
pub struct WhitelistEntry {
    pub id: i64,
    pub student_id: String,
    pub university_code: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
