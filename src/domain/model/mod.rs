//! Domain model: applications, certificates, whitelist and organizations.

pub mod application;
pub mod certificate;
pub mod codes;
pub mod party;

pub use application::{
    Application, ApplicationStatus, CompanyReview, DraftUpdate, NewApplication, RejectionStage,
    UniversityReview,
};
pub use certificate::{Certificate, CertificateStatus, NewCertificate};
pub use party::{Actor, OrgKind, Organization, Role, WhitelistEntry};
