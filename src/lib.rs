pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::anchor::AnchorService;
pub use app::workflow::WorkflowService;
pub use crypto::hashing::{company_signature_digest, compute_certificate_hash};
pub use domain::ledger::LedgerGateway;
pub use domain::verify::VerificationService;
pub use infra::solana;
