//! Public verification of issued certificates.
//!
//! Verification never mutates certificate state and works with no
//! authentication. The verdict reconciles the local record with the ledger;
//! the one absolute rule is that a locally REVOKED certificate is invalid no
//! matter what the ledger says.

mod verifier;

pub use verifier::{LedgerVerdict, VerificationService, VerificationVerdict};

use primitive_types::H256;

/// A verification lookup key, classified from the raw path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyKey {
    /// Random public verification code.
    Code(String),
    /// Human-facing certificate number (`CERT...`).
    Number(String),
    /// Raw certificate hash, hex-encoded with or without a `0x` prefix.
    Hash(H256),
}

impl VerifyKey {
    /// Classifies a raw key. 64 hex characters (optionally `0x`-prefixed)
    /// parse as a hash, a `CERT` prefix as a certificate number, anything
    /// else as a verification code.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Ok(bytes) = hex::decode(hex_part) {
                return VerifyKey::Hash(H256::from_slice(&bytes));
            }
        }
        if trimmed.starts_with("CERT") {
            return VerifyKey::Number(trimmed.to_string());
        }
        VerifyKey::Code(trimmed.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VerifyKey::Code(_) => "code",
            VerifyKey::Number(_) => "number",
            VerifyKey::Hash(_) => "hash",
        }
    }

    pub fn display(&self) -> String {
        match self {
            VerifyKey::Code(c) => c.clone(),
            VerifyKey::Number(n) => n.clone(),
            VerifyKey::Hash(h) => format!("0x{}", hex::encode(h.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_keys() {
        let hex64 = "ab".repeat(32);
        assert!(matches!(VerifyKey::parse(&hex64), VerifyKey::Hash(_)));
        assert!(matches!(
            VerifyKey::parse(&format!("0x{}", hex64)),
            VerifyKey::Hash(_)
        ));
        assert!(matches!(
            VerifyKey::parse("CERT202406XK7Q2M"),
            VerifyKey::Number(_)
        ));
        assert!(matches!(
            VerifyKey::parse("QZ7PM2WXK3V8RTN4HGFD"),
            VerifyKey::Code(_)
        ));
    }

    #[test]
    fn near_hex_strings_fall_back_to_codes() {
        // 63 hex chars is not a hash.
        let short = "a".repeat(63);
        assert!(matches!(VerifyKey::parse(&short), VerifyKey::Code(_)));
        // 64 chars with a non-hex digit is not a hash either.
        let tainted = format!("{}g", "a".repeat(63));
        assert!(matches!(VerifyKey::parse(&tainted), VerifyKey::Code(_)));
    }
}
