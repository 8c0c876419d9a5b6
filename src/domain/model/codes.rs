//! Generation of human-facing numbers and verification codes.

use chrono::Utc;
use rand::Rng;

const UPPER_ALNUM: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| UPPER_ALNUM[rng.gen_range(0..UPPER_ALNUM.len())] as char)
        .collect()
}

/// Application number, e.g. `APP20240601ABCD`.
pub fn new_application_no() -> String {
    format!("APP{}{}", Utc::now().format("%Y%m%d"), random_suffix(4))
}

/// Certificate number, e.g. `CERT202406XK7Q2M`.
pub fn new_certificate_no() -> String {
    format!("CERT{}{}", Utc::now().format("%Y%m"), random_suffix(6))
}

/// Public verification code. Long enough to be unguessable; the ambiguous
/// characters (0/O, 1/I) are excluded from the alphabet.
pub fn new_verification_code() -> String {
    random_suffix(20)
}

/// Public verification URL for a code.
pub fn verify_url(base_url: &str, verify_code: &str) -> String {
    format!("{}/verify/{}", base_url.trim_end_matches('/'), verify_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_have_expected_shape() {
        let app_no = new_application_no();
        assert!(app_no.starts_with("APP"));
        assert_eq!(app_no.len(), 3 + 8 + 4);

        let cert_no = new_certificate_no();
        assert!(cert_no.starts_with("CERT"));
        assert_eq!(cert_no.len(), 4 + 6 + 6);
    }

    #[test]
    fn verification_codes_are_long_and_distinct() {
        let a = new_verification_code();
        let b = new_verification_code();
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
    }

    #[test]
    fn verify_url_normalizes_trailing_slash() {
        assert_eq!(
            verify_url("https://certs.example/", "ABC"),
            "https://certs.example/verify/ABC"
        );
    }
}
