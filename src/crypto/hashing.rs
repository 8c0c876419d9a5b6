// This file hashes certificate facts into a 256-bit digest.

use base64::Engine;
use chrono::{DateTime, Utc};
use primitive_types::H256;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// Domain separation constants to prevent hash collisions between different types of data.
const CERT_DOMAIN: &[u8] = b"CERTFACTSV1";
const ARTIFACT_DOMAIN: &[u8] = b"CERTDOCV1";

// Type tags for the canonical tuple encoding. Each field is tagged and
// length-prefixed so that field boundaries can never be ambiguous
// ("ab","c" and "a","bc" must encode differently).
const TAG_STRING: u8 = 0x01;
const TAG_UINT64: u8 = 0x02;

fn write_string(hasher: &mut Sha256, s: &str) {
    hasher.update([TAG_STRING]);
    hasher.update((s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

fn write_uint64(hasher: &mut Sha256, v: u64) {
    hasher.update([TAG_UINT64]);
    hasher.update(v.to_be_bytes());
}

/// Computes the deterministic certificate hash over the substantive facts of
/// one certificate, encoded as the canonical tuple
/// `(string,string,string,string,uint64,uint64,string)`.
///
/// Pure function: identical inputs always yield an identical digest, and any
/// single-field change yields a different one. `start_unix` / `end_unix` are
/// whole seconds; callers truncate sub-second precision before calling
/// (see [`date_to_unix`]).
pub fn compute_certificate_hash(
    student_id: &str,
    university_code: &str,
    company_code: &str,
    position: &str,
    start_unix: i64,
    end_unix: i64,
    cert_no: &str,
) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(CERT_DOMAIN);
    write_string(&mut hasher, student_id);
    write_string(&mut hasher, university_code);
    write_string(&mut hasher, company_code);
    write_string(&mut hasher, position);
    write_uint64(&mut hasher, start_unix as u64);
    write_uint64(&mut hasher, end_unix as u64);
    write_string(&mut hasher, cert_no);
    H256::from_slice(&hasher.finalize())
}

/// Truncates a timestamp to whole seconds for hashing. Sub-second precision
/// must not affect the certificate hash.
pub fn date_to_unix(date: DateTime<Utc>) -> i64 {
    date.timestamp()
}

/// A helper function to sort a JSON object's keys recursively.
/// This is essential for canonical serialization.
fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted_map: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_value(v)))
                .collect();
            Value::Object(sorted_map.into_iter().collect())
        }
        Value::Array(arr) => {
            let sorted_arr = arr.iter().map(sort_json_value).collect();
            Value::Array(sorted_arr)
        }
        _ => value.clone(),
    }
}

/// Computes the company review signature: base64 of the canonical (key-sorted)
/// JSON of the decision payload.
///
/// This is an integrity seal over what the reviewer decided, not a
/// cryptographic identity signature. No private key is involved.
pub fn company_signature_digest(
    score: i32,
    evaluation: Option<&str>,
    reviewer: &str,
    reviewed_at: DateTime<Utc>,
) -> String {
    let payload = serde_json::json!({
        "score": score,
        "evaluation": evaluation,
        "reviewer": reviewer,
        "reviewed_at": reviewed_at.timestamp(),
    });
    let canonical = serde_json::to_string(&sort_json_value(&payload))
        .unwrap_or_default();
    base64::engine::general_purpose::STANDARD.encode(canonical.as_bytes())
}

/// Content hash for a rendered certificate document.
pub fn artifact_content_hash(bytes: &[u8]) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(ARTIFACT_DOMAIN);
    hasher.update(bytes);
    H256::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_hash(position: &str) -> H256 {
        compute_certificate_hash(
            "S2024001",
            "UNI-A",
            "ACME",
            position,
            1_717_200_000,
            1_722_470_400,
            "CERT202406XYZ",
        )
    }

    #[test]
    fn certificate_hash_is_deterministic() {
        assert_eq!(sample_hash("Intern"), sample_hash("Intern"));
    }

    #[test]
    fn certificate_hash_changes_with_any_field() {
        let base = sample_hash("Intern");
        assert_ne!(base, sample_hash("Engineer"));
        assert_ne!(
            base,
            compute_certificate_hash(
                "S2024002",
                "UNI-A",
                "ACME",
                "Intern",
                1_717_200_000,
                1_722_470_400,
                "CERT202406XYZ",
            )
        );
        assert_ne!(
            base,
            compute_certificate_hash(
                "S2024001",
                "UNI-A",
                "ACME",
                "Intern",
                1_717_200_001,
                1_722_470_400,
                "CERT202406XYZ",
            )
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = compute_certificate_hash("ab", "c", "X", "Y", 1, 2, "N");
        let b = compute_certificate_hash("a", "bc", "X", "Y", 1, 2, "N");
        assert_ne!(a, b);
    }

    #[test]
    fn sub_second_precision_is_truncated() {
        let coarse = Utc.timestamp_opt(1_717_200_000, 0).unwrap();
        let fine = Utc.timestamp_opt(1_717_200_000, 987_654_321).unwrap();
        assert_eq!(date_to_unix(coarse), date_to_unix(fine));
    }

    #[test]
    fn signature_digest_is_stable() {
        let at = Utc.timestamp_opt(1_717_200_000, 0).unwrap();
        let a = company_signature_digest(90, Some("excellent"), "reviewer@acme", at);
        let b = company_signature_digest(90, Some("excellent"), "reviewer@acme", at);
        assert_eq!(a, b);
        let c = company_signature_digest(91, Some("excellent"), "reviewer@acme", at);
        assert_ne!(a, c);
    }
}
