//! Shared handler plumbing: caller identity, error mapping, entity JSON.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value as JsonValue;

use crate::domain::error::CoreError;
use crate::domain::model::{Actor, Application, Certificate, Role};
use crate::domain::verify::VerificationVerdict;
use crate::transport::http::types::ApiResponse;

/// Extracts the pre-authenticated caller from the gateway headers
/// (`x-user-id`, `x-role`, `x-org-code`). Authentication itself happens
/// upstream; these headers are trusted.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, (StatusCode, Json<ApiResponse>)> {
    let unauthorized = |msg: &str| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::err(msg.to_string())),
        )
    };

    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| unauthorized("missing or invalid x-user-id header"))?;
    let role = headers
        .get("x-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .ok_or_else(|| unauthorized("missing or invalid x-role header"))?;
    let org_code = headers
        .get("x-org-code")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    Ok(Actor {
        user_id,
        role,
        org_code,
    })
}

/// Best-effort client origin for the verification audit trail.
pub fn origin_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn core_error_response(err: CoreError) -> (StatusCode, Json<ApiResponse>) {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Authorization(_) => StatusCode::FORBIDDEN,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::LedgerFailure(_) => StatusCode::BAD_GATEWAY,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::err(err.to_string())))
}

pub fn application_json(app: &Application) -> JsonValue {
    serde_json::json!({
        "id": app.id,
        "app_no": app.app_no,
        "student_id": app.student_id,
        "student_user_id": app.student_user_id,
        "student_wallet": app.student_wallet,
        "university_code": app.university_code,
        "company_code": app.company_code,
        "position": app.position,
        "start_date": app.start_date,
        "end_date": app.end_date,
        "description": app.description,
        "status": app.status.as_str(),
        "company_score": app.company_score,
        "company_evaluation": app.company_evaluation,
        "company_signature": app.company_signature,
        "company_reviewer": app.company_reviewer,
        "company_reviewed_at": app.company_reviewed_at,
        "university_note": app.university_note,
        "university_approver": app.university_approver,
        "university_reviewed_at": app.university_reviewed_at,
        "certificate_id": app.certificate_id,
        "rejection_stage": app.rejection_stage.map(|s| s.as_str()),
        "rejection_reason": app.rejection_reason,
        "created_at": app.created_at,
        "updated_at": app.updated_at,
    })
}

pub fn certificate_json(cert: &Certificate) -> JsonValue {
    serde_json::json!({
        "id": cert.id,
        "cert_no": cert.cert_no,
        "application_id": cert.application_id,
        "student_id": cert.student_id,
        "university_code": cert.university_code,
        "company_code": cert.company_code,
        "position": cert.position,
        "start_date": cert.start_date,
        "end_date": cert.end_date,
        "description": cert.description,
        "evaluation": cert.evaluation,
        "status": cert.status.as_str(),
        "verify_code": cert.verify_code,
        "verify_url": cert.verify_url,
        "qr_payload": cert.qr_payload,
        "cert_hash": cert.cert_hash.map(|h| format!("0x{}", hex::encode(h.as_bytes()))),
        "tx_hash": cert.tx_hash,
        "block_number": cert.block_number,
        "chain_id": cert.chain_id,
        "issued_at": cert.issued_at,
        "revoked_at": cert.revoked_at,
        "revoke_reason": cert.revoke_reason,
        "last_error": cert.last_error,
    })
}

pub fn verdict_json(verdict: &VerificationVerdict) -> JsonValue {
    serde_json::json!({
        "found": verdict.found,
        "valid": verdict.valid,
        "status": verdict.status.map(|s| s.as_str()),
        "certificate": verdict.certificate.as_ref().map(certificate_json),
        "ledger": verdict.ledger.as_ref().map(|l| serde_json::json!({
            "available": l.available,
            "found": l.found,
            "valid": l.valid,
            "record": l.record.as_ref().map(|r| serde_json::json!({
                "cert_hash": format!("0x{}", hex::encode(r.cert_hash.as_bytes())),
                "student_id": r.student_id,
                "university_code": r.university_code,
                "company_code": r.company_code,
                "start_unix": r.start_unix,
                "end_unix": r.end_unix,
                "valid": r.valid,
                "anchored_at": r.anchored_at,
                "revoke_reason": r.revoke_reason,
            })),
        })),
    })
}
