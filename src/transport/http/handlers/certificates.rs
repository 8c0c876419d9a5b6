//! Certificate endpoints: lookup, anchoring triggers, revocation and ledger
//! statistics.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::error::CoreError;
use crate::transport::http::handlers::common::{
    actor_from_headers, certificate_json, core_error_response,
};
use crate::transport::http::types::{ApiResponse, AppState, BatchAnchorRequestBody, RevokeRequest};

#[utoipa::path(
    get,
    path = "/api/certificates/{id}",
    params(("id" = i64, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate found", body = ApiResponse),
        (status = 404, description = "No such certificate", body = ApiResponse)
    )
)]
pub async fn get_certificate_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.certificates.get(id).await {
        Ok(Some(cert)) => {
            (StatusCode::OK, Json(ApiResponse::ok(certificate_json(&cert)))).into_response()
        }
        Ok(None) => core_error_response(CoreError::NotFound(format!("certificate {}", id)))
            .into_response(),
        Err(e) => core_error_response(CoreError::Storage(e)).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/certificates/{id}/anchor",
    params(("id" = i64, Path, description = "Certificate id")),
    responses(
        (status = 202, description = "Anchoring enqueued", body = ApiResponse),
        (status = 404, description = "No such certificate", body = ApiResponse)
    )
)]
pub async fn anchor_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    // Fire-and-forget: the outcome surfaces through status queries.
    match state.anchors.enqueue(id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(serde_json::json!({
                "certificate_id": id,
                "enqueued": true,
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/certificates/anchor-batch",
    request_body = BatchAnchorRequestBody,
    responses(
        (status = 202, description = "Batch anchoring enqueued", body = ApiResponse),
        (status = 400, description = "Empty batch or batch over the size cap", body = ApiResponse)
    )
)]
pub async fn anchor_batch_handler(
    State(state): State<AppState>,
    Json(body): Json<BatchAnchorRequestBody>,
) -> impl IntoResponse {
    let count = body.certificate_ids.len();
    match state.anchors.enqueue_batch(body.certificate_ids).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(serde_json::json!({
                "certificates": count,
                "enqueued": true,
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/certificates/{id}/revoke",
    params(("id" = i64, Path, description = "Certificate id")),
    request_body = RevokeRequest,
    responses(
        (status = 200, description = "Certificate revoked", body = ApiResponse),
        (status = 403, description = "Not the issuing university or an admin", body = ApiResponse),
        (status = 409, description = "Certificate is not ACTIVE", body = ApiResponse)
    )
)]
pub async fn revoke_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<RevokeRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state
        .anchors
        .revoke_certificate(&actor, id, &body.reason)
        .await
    {
        Ok(cert) => {
            (StatusCode::OK, Json(ApiResponse::ok(certificate_json(&cert)))).into_response()
        }
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/ledger/statistics",
    responses(
        (status = 200, description = "On-chain registry counters", body = ApiResponse),
        (status = 502, description = "Ledger error", body = ApiResponse),
        (status = 503, description = "Ledger unavailable", body = ApiResponse)
    )
)]
pub async fn ledger_statistics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.statistics().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "total": stats.total,
                "active": stats.active,
                "revoked": stats.revoked,
                "chain_id": state.ledger.chain_id(),
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(CoreError::from(e)).into_response(),
    }
}
