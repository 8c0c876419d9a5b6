//! Public verification endpoint. No authentication, read-only.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::verify::VerifyKey;
use crate::transport::http::handlers::common::{origin_from_headers, verdict_json};
use crate::transport::http::types::{ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/verify/{key}",
    params(("key" = String, Path, description = "Verification code, certificate number or 0x-prefixed certificate hash")),
    responses(
        (status = 200, description = "Verification verdict (valid or not)", body = ApiResponse),
        (status = 404, description = "No matching certificate anywhere", body = ApiResponse)
    )
)]
pub async fn verify_handler(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let key = VerifyKey::parse(&raw_key);
    let origin = origin_from_headers(&headers);

    match state.verifier.resolve(&key, &origin).await {
        Ok(verdict) => {
            // A miss is still a well-formed verdict; 404 distinguishes it for
            // plain HTTP clients.
            let status = if verdict.found {
                StatusCode::OK
            } else {
                StatusCode::NOT_FOUND
            };
            (status, Json(ApiResponse::ok(verdict_json(&verdict)))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::err(e.to_string())),
        )
            .into_response(),
    }
}
