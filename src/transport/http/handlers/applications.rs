//! Application lifecycle endpoints: creation, drafting, submission, the two
//! review stages, registration and administration.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::model::{DraftUpdate, NewApplication, OrgKind};
use crate::transport::http::handlers::common::{
    actor_from_headers, application_json, certificate_json, core_error_response,
};
use crate::transport::http::types::{
    json_422, ApiResponse, ApproveOrgRequest, AppState, CompanyReviewRequest,
    CreateApplicationRequest, RegistrationRequest, UniversityReviewRequest, UpdateDraftRequest,
    WhitelistRequest,
};

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 200, description = "Draft application created", body = ApiResponse),
        (status = 400, description = "Invalid input", body = ApiResponse),
        (status = 403, description = "Not a student", body = ApiResponse)
    )
)]
pub async fn create_application_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return json_422(e, "CreateApplicationRequest").into_response(),
    };
    let new = NewApplication {
        student_id: body.student_id,
        student_user_id: actor.user_id,
        student_wallet: body.student_wallet,
        company_code: body.company_code,
        position: body.position,
        start_date: body.start_date,
        end_date: body.end_date,
        description: body.description,
    };
    match state.workflow.create_application(&actor, new).await {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/applications",
    responses(
        (status = 200, description = "Applications owned by the caller", body = ApiResponse)
    )
)]
pub async fn list_applications_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state.workflow.list_my_applications(&actor).await {
        Ok(apps) => {
            let data = serde_json::Value::Array(apps.iter().map(application_json).collect());
            (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
        }
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(("id" = i64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application found", body = ApiResponse),
        (status = 403, description = "Not a party to this application", body = ApiResponse),
        (status = 404, description = "No such application", body = ApiResponse)
    )
)]
pub async fn get_application_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state.workflow.get_application(&actor, id).await {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/draft",
    params(("id" = i64, Path, description = "Application id")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Draft updated", body = ApiResponse),
        (status = 409, description = "Application is no longer a draft", body = ApiResponse)
    )
)]
pub async fn update_draft_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<UpdateDraftRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    let update = DraftUpdate {
        company_code: body.company_code,
        position: body.position,
        start_date: body.start_date,
        end_date: body.end_date,
        description: body.description,
    };
    match state.workflow.update_draft(&actor, id, update).await {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/submit",
    params(("id" = i64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application submitted", body = ApiResponse),
        (status = 409, description = "Not in DRAFT", body = ApiResponse)
    )
)]
pub async fn submit_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state.workflow.submit(&actor, id).await {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/withdraw",
    params(("id" = i64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application withdrawn", body = ApiResponse),
        (status = 409, description = "Too late to withdraw", body = ApiResponse)
    )
)]
pub async fn withdraw_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state.workflow.withdraw(&actor, id).await {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/company-review",
    params(("id" = i64, Path, description = "Application id")),
    request_body = CompanyReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = ApiResponse),
        (status = 400, description = "Invalid verdict", body = ApiResponse),
        (status = 403, description = "Not a member of the named company", body = ApiResponse)
    )
)]
pub async fn company_review_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<CompanyReviewRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    let result = if body.approve {
        let score = match body.score {
            Some(s) => s,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::err("a score is required to approve".to_string())),
                )
                    .into_response()
            }
        };
        state
            .workflow
            .company_approve(&actor, id, score, body.evaluation)
            .await
    } else {
        state
            .workflow
            .company_reject(&actor, id, body.reason.as_deref().unwrap_or(""))
            .await
    };
    match result {
        Ok(app) => (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/university-review",
    params(("id" = i64, Path, description = "Application id")),
    request_body = UniversityReviewRequest,
    responses(
        (status = 200, description = "Review recorded; certificate issued on approval", body = ApiResponse),
        (status = 403, description = "Not a member of the named university", body = ApiResponse),
        (status = 409, description = "Already reviewed", body = ApiResponse)
    )
)]
pub async fn university_review_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<UniversityReviewRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    if body.approve {
        match state.workflow.university_approve(&actor, id, body.note).await {
            Ok((app, cert)) => {
                let data = serde_json::json!({
                    "application": application_json(&app),
                    "certificate": certificate_json(&cert),
                });
                (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
            }
            Err(e) => core_error_response(e).into_response(),
        }
    } else {
        match state
            .workflow
            .university_reject(&actor, id, body.reason.as_deref().unwrap_or(""))
            .await
        {
            Ok(app) => {
                (StatusCode::OK, Json(ApiResponse::ok(application_json(&app)))).into_response()
            }
            Err(e) => core_error_response(e).into_response(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/registration",
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Student registered", body = ApiResponse),
        (status = 400, description = "Not whitelisted", body = ApiResponse),
        (status = 409, description = "Whitelist entry already used", body = ApiResponse)
    )
)]
pub async fn registration_handler(
    State(state): State<AppState>,
    Json(body): Json<RegistrationRequest>,
) -> impl IntoResponse {
    match state.workflow.register_student(&body.student_id).await {
        Ok(entry) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "student_id": entry.student_id,
                "university_code": entry.university_code,
                "used": entry.used,
                "used_at": entry.used_at,
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/whitelist",
    request_body = WhitelistRequest,
    responses(
        (status = 200, description = "Whitelist entry created", body = ApiResponse),
        (status = 403, description = "Admin only", body = ApiResponse)
    )
)]
pub async fn add_whitelist_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WhitelistRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    match state
        .workflow
        .add_whitelist_entry(&actor, &body.student_id, &body.university_code)
        .await
    {
        Ok(entry) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "student_id": entry.student_id,
                "university_code": entry.university_code,
                "used": entry.used,
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/approve-org",
    request_body = ApproveOrgRequest,
    responses(
        (status = 200, description = "Organization account approved", body = ApiResponse),
        (status = 400, description = "Invalid organization kind", body = ApiResponse),
        (status = 403, description = "Admin only", body = ApiResponse)
    )
)]
pub async fn approve_org_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ApproveOrgRequest>,
) -> impl IntoResponse {
    let actor = match actor_from_headers(&headers) {
        Ok(a) => a,
        Err(resp) => return resp.into_response(),
    };
    let kind = match OrgKind::parse(&body.kind) {
        Some(k) => k,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::err(format!(
                    "unknown organization kind: {}",
                    body.kind
                ))),
            )
                .into_response()
        }
    };
    match state
        .workflow
        .approve_org_account(&actor, body.user_id, &body.code, &body.name, kind)
        .await
    {
        Ok(org) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "id": org.id,
                "code": org.code,
                "name": org.name,
                "kind": org.kind.as_str(),
            }))),
        )
            .into_response(),
        Err(e) => core_error_response(e).into_response(),
    }
}
