use crate::transport::http::handlers::{applications, certificates, health, verify};
use crate::transport::http::types::{
    ApiResponse, ApproveOrgRequest, BatchAnchorRequestBody, CompanyReviewRequest,
    CreateApplicationRequest, RegistrationRequest, RevokeRequest, UniversityReviewRequest,
    UpdateDraftRequest, WhitelistRequest,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        applications::create_application_handler,
        applications::list_applications_handler,
        applications::get_application_handler,
        applications::update_draft_handler,
        applications::submit_handler,
        applications::withdraw_handler,
        applications::company_review_handler,
        applications::university_review_handler,
        applications::registration_handler,
        applications::add_whitelist_handler,
        applications::approve_org_handler,
        certificates::get_certificate_handler,
        certificates::anchor_handler,
        certificates::anchor_batch_handler,
        certificates::revoke_handler,
        certificates::ledger_statistics_handler,
        verify::verify_handler
    ),
    components(schemas(
        ApiResponse,
        CreateApplicationRequest,
        UpdateDraftRequest,
        CompanyReviewRequest,
        UniversityReviewRequest,
        RegistrationRequest,
        WhitelistRequest,
        ApproveOrgRequest,
        RevokeRequest,
        BatchAnchorRequestBody
    ))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/applications",
            get(applications::list_applications_handler).post(applications::create_application_handler),
        )
        .route("/api/applications/:id", get(applications::get_application_handler))
        .route("/api/applications/:id/draft", post(applications::update_draft_handler))
        .route("/api/applications/:id/submit", post(applications::submit_handler))
        .route("/api/applications/:id/withdraw", post(applications::withdraw_handler))
        .route(
            "/api/applications/:id/company-review",
            post(applications::company_review_handler),
        )
        .route(
            "/api/applications/:id/university-review",
            post(applications::university_review_handler),
        )
        .route("/api/registration", post(applications::registration_handler))
        .route("/api/admin/whitelist", post(applications::add_whitelist_handler))
        .route("/api/admin/approve-org", post(applications::approve_org_handler))
        .route("/api/certificates/:id", get(certificates::get_certificate_handler))
        .route("/api/certificates/:id/anchor", post(certificates::anchor_handler))
        .route(
            "/api/certificates/anchor-batch",
            post(certificates::anchor_batch_handler),
        )
        .route("/api/certificates/:id/revoke", post(certificates::revoke_handler))
        .route("/api/ledger/statistics", get(certificates::ledger_statistics_handler))
        .route("/verify/:key", get(verify::verify_handler))
        .with_state(app_state)
}
