use crate::app::anchor::AnchorService;
use crate::app::workflow::WorkflowService;
use crate::domain::ledger::LedgerGateway;
use crate::domain::verify::VerificationService;
use crate::storage::CertificateStore;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowService>,
    pub anchors: Arc<AnchorService>,
    pub verifier: Arc<VerificationService>,
    pub certificates: Arc<dyn CertificateStore>,
    pub ledger: Arc<dyn LedgerGateway>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateApplicationRequest {
    pub student_id: String,
    #[serde(default)]
    pub student_wallet: Option<String>,
    pub company_code: String,
    pub position: String,
    #[schema(value_type = String)]
    pub start_date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug, ToSchema, Default)]
pub struct UpdateDraftRequest {
    #[serde(default)]
    pub company_code: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Company review verdict: either an approval with a score or a rejection
/// with a reason.
#[derive(Deserialize, Debug, ToSchema)]
pub struct CompanyReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub evaluation: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UniversityReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegistrationRequest {
    pub student_id: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct WhitelistRequest {
    pub student_id: String,
    pub university_code: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ApproveOrgRequest {
    pub user_id: i64,
    pub code: String,
    pub name: String,
    /// `COMPANY` or `UNIVERSITY`.
    pub kind: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RevokeRequest {
    pub reason: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct BatchAnchorRequestBody {
    pub certificate_ids: Vec<i64>,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::err(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
}
