//! Maps pipeline/storage errors onto HTTP status codes and the
//! `{"error": {"message", "type", "code"}}` envelope every client sees.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use llmrelay_core::PipelineError;
use llmrelay_store::StoreError;

pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": {
                "message": self.message,
                "type": "invalid_request_error",
                "code": self.code,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let (status, code) = match &err {
            PipelineError::BudgetExhausted(_) => (StatusCode::TOO_MANY_REQUESTS, "budget_exceeded"),
            PipelineError::DuplicateRequest(_) => (StatusCode::TOO_MANY_REQUESTS, "duplicate_request"),
            PipelineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            PipelineError::ProviderUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "provider_unavailable"),
            PipelineError::NoModelForTier(_) | PipelineError::AllCandidatesFailed => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable")
            }
            PipelineError::Provider(_) => (StatusCode::INTERNAL_SERVER_ERROR, "provider_unavailable"),
            PipelineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        ApiError::new(status, code, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Storage(_) | StoreError::Serde(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        ApiError::new(status, code, err.to_string())
    }
}
