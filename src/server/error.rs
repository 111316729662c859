use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::application::ApplicationError;
use crate::core::error::WorkflowError;

/// Errors a handler can return. Implements `IntoResponse` so handlers can
/// return `Result<T, ApiError>`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Application(ApplicationError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            ApiError::Application(ApplicationError::Workflow(e @ WorkflowError::Stage { .. })) => {
                log::error!("Run failed: {}", e);
                (StatusCode::BAD_GATEWAY, "STAGE_FAILED", e.to_string())
            }
            ApiError::Application(ApplicationError::Workflow(WorkflowError::Cancelled)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CANCELLED",
                "The server is shutting down".to_string(),
            ),
            ApiError::Application(e) => {
                log::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StageFailure;
    use crate::core::input::ValidationError;
    use crate::llm::LLMError;

    #[test]
    fn test_status_mapping() {
        let validation: ApiError =
            ApplicationError::Validation(ValidationError::MissingField("job_posting_url")).into();
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);

        let stage: ApiError = ApplicationError::Workflow(WorkflowError::Stage {
            stage: "build-profile".to_string(),
            cause: StageFailure::Provider(LLMError::GeminiError("HTTP 429".to_string())),
        })
        .into();
        assert_eq!(stage.into_response().status(), StatusCode::BAD_GATEWAY);

        let missing: ApiError = ApplicationError::MissingOutput("tailor-resume").into();
        assert_eq!(
            missing.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
