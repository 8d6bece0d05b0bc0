use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::draft::DraftError;
use crate::generation::profile::ProfileError;
use crate::llm_client::LlmError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Table store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid model output: {0}")]
    Profile(#[from] ProfileError),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut raw_output = None;
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Store(StoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Store(e) => {
                tracing::error!("Table store error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_ERROR",
                    format!("Could not reach the accomplishments table: {e}"),
                )
            }
            AppError::Llm(LlmError::NotConfigured) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "LLM_NOT_CONFIGURED",
                LlmError::NotConfigured.to_string(),
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                raw_output = e.raw_output().map(str::to_string);
                (StatusCode::BAD_GATEWAY, "LLM_ERROR", e.to_string())
            }
            AppError::Profile(e) => {
                tracing::warn!("Rejected model output: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "INVALID_MODEL_OUTPUT",
                    format!("{e}. Please regenerate."),
                )
            }
            AppError::Draft(e @ DraftError::StaleVersion { .. }) => {
                (StatusCode::CONFLICT, "STALE_DRAFT", e.to_string())
            }
            AppError::Draft(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(raw) = raw_output {
            error["raw_output"] = json!(raw);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let (status, body) = body_of(AppError::Validation("description is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "description is required");
    }

    #[tokio::test]
    async fn test_malformed_model_output_carries_raw_text() {
        let error = AppError::Llm(LlmError::MalformedJson {
            message: "expected value".into(),
            raw: "not json".into(),
        });
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["raw_output"], "not json");
    }

    #[tokio::test]
    async fn test_stale_draft_is_conflict() {
        let error = AppError::Draft(DraftError::StaleVersion {
            submitted: 1,
            current: 2,
        });
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "STALE_DRAFT");
    }

    #[tokio::test]
    async fn test_unconfigured_llm_is_503() {
        let (status, _) = body_of(AppError::Llm(LlmError::NotConfigured)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
