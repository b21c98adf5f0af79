use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::render::{CompileError, StoreError};
use crate::resume::ResumeError;
use crate::tailoring::jd_fetch::FetchError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Resume(#[from] ResumeError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details: Option<String> = None;

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Resume(e) => {
                let (status, code) = match e {
                    ResumeError::UnsupportedFormat(_) => {
                        (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT")
                    }
                    ResumeError::CorruptInput(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "CORRUPT_INPUT")
                    }
                    ResumeError::EmptyContent => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_CONTENT"),
                    ResumeError::NoSectionsFound => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "NO_SECTIONS_FOUND")
                    }
                    ResumeError::EmptyInput => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_INPUT"),
                };
                (status, code, e.to_string())
            }
            AppError::Compile(e) => match e {
                CompileError::Spawn { .. } | CompileError::Io(_) => {
                    tracing::error!("Compiler error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "COMPILER_UNAVAILABLE",
                        "The LaTeX compiler could not be run".to_string(),
                    )
                }
                CompileError::Timeout(_) => {
                    (StatusCode::BAD_REQUEST, "COMPILE_TIMEOUT", e.to_string())
                }
                CompileError::Failed { .. } | CompileError::MissingOutput { .. } => {
                    details = e.log().map(str::to_string);
                    (StatusCode::BAD_REQUEST, "COMPILE_ERROR", e.to_string())
                }
            },
            AppError::Fetch(e) => match e {
                FetchError::InvalidUrl(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                _ => {
                    tracing::warn!("Job posting fetch failed: {e}");
                    (StatusCode::BAD_GATEWAY, "JOB_FETCH_ERROR", e.to_string())
                }
            },
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
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
        if let Some(details) = details {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
