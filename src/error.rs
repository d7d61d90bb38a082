use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy (spec.md §7) — kinds, not class names.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(String),

    #[error("external tool failed: {0}")]
    ExternalTool(String),

    #[error("model load failed: {variant}")]
    ModelLoadFailed { variant: String },

    #[error("circuit break: {0}")]
    CircuitBreak(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::ExternalTool(_) => "external_tool",
            AppError::ModelLoadFailed { .. } => "model_load_failed",
            AppError::CircuitBreak(_) => "circuit_break",
            AppError::Cancelled => "cancelled",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalTool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ModelLoadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CircuitBreak(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Cancelled => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody { code: self.code(), detail: self.to_string() };
        (status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy_kinds() {
        assert_eq!(AppError::Validation("x".into()).code(), "validation");
        assert_eq!(AppError::ModelLoadFailed { variant: "v".into() }.code(), "model_load_failed");
        assert_eq!(AppError::Cancelled.code(), "cancelled");
    }
}
