use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::catalog::QuizError;
use crate::progression::{AssessmentError, InvalidCommitment, UnknownSkillLevel};
use crate::repositories::StoreError;

/// Error type returned by services and handlers. Rendered as
/// `{"message": ..., "status": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Conflict(_) | StoreError::Duplicate(_)) => {
                StatusCode::CONFLICT
            }
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation error: {}", errors))
    }
}

impl From<AssessmentError> for AppError {
    fn from(error: AssessmentError) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<QuizError> for AppError {
    fn from(error: QuizError) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<InvalidCommitment> for AppError {
    fn from(error: InvalidCommitment) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<UnknownSkillLevel> for AppError {
    fn from(error: UnknownSkillLevel) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(StoreError::Conflict(_) | StoreError::Duplicate(_)) => {
                tracing::warn!(error = %self, "Persistence conflict");
                self.to_string()
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "Persistence failed");
                "Persistence failed".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "message": message,
                "status": status.as_u16()
            })),
        )
            .into_response()
    }
}
