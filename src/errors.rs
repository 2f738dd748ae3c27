use crate::auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),

    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found with key: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Web Layer Error ---

/// Request-level error taxonomy. Conflict and BadRequest both answer 400
/// (the wire contract the mobile client expects), but stay distinct so
/// uniqueness violations are never lumped in with ordinary validation.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Missing form field: {0}")]
    MissingFormField(String),
    #[error("Error processing multipart form data: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),

    // Domain/Service level errors (mapped from RepoError/StorageError)
    #[error("Could not access stored records")]
    Repository(#[source] RepoError),
    #[error("Could not perform file storage operation")]
    Storage(#[source] StorageError),

    #[error("Initialization error: {0}")]
    Init(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        AppError::Repository(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            // A missing object is a plain 404, not a backend failure.
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            e => AppError::Storage(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => AppError::Unauthorized("Invalid token".to_string()),
            e @ AuthError::Signing(_) => AppError::Internal(e.to_string()),
        }
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            // 4xx Client Errors
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MissingFormField(field) => (
                StatusCode::BAD_REQUEST,
                format!("Missing form field: {}", field),
            ),
            AppError::Multipart(e) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid multipart form data: {}", e),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),

            // 5xx Server Errors; the cause is logged, the response stays generic
            AppError::Repository(e) => {
                tracing::error!(error.source = ?e, "Repository error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!(error.source = ?e, "Storage error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "File storage operation failed".to_string(),
                )
            }
            AppError::Init(msg) => {
                tracing::error!("Initialization error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server initialization error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        tracing::debug!(error.detail = %self, status = %status, "Responding with error");

        let body = Json(serde_json::json!({ "detail": detail }));
        (status, body).into_response()
    }
}
