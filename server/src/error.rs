//! Error types shared across the server.
//!
//! Storage and directory calls fail with [`StoreError`]; HTTP handlers
//! convert everything into [`ApiError`], which renders as a JSON body
//! `{ "message": ... }` with the matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::gate::GateError;
use crate::notifications::dispatcher::DispatchError;

/// Failure talking to the SQLite database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Access denied. Admin privileges required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store failure");
        ApiError::Internal("Internal server error".to_string())
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingCredential => {
                ApiError::Unauthorized("No authentication token, access denied".to_string())
            }
            GateError::InactiveAccount => ApiError::Unauthorized("Account is inactive".to_string()),
            GateError::Directory(e) => e.into(),
            GateError::InvalidCredential
            | GateError::ExpiredCredential
            | GateError::UnknownSubject => ApiError::Unauthorized("Token is invalid".to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidTemplate(msg) => ApiError::BadRequest(msg),
            DispatchError::Directory(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}
