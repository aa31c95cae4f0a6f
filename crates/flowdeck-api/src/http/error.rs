//! Application error type mapping to HTTP status codes.
//!
//! The web UI matches on error message strings, so responses carry the
//! error's display text as a plain string body. Everything maps to 500
//! except an explicit [`AppError::NotFound`], which the workflow detail
//! route uses for missing workflows.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use flowdeck_types::error::{CommitStoreError, UpstreamError, WorkflowError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Workflow store and index errors.
    Workflow(WorkflowError),
    /// Upstream scheduler errors.
    Upstream(UpstreamError),
    /// Commit-graph errors reaching the boundary directly.
    Commit(CommitStoreError),
    /// Lookup miss surfaced as 404.
    NotFound(String),
    /// Anything else that only exists at the HTTP boundary.
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Upstream(e)
    }
}

impl From<CommitStoreError> for AppError {
    fn from(e: CommitStoreError) -> Self {
        AppError::Commit(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Workflow(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Upstream(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Commit(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, message).into_response()
    }
}
