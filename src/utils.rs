use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// JSON error payload shared by every endpoint: `{"error": "<message>"}`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Errors of endpoints that need no dedicated error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Something went wrong")]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::BadRequest(message) => error_response(StatusCode::BAD_REQUEST, message),
            Self::Unexpected(e) => {
                tracing::error!(error.cause_chain = ?e, "Request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &self.to_string())
            }
        }
    }
}

/// Request bodies keep every field optional so that a missing one is reported by name.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("Missing required field `{field}`"))
}
