use crate::{session_state::UserSession, utils::ApiError};
use axum::http::StatusCode;

#[tracing::instrument(skip(session))]
pub(super) async fn log_out(session: UserSession) -> Result<StatusCode, ApiError> {
    if session.log_out().await? {
        tracing::info!("User logged out");
    }

    Ok(StatusCode::NO_CONTENT)
}
