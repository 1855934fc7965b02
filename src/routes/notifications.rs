use crate::{
    app_state::AppState,
    authentication::SessionUserId,
    notifications::set_notifications_muted,
    utils::{required, ApiError},
};
use axum::{extract::State, http::StatusCode, routing::put, Json, Router};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", put(update_notifications))
}

#[derive(Deserialize)]
struct NotificationPreferences {
    muted: Option<bool>,
}

#[tracing::instrument(skip(app_state, user_id, body), fields(user_id = %user_id))]
async fn update_notifications(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Json(body): Json<NotificationPreferences>,
) -> Result<StatusCode, ApiError> {
    let muted = required(body.muted, "muted").map_err(ApiError::BadRequest)?;
    set_notifications_muted(&app_state.db_pool, user_id, muted).await?;

    Ok(StatusCode::NO_CONTENT)
}
