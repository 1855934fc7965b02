use crate::{
    app_state::AppState,
    authentication::SessionUserId,
    domain::Entitlements,
    subscriptions::load_entitlements,
    utils::ApiError,
};
use axum::{extract::State, routing::get, Json, Router};
use time::OffsetDateTime;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/entitlements", get(current_entitlements))
}

#[tracing::instrument(skip(app_state, user_id), fields(user_id = %user_id))]
async fn current_entitlements(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
) -> Result<Json<Entitlements>, ApiError> {
    let entitlements = load_entitlements(&app_state.db_pool, user_id, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(entitlements))
}
