use crate::app_state::AppState;
use axum::{routing::post, Router};
use login::login;
use logout::log_out;
use register::register;
use serde::Serialize;
use uuid::Uuid;

mod login;
mod logout;
mod register;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(log_out))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserIdResponse {
    user_id: Uuid,
}
