use crate::app_state::AppState;
use axum::{routing::post, Router};
use subscribe::subscribe;
use webhook::handle_webhook;

mod subscribe;
mod webhook;

/// Needs a logged-in session.
pub fn subscribe_router() -> Router<AppState> {
    Router::new().route("/api/stripe/subscribe", post(subscribe))
}

/// Authenticated by the payload signature instead of a session.
pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}
