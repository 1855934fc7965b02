use crate::utils::error_response;
use anyhow::Context;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions, StatusCode},
    response::Response,
};
use tower_sessions::Session;
use uuid::Uuid;

/// The logged-in user stored in the session cookie.
pub struct UserSession(Session);

impl UserSession {
    const USER_ID_KEY: &'static str = "user_id";

    pub fn from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<Session>().cloned().map(Self)
    }

    /// Issues a fresh session id before binding the user to it.
    pub async fn log_in(&self, user_id: Uuid) -> Result<(), anyhow::Error> {
        self.0
            .cycle_id()
            .await
            .context("Failed to cycle session id")?;
        self.0
            .insert(Self::USER_ID_KEY, user_id)
            .await
            .context("Failed to store user id in session")
    }

    pub async fn user_id(&self) -> Result<Option<Uuid>, anyhow::Error> {
        self.0
            .get(Self::USER_ID_KEY)
            .await
            .context("Failed to read user id from session")
    }

    /// Drops the session data and its cookie. Returns whether anyone was logged in.
    pub async fn log_out(&self) -> Result<bool, anyhow::Error> {
        let was_logged_in = self.user_id().await?.is_some();
        if was_logged_in {
            self.0.flush().await.context("Failed to flush session")?;
        }

        Ok(was_logged_in)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Self::from_extensions(&parts.extensions).ok_or_else(|| {
            tracing::error!("Session layer is missing");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        })
    }
}
