use super::UserIdResponse;
use crate::{
    app_state::AppState,
    authentication::{validate_credentials, AuthError, Credentials},
    domain::UserEmail,
    session_state::UserSession,
    utils::{error_response, required},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize)]
pub(super) struct LoginBody {
    email: Option<String>,
    password: Option<Secret<String>>,
}

#[tracing::instrument(
    skip(app_state, session, body),
    fields(email = tracing::field::Empty, user_id = tracing::field::Empty)
)]
pub(super) async fn login(
    State(app_state): State<AppState>,
    session: UserSession,
    Json(body): Json<LoginBody>,
) -> Result<Json<UserIdResponse>, LoginError> {
    let email = required(body.email, "email").map_err(LoginError::ValidationError)?;
    let password = required(body.password, "password").map_err(LoginError::ValidationError)?;
    tracing::Span::current().record("email", &tracing::field::display(&email));

    let email = UserEmail::parse(email)
        .map_err(|e| LoginError::AuthError(anyhow::anyhow!(e)))?;

    let user_id = validate_credentials(&app_state.db_pool, Credentials { email, password })
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials(_) => LoginError::AuthError(e.into()),
            AuthError::UnexpectedError(_) => LoginError::UnexpectedError(e.into()),
        })?;
    tracing::Span::current().record("user_id", &tracing::field::display(&user_id));

    session.log_in(user_id).await?;

    Ok(Json(UserIdResponse { user_id }))
}

#[derive(Debug, thiserror::Error)]
pub(super) enum LoginError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(e) => {
                tracing::info!("{:#?}", e);
                StatusCode::UNAUTHORIZED
            }
            Self::UnexpectedError(e) => {
                tracing::error!("{:#?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        error_response(status, &self.to_string())
    }
}
