use super::UserIdResponse;
use crate::{
    app_state::AppState,
    authentication::{register_user, RegistrationError},
    domain::{NewPassword, Tier, UserEmail},
    subscriptions::{upsert_subscription, SubscriptionUpsert},
    utils::{error_response, required},
};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::Secret;
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Deserialize)]
pub(super) struct RegisterBody {
    email: Option<String>,
    password: Option<Secret<String>>,
}

#[tracing::instrument(
    name = "Register a new user",
    skip(app_state, body),
    fields(user_id = tracing::field::Empty)
)]
pub(super) async fn register(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<UserIdResponse>), RegisterError> {
    let email = UserEmail::parse(required(body.email, "email")?)?;
    let password = NewPassword::parse(required(body.password, "password")?)
        .map_err(|e| RegisterError::ValidationError(e.to_string()))?;

    let mut transaction = app_state
        .db_pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;

    let user_id = register_user(&mut *transaction, &email, password)
        .await
        .map_err(|e| match e {
            RegistrationError::EmailTaken => RegisterError::EmailTaken,
            RegistrationError::UnexpectedError(e) => RegisterError::UnexpectedError(e),
        })?;
    tracing::Span::current().record("user_id", &tracing::field::display(&user_id));

    upsert_subscription(
        &mut *transaction,
        &app_state.prices,
        SubscriptionUpsert {
            user_id,
            customer_id: None,
            snapshot: None,
            fallback_tier: Tier::Free,
            observed_at: OffsetDateTime::UNIX_EPOCH,
        },
    )
    .await?;

    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to store a new user")?;

    Ok((StatusCode::CREATED, Json(UserIdResponse { user_id })))
}

#[derive(Debug, thiserror::Error)]
pub(super) enum RegisterError {
    #[error("{0}")]
    ValidationError(String),
    #[error("This email is already registered")]
    EmailTaken,
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<String> for RegisterError {
    fn from(message: String) -> Self {
        Self::ValidationError(message)
    }
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::UnexpectedError(e) => {
                tracing::error!("{:#?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        error_response(status, &self.to_string())
    }
}
