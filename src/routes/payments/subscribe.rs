use crate::{
    app_state::AppState,
    authentication::SessionUserId,
    domain::UserEmail,
    payment_client::is_object_id,
    subscriptions::{load_subscription, save_customer_id, upsert_subscription, SubscriptionUpsert},
    utils::{error_response, required},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubscribeBody {
    price_id: Option<String>,
    payment_method_id: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubscribeResponse {
    client_secret: Option<String>,
    subscription_id: String,
    status: String,
}

/// Starts a paid subscription: reuses or creates the processor customer, makes
/// the given payment method its default and subscribes it to the price.
#[tracing::instrument(
    name = "Subscribe to a paid tier",
    skip(app_state, user_id, body),
    fields(user_id = %user_id, price_id = tracing::field::Empty)
)]
pub(super) async fn subscribe(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Json(body): Json<SubscribeBody>,
) -> Result<Json<SubscribeResponse>, SubscribeError> {
    let price_id = required(body.price_id, "priceId")?;
    let payment_method_id = required(body.payment_method_id, "paymentMethodId")?;
    let email = UserEmail::parse(required(body.email, "email")?)?;
    tracing::Span::current().record("price_id", price_id.as_str());

    if !is_object_id(&payment_method_id) {
        return Err(SubscribeError::ValidationError(format!(
            "Invalid payment method id `{payment_method_id}`"
        )));
    }

    if !app_state.prices.is_known(&price_id) {
        return Err(SubscribeError::ValidationError(format!(
            "Unknown price id `{price_id}`"
        )));
    }

    let stored_customer_id = load_subscription(&app_state.db_pool, user_id)
        .await?
        .and_then(|subscription| subscription.customer_id);

    let customer_id = match stored_customer_id {
        Some(customer_id) => customer_id,
        None => {
            let customer_id = app_state
                .payment_client
                .create_customer(&email, user_id)
                .await
                .map_err(SubscribeError::ProcessorError)?;
            save_customer_id(&app_state.db_pool, user_id, &customer_id).await?;
            customer_id
        }
    };

    app_state
        .payment_client
        .attach_payment_method(&payment_method_id, &customer_id)
        .await
        .map_err(SubscribeError::ProcessorError)?;
    app_state
        .payment_client
        .set_default_payment_method(&customer_id, &payment_method_id)
        .await
        .map_err(SubscribeError::ProcessorError)?;

    let subscription = app_state
        .payment_client
        .create_subscription(&customer_id, &price_id, user_id)
        .await
        .map_err(SubscribeError::ProcessorError)?;

    upsert_subscription(
        &app_state.db_pool,
        &app_state.prices,
        SubscriptionUpsert {
            user_id,
            customer_id: Some(customer_id.as_str()),
            snapshot: Some(&subscription),
            fallback_tier: app_state.prices.tier_for(Some(price_id.as_str())),
            observed_at: OffsetDateTime::now_utc(),
        },
    )
    .await?;

    Ok(Json(SubscribeResponse {
        client_secret: subscription.client_secret().map(ToString::to_string),
        subscription_id: subscription.id,
        status: subscription.status,
    }))
}

#[derive(Debug, thiserror::Error)]
pub(super) enum SubscribeError {
    #[error("{0}")]
    ValidationError(String),
    #[error("The payment processor rejected the request")]
    ProcessorError(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<String> for SubscribeError {
    fn from(message: String) -> Self {
        Self::ValidationError(message)
    }
}

impl IntoResponse for SubscribeError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::ProcessorError(e) => {
                tracing::error!("{:#?}", e);
                StatusCode::BAD_GATEWAY
            }
            Self::UnexpectedError(e) => {
                tracing::error!("{:#?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        error_response(status, &self.to_string())
    }
}
