use crate::{
    app_state::AppState,
    domain::Tier,
    payment_client::{
        CheckoutSession, Invoice, SubscriptionChange, SubscriptionSnapshot, WebhookError,
        WebhookEvent, SIGNATURE_HEADER,
    },
    subscriptions::{find_user_by_customer, mark_past_due, upsert_subscription, SubscriptionUpsert},
    utils::error_response,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize)]
pub(super) struct Received {
    received: bool,
}

/// Applies a signed processor event. Answers 200 for everything that was
/// handled or deliberately dropped; a 500 makes the processor retry.
#[tracing::instrument(
    name = "Handle payment webhook",
    skip(app_state, headers, payload),
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub(super) async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<Received>, WebhookHandlerError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookHandlerError::MissingSignature)?;

    let event = app_state
        .webhook_verifier
        .verify(&payload, signature, OffsetDateTime::now_utc())?;
    tracing::Span::current()
        .record("event_id", event.id.as_str())
        .record("event_type", event_type(&event.event));

    match event.event {
        WebhookEvent::CheckoutCompleted(session) => {
            on_checkout_completed(&app_state, session, event.created_at).await?
        }
        WebhookEvent::SubscriptionChanged(change, subscription) => {
            on_subscription_changed(&app_state, change, subscription, event.created_at).await?
        }
        WebhookEvent::InvoicePaymentFailed(invoice) => {
            on_invoice_payment_failed(&app_state, invoice).await?
        }
        WebhookEvent::Unhandled(event_type) => {
            tracing::info!(event_type = %event_type, "Ignoring unhandled event type")
        }
    }

    Ok(Json(Received { received: true }))
}

fn event_type(event: &WebhookEvent) -> &str {
    match event {
        WebhookEvent::CheckoutCompleted(_) => "checkout.session.completed",
        WebhookEvent::SubscriptionChanged(SubscriptionChange::Created, _) => {
            "customer.subscription.created"
        }
        WebhookEvent::SubscriptionChanged(SubscriptionChange::Updated, _) => {
            "customer.subscription.updated"
        }
        WebhookEvent::SubscriptionChanged(SubscriptionChange::Deleted, _) => {
            "customer.subscription.deleted"
        }
        WebhookEvent::InvoicePaymentFailed(_) => "invoice.payment_failed",
        WebhookEvent::Unhandled(event_type) => event_type.as_str(),
    }
}

/// The session only carries ids, so the subscription itself is fetched. It is
/// stored at the checkout event's time, on the same clock as later events.
async fn on_checkout_completed(
    app_state: &AppState,
    session: CheckoutSession,
    observed_at: OffsetDateTime,
) -> Result<(), anyhow::Error> {
    let Some(subscription_id) = session.subscription.as_deref() else {
        tracing::info!(session_id = %session.id, "Checkout without a subscription");
        return Ok(());
    };

    let subscription = match app_state
        .payment_client
        .retrieve_subscription(subscription_id)
        .await
    {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "Failed to fetch the checkout's subscription");
            return Ok(());
        }
    };

    let Some(user_id) = resolve_user(
        app_state,
        session.user_id().or_else(|| subscription.user_id()),
        &subscription.customer,
    )
    .await?
    else {
        tracing::warn!(
            customer_id = %subscription.customer,
            "Dropping checkout of an unknown user"
        );
        return Ok(());
    };

    store_snapshot(app_state, user_id, &subscription, observed_at).await
}

async fn on_subscription_changed(
    app_state: &AppState,
    change: SubscriptionChange,
    subscription: SubscriptionSnapshot,
    observed_at: OffsetDateTime,
) -> Result<(), anyhow::Error> {
    let Some(user_id) =
        resolve_user(app_state, subscription.user_id(), &subscription.customer).await?
    else {
        tracing::warn!(
            change = ?change,
            customer_id = %subscription.customer,
            "Dropping subscription change of an unknown user"
        );
        return Ok(());
    };

    store_snapshot(app_state, user_id, &subscription, observed_at).await
}

async fn on_invoice_payment_failed(
    app_state: &AppState,
    invoice: Invoice,
) -> Result<(), anyhow::Error> {
    let Some(customer_id) = invoice.customer.as_deref() else {
        tracing::warn!(invoice_id = %invoice.id, "Failed invoice without a customer");
        return Ok(());
    };

    if mark_past_due(&app_state.db_pool, customer_id).await? == 0 {
        tracing::warn!(customer_id, "Failed invoice for an unknown customer");
    }

    Ok(())
}

/// Tries, in order: the id carried by the event, the row already linked to the
/// customer, and the customer's metadata at the processor.
async fn resolve_user(
    app_state: &AppState,
    from_event: Option<Uuid>,
    customer_id: &str,
) -> Result<Option<Uuid>, anyhow::Error> {
    if from_event.is_some() {
        return Ok(from_event);
    }

    if let Some(user_id) = find_user_by_customer(&app_state.db_pool, customer_id).await? {
        return Ok(Some(user_id));
    }

    match app_state.payment_client.retrieve_customer(customer_id).await {
        Ok(customer) => Ok(customer.user_id()),
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "Failed to fetch customer metadata");
            Ok(None)
        }
    }
}

async fn store_snapshot(
    app_state: &AppState,
    user_id: Uuid,
    subscription: &SubscriptionSnapshot,
    observed_at: OffsetDateTime,
) -> Result<(), anyhow::Error> {
    upsert_subscription(
        &app_state.db_pool,
        &app_state.prices,
        SubscriptionUpsert {
            user_id,
            customer_id: Some(subscription.customer.as_str()),
            snapshot: Some(subscription),
            fallback_tier: Tier::Free,
            observed_at,
        },
    )
    .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub(super) enum WebhookHandlerError {
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature(#[source] WebhookError),
    #[error("Malformed event payload")]
    MalformedPayload(#[source] WebhookError),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<WebhookError> for WebhookHandlerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::InvalidPayload(_) => Self::MalformedPayload(e),
            _ => Self::InvalidSignature(e),
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingSignature => {
                tracing::warn!("Webhook call without a signature");
                StatusCode::BAD_REQUEST
            }
            Self::InvalidSignature(e) => {
                tracing::warn!(error = %e, "Rejected webhook signature");
                StatusCode::BAD_REQUEST
            }
            Self::MalformedPayload(e) => {
                tracing::warn!(error.cause_chain = ?e, "Rejected signed but malformed webhook payload");
                StatusCode::BAD_REQUEST
            }
            Self::UnexpectedError(e) => {
                tracing::error!("{:#?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        error_response(status, &self.to_string())
    }
}
