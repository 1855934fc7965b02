use crate::{
    app_state::AppState,
    domain::{Capability, MessageBody, MessageKind, MessageSender},
    entitlements::{PaymentRequired, RequireCapabilityLayer},
    utils::error_response,
};
use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use contacts::share_contact;
use get::message_thread;
use gifts::send_gift;
use post::send_message;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

mod contacts;
mod get;
mod gifts;
mod post;

pub fn router(db_pool: PgPool) -> Router<AppState> {
    Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/messages/:correspondent_id", get(message_thread))
        .route(
            "/api/gifts",
            post(send_gift).route_layer(RequireCapabilityLayer::new(
                db_pool.clone(),
                Capability::SendGifts,
            )),
        )
        .route(
            "/api/contacts/share",
            post(share_contact).route_layer(RequireCapabilityLayer::new(
                db_pool,
                Capability::ShareContacts,
            )),
        )
}

/// A message as persisted, one row of a thread.
#[derive(FromRow)]
struct StoredMessage {
    message_id: Uuid,
    correspondent_id: Uuid,
    sent_by_user: bool,
    kind: String,
    body: String,
    created_at: OffsetDateTime,
}

pub(super) struct NewMessage {
    user_id: Uuid,
    correspondent_id: Uuid,
    sender: MessageSender,
    kind: MessageKind,
    body: MessageBody,
}

#[tracing::instrument(
    name = "Store message",
    skip(db_pool, message),
    fields(
        user_id = %message.user_id,
        correspondent_id = %message.correspondent_id,
        kind = message.kind.as_ref()
    )
)]
async fn store_message(
    db_pool: &PgPool,
    message: NewMessage,
    now: OffsetDateTime,
) -> Result<MessageResponse, anyhow::Error> {
    let message_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO messages (message_id, user_id, correspondent_id, sent_by_user, kind, body, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(message_id)
    .bind(message.user_id)
    .bind(message.correspondent_id)
    .bind(message.sender.is_user())
    .bind(message.kind.as_ref())
    .bind(message.body.as_ref())
    .bind(now)
    .execute(db_pool)
    .await
    .context("Failed to store message")?;

    Ok(MessageResponse::new(
        message_id,
        message.correspondent_id,
        message.sender,
        message.kind,
        message.body.as_ref().to_string(),
        now,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MessageResponse {
    message_id: Uuid,
    correspondent_id: Uuid,
    sender: MessageSender,
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<String>,
    blurred: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl MessageResponse {
    fn new(
        message_id: Uuid,
        correspondent_id: Uuid,
        sender: MessageSender,
        kind: MessageKind,
        body: String,
        created_at: OffsetDateTime,
    ) -> Self {
        let mut response = Self {
            message_id,
            correspondent_id,
            sender,
            kind,
            text: None,
            image_url: None,
            gift: None,
            contact: None,
            blurred: false,
            created_at,
        };

        match kind {
            MessageKind::Text => response.text = Some(body),
            MessageKind::Image => response.image_url = Some(body),
            MessageKind::Gift => response.gift = Some(body),
            MessageKind::Contact => response.contact = Some(body),
        }

        response
    }

    /// Hides the image behind a blur; the URL never leaves the server.
    fn blur(mut self) -> Self {
        self.image_url = None;
        self.blurred = true;
        self
    }
}

impl TryFrom<StoredMessage> for MessageResponse {
    type Error = String;

    fn try_from(row: StoredMessage) -> Result<Self, Self::Error> {
        Ok(Self::new(
            row.message_id,
            row.correspondent_id,
            MessageSender::from_sent_by_user(row.sent_by_user),
            row.kind.try_into()?,
            row.body,
            row.created_at,
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub(super) enum MessageError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Payment required")]
    PaymentRequired(PaymentRequired),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<String> for MessageError {
    fn from(message: String) -> Self {
        Self::ValidationError(message)
    }
}

impl From<PaymentRequired> for MessageError {
    fn from(payment_required: PaymentRequired) -> Self {
        Self::PaymentRequired(payment_required)
    }
}

impl IntoResponse for MessageError {
    fn into_response(self) -> Response {
        match self {
            Self::ValidationError(message) => error_response(StatusCode::BAD_REQUEST, &message),
            Self::PaymentRequired(payment_required) => payment_required.into_response(),
            Self::UnexpectedError(e) => {
                tracing::error!("{:#?}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
        }
    }
}
