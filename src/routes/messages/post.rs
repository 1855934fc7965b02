use super::{store_message, MessageError, MessageResponse, NewMessage};
use crate::{
    app_state::AppState,
    authentication::SessionUserId,
    domain::{Capability, MessageBody, MessageKind, MessageSender},
    entitlements::ensure_capability,
    subscriptions::load_entitlements,
    utils::required,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::routes::messages) struct SendMessageBody {
    correspondent_id: Option<Uuid>,
    sender: Option<MessageSender>,
    text: Option<String>,
    image_url: Option<String>,
}

#[tracing::instrument(
    name = "Send a chat message",
    skip(app_state, user_id, body),
    fields(user_id = %user_id)
)]
pub(in crate::routes::messages) async fn send_message(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<MessageResponse>), MessageError> {
    let correspondent_id = required(body.correspondent_id, "correspondentId")?;
    let sender = required(body.sender, "sender")?;

    let (kind, body) = match (body.text, body.image_url) {
        (Some(text), None) => (MessageKind::Text, MessageBody::parse(text)?),
        (None, Some(image_url)) => (MessageKind::Image, MessageBody::parse_image_url(image_url)?),
        (None, None) => {
            return Err(MessageError::ValidationError(
                "Missing required field `text` or `imageUrl`".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(MessageError::ValidationError(
                "Only one of `text` and `imageUrl` may be set".to_string(),
            ))
        }
    };

    let now = OffsetDateTime::now_utc();

    if kind == MessageKind::Image && sender.is_user() {
        let entitlements = load_entitlements(&app_state.db_pool, user_id, now).await?;
        ensure_capability(entitlements, Capability::SendImages)?;
    }

    let message = store_message(
        &app_state.db_pool,
        NewMessage {
            user_id,
            correspondent_id,
            sender,
            kind,
            body,
        },
        now,
    )
    .await?;

    app_state
        .notifier
        .notify_recipient(user_id, correspondent_id, sender, now)
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}
