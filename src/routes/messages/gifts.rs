use super::{store_message, MessageError, MessageResponse, NewMessage};
use crate::{
    app_state::AppState,
    authentication::SessionUserId,
    domain::{MessageBody, MessageKind, MessageSender},
    utils::required,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::routes::messages) struct SendGiftBody {
    correspondent_id: Option<Uuid>,
    gift: Option<String>,
}

#[tracing::instrument(name = "Send a gift", skip(app_state, user_id, body), fields(user_id = %user_id))]
pub(in crate::routes::messages) async fn send_gift(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Json(body): Json<SendGiftBody>,
) -> Result<(StatusCode, Json<MessageResponse>), MessageError> {
    let correspondent_id = required(body.correspondent_id, "correspondentId")?;
    let gift = MessageBody::parse(required(body.gift, "gift")?)?;

    let message = store_message(
        &app_state.db_pool,
        NewMessage {
            user_id,
            correspondent_id,
            sender: MessageSender::User,
            kind: MessageKind::Gift,
            body: gift,
        },
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
