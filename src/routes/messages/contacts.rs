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
pub(in crate::routes::messages) struct ShareContactBody {
    correspondent_id: Option<Uuid>,
    contact: Option<String>,
}

#[tracing::instrument(
    name = "Share contact details",
    skip(app_state, user_id, body),
    fields(user_id = %user_id)
)]
pub(in crate::routes::messages) async fn share_contact(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Json(body): Json<ShareContactBody>,
) -> Result<(StatusCode, Json<MessageResponse>), MessageError> {
    let correspondent_id = required(body.correspondent_id, "correspondentId")?;
    let contact = MessageBody::parse(required(body.contact, "contact")?)?;

    let message = store_message(
        &app_state.db_pool,
        NewMessage {
            user_id,
            correspondent_id,
            sender: MessageSender::User,
            kind: MessageKind::Contact,
            body: contact,
        },
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
