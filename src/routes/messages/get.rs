use super::{MessageError, MessageResponse, StoredMessage};
use crate::{
    app_state::AppState, authentication::SessionUserId, domain::MessageKind,
    subscriptions::load_entitlements,
};
use anyhow::Context;
use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lists a thread oldest first. Received images past the user's allowance are
/// returned blurred.
#[tracing::instrument(name = "Get message thread", skip(app_state, user_id), fields(user_id = %user_id))]
pub(in crate::routes::messages) async fn message_thread(
    State(app_state): State<AppState>,
    SessionUserId(user_id): SessionUserId,
    Path(correspondent_id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, MessageError> {
    let entitlements =
        load_entitlements(&app_state.db_pool, user_id, OffsetDateTime::now_utc()).await?;
    let allowance = entitlements.capabilities.max_received_images_unblurred;

    let mut received_images = 0;
    let mut thread = Vec::new();

    for row in get_thread(&app_state.db_pool, user_id, correspondent_id).await? {
        let message = MessageResponse::try_from(row)
            .map_err(anyhow::Error::msg)
            .context("Stored message is invalid")?;

        let message = if message.kind == MessageKind::Image && !message.sender.is_user() {
            let revealed = allowance.reveals(received_images);
            received_images += 1;
            if revealed {
                message
            } else {
                message.blur()
            }
        } else {
            message
        };

        thread.push(message);
    }

    Ok(Json(thread))
}

#[tracing::instrument(skip(db_pool))]
async fn get_thread(
    db_pool: &PgPool,
    user_id: Uuid,
    correspondent_id: Uuid,
) -> Result<Vec<StoredMessage>, anyhow::Error> {
    sqlx::query_as::<_, StoredMessage>(
        r#"
        SELECT message_id, correspondent_id, sent_by_user, kind, body, created_at
        FROM messages
        WHERE user_id = $1 AND correspondent_id = $2
        ORDER BY created_at, message_id
        "#,
    )
    .bind(user_id)
    .bind(correspondent_id)
    .fetch_all(db_pool)
    .await
    .context("Failed to load message thread")
}
