use anyhow::Context;
use sqlx::PgPool;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Claims the right to email `user_id` about `correspondent_id` at `now`.
///
/// Returns `true` at most once per `cooldown` window for a given pair, also
/// when called concurrently from several requests or instances: the insert and
/// the conditional timestamp bump happen in one statement, so the row lock
/// taken by the first caller makes every other caller see the fresh timestamp.
#[tracing::instrument(name = "Acquire notification slot", skip(db_pool))]
pub async fn try_acquire_notification_slot(
    db_pool: &PgPool,
    user_id: Uuid,
    correspondent_id: Uuid,
    cooldown: Duration,
    now: OffsetDateTime,
) -> Result<bool, anyhow::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO email_notifications (user_id, correspondent_id, last_sent_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, correspondent_id) DO UPDATE
        SET last_sent_at = EXCLUDED.last_sent_at
        WHERE email_notifications.last_sent_at
            <= EXCLUDED.last_sent_at - $4::float8 * INTERVAL '1 second'
        "#,
    )
    .bind(user_id)
    .bind(correspondent_id)
    .bind(now)
    .bind(cooldown.as_secs_f64())
    .execute(db_pool)
    .await
    .context("Failed to update notification cool-down")?;

    Ok(result.rows_affected() == 1)
}
