mod cooldown;

pub use cooldown::try_acquire_notification_slot;

use crate::{
    domain::{MessageSender, UserEmail},
    email_client::{EmailClient, OutgoingEmail},
};
use anyhow::Context;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// What happened to the email for one stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationOutcome {
    SentByUser,
    Muted,
    NoRecipient,
    CoolingDown,
    Sent,
    Failed,
}

/// Emails users about messages their correspondents wrote, at most once per
/// cool-down window and correspondent.
#[derive(Clone)]
pub struct Notifier {
    db_pool: PgPool,
    email_client: EmailClient,
    cooldown: Duration,
    base_url: String,
}

#[derive(FromRow)]
struct Recipient {
    email: String,
    notifications_muted: bool,
}

impl Notifier {
    pub fn new(
        db_pool: PgPool,
        email_client: EmailClient,
        cooldown: Duration,
        base_url: String,
    ) -> Self {
        Self {
            db_pool,
            email_client,
            cooldown,
            base_url,
        }
    }

    /// Never fails: delivery problems are logged and reported through the outcome,
    /// so a stored message is never rolled back because of them.
    #[tracing::instrument(name = "Notify message recipient", skip(self))]
    pub async fn notify_recipient(
        &self,
        user_id: Uuid,
        correspondent_id: Uuid,
        sender: MessageSender,
        now: OffsetDateTime,
    ) -> NotificationOutcome {
        match self.try_notify(user_id, correspondent_id, sender, now).await {
            Ok(outcome) => {
                tracing::info!(outcome = ?outcome, "Notification path finished");
                outcome
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Failed to notify message recipient");
                NotificationOutcome::Failed
            }
        }
    }

    async fn try_notify(
        &self,
        user_id: Uuid,
        correspondent_id: Uuid,
        sender: MessageSender,
        now: OffsetDateTime,
    ) -> Result<NotificationOutcome, anyhow::Error> {
        if sender.is_user() {
            return Ok(NotificationOutcome::SentByUser);
        }

        let Some(recipient) = self.recipient(user_id).await? else {
            return Ok(NotificationOutcome::NoRecipient);
        };

        if recipient.notifications_muted {
            return Ok(NotificationOutcome::Muted);
        }

        let email = match UserEmail::parse(recipient.email) {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping a recipient with an invalid stored email");
                return Ok(NotificationOutcome::NoRecipient);
            }
        };

        if !try_acquire_notification_slot(
            &self.db_pool,
            user_id,
            correspondent_id,
            self.cooldown,
            now,
        )
        .await?
        {
            return Ok(NotificationOutcome::CoolingDown);
        }

        let thread_link = format!("{}/messages/{correspondent_id}", self.base_url);
        let html_body = format!(
            "You have a new message waiting for you.<br />\
            Click <a href=\"{thread_link}\">here</a> to read it."
        );
        let text_body =
            format!("You have a new message waiting for you.\nVisit {thread_link} to read it.");

        self.email_client
            .send(&OutgoingEmail {
                to: &email,
                subject: "You have a new message",
                html_body: &html_body,
                text_body: &text_body,
            })
            .await
            .context("Failed to send notification email")?;

        Ok(NotificationOutcome::Sent)
    }

    async fn recipient(&self, user_id: Uuid) -> Result<Option<Recipient>, anyhow::Error> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT email, notifications_muted
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await
        .context("Failed to load notification recipient")
    }
}

/// Mutes or unmutes message emails for a user.
#[tracing::instrument(name = "Set notification preference", skip(db_pool))]
pub async fn set_notifications_muted(
    db_pool: &PgPool,
    user_id: Uuid,
    muted: bool,
) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE users SET notifications_muted = $1 WHERE user_id = $2")
        .bind(muted)
        .bind(user_id)
        .execute(db_pool)
        .await
        .context("Failed to update notification preference")?;

    Ok(())
}
