use super::PriceTable;
use crate::{
    domain::{Entitlements, SubscriptionStatus, Tier},
    payment_client::SubscriptionSnapshot,
};
use anyhow::Context;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

pub struct SubscriptionUpsert<'a> {
    pub user_id: Uuid,
    pub customer_id: Option<&'a str>,
    pub snapshot: Option<&'a SubscriptionSnapshot>,
    pub fallback_tier: Tier,
    /// When the processor produced the data; older writes than the stored one are skipped.
    pub observed_at: OffsetDateTime,
}

/// Processor event timestamps have whole-second precision, so every write is
/// ordered at that granularity. Writes within the same second re-apply.
pub fn event_order_stamp(observed_at: OffsetDateTime) -> OffsetDateTime {
    observed_at - time::Duration::nanoseconds(i64::from(observed_at.nanosecond()))
}

/// Columns derived from a processor snapshot, ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionState {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
    pub trial_end: Option<OffsetDateTime>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionState {
    pub fn derive(
        snapshot: Option<&SubscriptionSnapshot>,
        fallback_tier: Tier,
        prices: &PriceTable,
    ) -> Self {
        match snapshot {
            None => Self {
                tier: fallback_tier,
                status: SubscriptionStatus::Inactive,
                subscription_id: None,
                current_period_end: None,
                trial_end: None,
                cancel_at_period_end: false,
            },
            Some(snapshot) => Self {
                tier: prices.tier_for(snapshot.price_id()),
                status: SubscriptionStatus::from_processor(&snapshot.status),
                subscription_id: Some(snapshot.id.clone()),
                current_period_end: snapshot.current_period_end(),
                trial_end: snapshot.trial_end(),
                cancel_at_period_end: snapshot.cancel_at_period_end,
            },
        }
    }
}

/// Writes the user's single subscription row. Returns `false` when a write
/// observed later than `observed_at` is already stored.
#[tracing::instrument(
    name = "Upsert subscription",
    skip(executor, prices, upsert),
    fields(user_id = %upsert.user_id, tier = tracing::field::Empty, status = tracing::field::Empty)
)]
pub async fn upsert_subscription<'e, E>(
    executor: E,
    prices: &PriceTable,
    upsert: SubscriptionUpsert<'_>,
) -> Result<bool, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let state = SubscriptionState::derive(upsert.snapshot, upsert.fallback_tier, prices);
    tracing::Span::current()
        .record("tier", state.tier.as_ref())
        .record("status", state.status.as_ref());

    let result = sqlx::query(
        r#"
        INSERT INTO subscriptions (
            user_id,
            tier,
            status,
            stripe_customer_id,
            stripe_subscription_id,
            current_period_end,
            trial_end,
            cancel_at_period_end,
            last_event_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (user_id) DO UPDATE SET
            tier = EXCLUDED.tier,
            status = EXCLUDED.status,
            stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id),
            stripe_subscription_id = EXCLUDED.stripe_subscription_id,
            current_period_end = EXCLUDED.current_period_end,
            trial_end = EXCLUDED.trial_end,
            cancel_at_period_end = EXCLUDED.cancel_at_period_end,
            last_event_at = EXCLUDED.last_event_at,
            updated_at = EXCLUDED.updated_at
        WHERE subscriptions.last_event_at <= EXCLUDED.last_event_at
        "#,
    )
    .bind(upsert.user_id)
    .bind(state.tier.as_ref())
    .bind(state.status.as_ref())
    .bind(upsert.customer_id)
    .bind(state.subscription_id.as_deref())
    .bind(state.current_period_end)
    .bind(state.trial_end)
    .bind(state.cancel_at_period_end)
    .bind(event_order_stamp(upsert.observed_at))
    .execute(executor)
    .await
    .context("Failed to upsert subscription")?;

    let applied = result.rows_affected() == 1;
    if !applied {
        tracing::info!("Skipped a subscription write older than the stored one");
    }

    Ok(applied)
}

/// Flags every subscription of the customer as past due, whatever its status was.
#[tracing::instrument(name = "Mark subscription past due", skip(db_pool))]
pub async fn mark_past_due(db_pool: &PgPool, customer_id: &str) -> Result<u64, anyhow::Error> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = $1, updated_at = now()
        WHERE stripe_customer_id = $2
        "#,
    )
    .bind(SubscriptionStatus::PastDue.as_ref())
    .bind(customer_id)
    .execute(db_pool)
    .await
    .context("Failed to mark subscription as past due")?;

    Ok(result.rows_affected())
}

/// Remembers the processor customer created for a user before anything else is
/// known about their subscription. An already stored customer id is kept.
#[tracing::instrument(name = "Save processor customer", skip(db_pool))]
pub async fn save_customer_id(
    db_pool: &PgPool,
    user_id: Uuid,
    customer_id: &str,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET stripe_customer_id = $2, updated_at = now()
        WHERE user_id = $1 AND stripe_customer_id IS NULL
        "#,
    )
    .bind(user_id)
    .bind(customer_id)
    .execute(db_pool)
    .await
    .context("Failed to save processor customer id")?;

    Ok(())
}

#[tracing::instrument(name = "Find user by processor customer", skip(db_pool))]
pub async fn find_user_by_customer(
    db_pool: &PgPool,
    customer_id: &str,
) -> Result<Option<Uuid>, anyhow::Error> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT user_id
        FROM subscriptions
        WHERE stripe_customer_id = $1
        LIMIT 1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(db_pool)
    .await
    .context("Failed to look up user by customer id")
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredSubscription {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
    pub trial_end: Option<OffsetDateTime>,
    pub cancel_at_period_end: bool,
}

impl StoredSubscription {
    pub fn entitlements(&self, now: OffsetDateTime) -> Entitlements {
        Entitlements::compute(self.tier, self.status, self.trial_end, now)
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    tier: String,
    status: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    current_period_end: Option<OffsetDateTime>,
    trial_end: Option<OffsetDateTime>,
    cancel_at_period_end: bool,
}

impl TryFrom<SubscriptionRow> for StoredSubscription {
    type Error = String;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            tier: row.tier.try_into()?,
            status: row.status.try_into()?,
            customer_id: row.stripe_customer_id,
            subscription_id: row.stripe_subscription_id,
            current_period_end: row.current_period_end,
            trial_end: row.trial_end,
            cancel_at_period_end: row.cancel_at_period_end,
        })
    }
}

#[tracing::instrument(name = "Load subscription", skip(db_pool))]
pub async fn load_subscription(
    db_pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<StoredSubscription>, anyhow::Error> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        r#"
        SELECT
            tier,
            status,
            stripe_customer_id,
            stripe_subscription_id,
            current_period_end,
            trial_end,
            cancel_at_period_end
        FROM subscriptions
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db_pool)
    .await
    .context("Failed to load subscription")?;

    row.map(StoredSubscription::try_from)
        .transpose()
        .map_err(anyhow::Error::msg)
        .context("Stored subscription is invalid")
}

/// Users without a subscription row are treated as free and inactive.
pub async fn load_entitlements(
    db_pool: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> Result<Entitlements, anyhow::Error> {
    let entitlements = match load_subscription(db_pool, user_id).await? {
        Some(subscription) => subscription.entitlements(now),
        None => Entitlements::compute(Tier::Free, SubscriptionStatus::Inactive, None, now),
    };

    Ok(entitlements)
}
