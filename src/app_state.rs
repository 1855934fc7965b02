use crate::{
    notifications::Notifier,
    payment_client::{PaymentClient, WebhookVerifier},
    subscriptions::PriceTable,
};
use sqlx::PgPool;

/// Everything handlers share, built once at startup and handed to the router.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub payment_client: PaymentClient,
    pub webhook_verifier: WebhookVerifier,
    pub prices: PriceTable,
    pub notifier: Notifier,
}
