mod client;
mod objects;
mod webhook;

pub use client::{is_object_id, PaymentClient};
pub use objects::{CheckoutSession, Customer, Expandable, Invoice, SubscriptionSnapshot};
pub use webhook::{
    SubscriptionChange, VerifiedEvent, WebhookError, WebhookEvent, WebhookVerifier, SIGNATURE_HEADER,
};

/// Metadata key carrying our user id on processor-side customers, sessions and subscriptions.
pub const USER_ID_METADATA_KEY: &str = "user_id";
