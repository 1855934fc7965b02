use super::{CheckoutSession, Invoice, SubscriptionSnapshot};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Signature header is malformed")]
    MalformedHeader,
    #[error("No signature matches the payload")]
    SignatureMismatch,
    #[error("Signature timestamp is outside of the tolerance window")]
    StaleTimestamp,
    #[error("Event payload is invalid")]
    InvalidPayload(#[source] serde_json::Error),
}

/// Checks that webhook payloads were signed by the payment processor.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Secret<String>,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: Secret<String>, tolerance: Duration) -> Self {
        Self { secret, tolerance }
    }

    /// Verifies `t=<unix>,v1=<hex>` against an HMAC-SHA256 of `"{t}.{payload}"`
    /// and only then decodes the event.
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: OffsetDateTime,
    ) -> Result<VerifiedEvent, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::MalformedHeader)?,
                    )
                }
                Some(("v1", value)) => {
                    if let Ok(signature) = hex::decode(value) {
                        signatures.push(signature);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::SignatureMismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        if !signatures
            .iter()
            .any(|signature| mac.clone().verify_slice(signature).is_ok())
        {
            return Err(WebhookError::SignatureMismatch);
        }

        let age = (now.unix_timestamp() - timestamp).unsigned_abs();
        if age > self.tolerance.as_secs() {
            return Err(WebhookError::StaleTimestamp);
        }

        let event: ProcessorEvent =
            serde_json::from_slice(payload).map_err(WebhookError::InvalidPayload)?;
        event.try_into().map_err(WebhookError::InvalidPayload)
    }
}

#[derive(Deserialize)]
struct ProcessorEvent {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    created: i64,
    data: ProcessorEventData,
}

#[derive(Deserialize)]
struct ProcessorEventData {
    object: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionChange {
    Created,
    Updated,
    Deleted,
}

/// The closed set of events we act on.
#[derive(Clone, Debug, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSession),
    SubscriptionChanged(SubscriptionChange, SubscriptionSnapshot),
    InvoicePaymentFailed(Invoice),
    Unhandled(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedEvent {
    pub id: String,
    pub created_at: OffsetDateTime,
    pub event: WebhookEvent,
}

impl TryFrom<ProcessorEvent> for VerifiedEvent {
    type Error = serde_json::Error;

    fn try_from(raw: ProcessorEvent) -> Result<Self, Self::Error> {
        let object = raw.data.object;
        let event = match raw.type_.as_str() {
            "checkout.session.completed" => {
                WebhookEvent::CheckoutCompleted(serde_json::from_value(object)?)
            }
            "customer.subscription.created" => WebhookEvent::SubscriptionChanged(
                SubscriptionChange::Created,
                serde_json::from_value(object)?,
            ),
            "customer.subscription.updated" => WebhookEvent::SubscriptionChanged(
                SubscriptionChange::Updated,
                serde_json::from_value(object)?,
            ),
            "customer.subscription.deleted" => WebhookEvent::SubscriptionChanged(
                SubscriptionChange::Deleted,
                serde_json::from_value(object)?,
            ),
            "invoice.payment_failed" => {
                WebhookEvent::InvoicePaymentFailed(serde_json::from_value(object)?)
            }
            _ => WebhookEvent::Unhandled(raw.type_),
        };

        Ok(Self {
            id: raw.id,
            created_at: OffsetDateTime::from_unix_timestamp(raw.created)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
            event,
        })
    }
}
