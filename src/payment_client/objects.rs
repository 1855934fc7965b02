use super::USER_ID_METADATA_KEY;
use serde::Deserialize;
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// A processor field that is either an object id or, when requested through
/// `expand[]`, the object itself.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(T),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

type Metadata = HashMap<String, String>;

fn user_id_from(metadata: &Metadata) -> Option<Uuid> {
    metadata
        .get(USER_ID_METADATA_KEY)
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

fn timestamp(seconds: Option<i64>) -> Option<OffsetDateTime> {
    seconds.and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
}

/// The processor's view of a subscription at one point in time.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub items: SubscriptionItems,
    pub trial_end: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: Metadata,
    pub latest_invoice: Option<Expandable<Invoice>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SubscriptionItems {
    pub data: Vec<SubscriptionItem>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubscriptionItem {
    pub price: Price,
    pub current_period_end: Option<i64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
}

impl SubscriptionSnapshot {
    /// Price of the first line item, which decides the tier.
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    pub fn user_id(&self) -> Option<Uuid> {
        user_id_from(&self.metadata)
    }

    pub fn trial_end(&self) -> Option<OffsetDateTime> {
        timestamp(self.trial_end)
    }

    /// Falls back to the first item on API versions that moved the period onto items.
    pub fn current_period_end(&self) -> Option<OffsetDateTime> {
        timestamp(self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        }))
    }

    /// Client secret of the first payment intent, present when the latest
    /// invoice was expanded together with its payment intent.
    pub fn client_secret(&self) -> Option<&str> {
        self.latest_invoice
            .as_ref()
            .and_then(Expandable::as_object)
            .and_then(|invoice| invoice.payment_intent.as_ref())
            .and_then(Expandable::as_object)
            .and_then(|intent| intent.client_secret.as_deref())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub customer: Option<String>,
    pub payment_intent: Option<Expandable<PaymentIntent>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CheckoutSession {
    pub fn user_id(&self) -> Option<Uuid> {
        user_id_from(&self.metadata)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Customer {
    pub fn user_id(&self) -> Option<Uuid> {
        user_id_from(&self.metadata)
    }
}
