use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Inactive,
}

impl SubscriptionStatus {
    /// Maps the payment processor's subscription status vocabulary onto ours.
    pub fn from_processor(status: &str) -> Self {
        match status {
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" | "unpaid" | "incomplete_expired" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Inactive,
        }
    }

    pub fn is_paying(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

impl AsRef<str> for SubscriptionStatus {
    fn as_ref(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_ref() {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(format!(
                "`{other}` is not a valid variant of SubscriptionStatus",
            )),
        }
    }
}
