use super::{SubscriptionStatus, Tier};
use serde::{Serialize, Serializer};
use time::OffsetDateTime;

/// How many received images a user may see unblurred in a single thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageAllowance {
    Limited(u32),
    Unlimited,
}

impl ImageAllowance {
    /// `index` is the zero-based position of a received image within a thread.
    pub fn reveals(&self, index: usize) -> bool {
        match self {
            ImageAllowance::Limited(max) => index < *max as usize,
            ImageAllowance::Unlimited => true,
        }
    }
}

impl Serialize for ImageAllowance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ImageAllowance::Limited(max) => serializer.serialize_u32(*max),
            ImageAllowance::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    SendGifts,
    SendImages,
    ShareContacts,
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &'static str {
        match self {
            Capability::SendGifts => "canSendGifts",
            Capability::SendImages => "canSendImages",
            Capability::ShareContacts => "canShareContacts",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_send_gifts: bool,
    pub can_send_images: bool,
    pub max_received_images_unblurred: ImageAllowance,
    pub can_share_contacts: bool,
}

impl Capabilities {
    pub const NON_PAYING: Capabilities = Capabilities {
        can_send_gifts: false,
        can_send_images: false,
        max_received_images_unblurred: ImageAllowance::Limited(2),
        can_share_contacts: false,
    };

    const PLUS: Capabilities = Capabilities {
        can_send_gifts: true,
        can_send_images: true,
        max_received_images_unblurred: ImageAllowance::Unlimited,
        can_share_contacts: false,
    };

    const PRO: Capabilities = Capabilities {
        can_send_gifts: true,
        can_send_images: true,
        max_received_images_unblurred: ImageAllowance::Unlimited,
        can_share_contacts: true,
    };

    fn for_tier(tier: Tier) -> Capabilities {
        match tier {
            Tier::Free => Self::NON_PAYING,
            Tier::Plus => Self::PLUS,
            Tier::Pro | Tier::Ultra => Self::PRO,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::SendGifts => self.can_send_gifts,
            Capability::SendImages => self.can_send_images,
            Capability::ShareContacts => self.can_share_contacts,
        }
    }

    /// Whether every capability granted by `other` is granted by `self` too.
    pub fn includes(&self, other: &Capabilities) -> bool {
        (self.can_send_gifts || !other.can_send_gifts)
            && (self.can_send_images || !other.can_send_images)
            && (self.can_share_contacts || !other.can_share_contacts)
            && self.max_received_images_unblurred >= other.max_received_images_unblurred
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub active: bool,
    pub trial_active: bool,
    pub capabilities: Capabilities,
}

impl Entitlements {
    /// Derives what a user may do right now. Has to be recomputed on every
    /// check so that webhook-driven status changes apply immediately.
    pub fn compute(
        tier: Tier,
        status: SubscriptionStatus,
        trial_end: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> Self {
        let trial_active = trial_end.is_some_and(|end| end > now);
        let active = status.is_paying() || trial_active;

        let status = if !status.is_paying() && trial_active {
            SubscriptionStatus::Trialing
        } else {
            status
        };

        let capabilities = if active {
            Capabilities::for_tier(tier)
        } else {
            Capabilities::NON_PAYING
        };

        Self {
            tier,
            status,
            active,
            trial_active,
            capabilities,
        }
    }
}
