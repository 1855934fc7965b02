mod middleware;

pub use middleware::RequireCapabilityLayer;

use crate::domain::{Capability, Entitlements};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A request that needs a capability the user's subscription does not grant.
#[derive(Debug)]
pub struct PaymentRequired {
    pub capability: Capability,
    pub entitlements: Entitlements,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequiredBody<'a> {
    error: &'a str,
    required_capability: &'a str,
    entitlements: &'a Entitlements,
}

impl IntoResponse for PaymentRequired {
    fn into_response(self) -> Response {
        tracing::info!(
            capability = self.capability.as_ref(),
            tier = self.entitlements.tier.as_ref(),
            status = self.entitlements.status.as_ref(),
            "Capability not granted"
        );

        let body = PaymentRequiredBody {
            error: "Your subscription does not include this feature",
            required_capability: self.capability.as_ref(),
            entitlements: &self.entitlements,
        };

        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }
}

pub fn ensure_capability(
    entitlements: Entitlements,
    capability: Capability,
) -> Result<Entitlements, PaymentRequired> {
    if entitlements.capabilities.allows(capability) {
        Ok(entitlements)
    } else {
        Err(PaymentRequired {
            capability,
            entitlements,
        })
    }
}
