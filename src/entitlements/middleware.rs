use super::ensure_capability;
use crate::{
    authentication::SessionUserId, domain::Capability, subscriptions::load_entitlements,
    utils::error_response,
};
use axum::{
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use time::OffsetDateTime;
use tower::{Layer, Service};
use tracing::Instrument;

/// Answers `402 Payment Required` unless the logged-in user's current
/// entitlements grant `capability`. Must run inside `AuthorizedSessionLayer`.
#[derive(Clone)]
pub struct RequireCapabilityLayer {
    db_pool: PgPool,
    capability: Capability,
}

impl RequireCapabilityLayer {
    pub fn new(db_pool: PgPool, capability: Capability) -> Self {
        Self {
            db_pool,
            capability,
        }
    }
}

impl<S> Layer<S> for RequireCapabilityLayer {
    type Service = RequireCapability<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireCapability {
            inner,
            db_pool: self.db_pool.clone(),
            capability: self.capability,
        }
    }
}

#[derive(Clone)]
pub struct RequireCapability<S> {
    inner: S,
    db_pool: PgPool,
    capability: Capability,
}

impl<ReqBody, S> Service<Request<ReqBody>> for RequireCapability<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let span = tracing::info_span!("Require capability", capability = self.capability.as_ref());
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let db_pool = self.db_pool.clone();
        let capability = self.capability;

        Box::pin(
            async move {
                let Some(SessionUserId(user_id)) = req.extensions().get::<SessionUserId>().copied()
                else {
                    tracing::error!("Capability check ran without an authorized session");
                    return Ok(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Something went wrong",
                    ));
                };

                let entitlements =
                    match load_entitlements(&db_pool, user_id, OffsetDateTime::now_utc()).await {
                        Ok(entitlements) => entitlements,
                        Err(e) => {
                            tracing::error!("{:#?}", e);
                            return Ok(error_response(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "Something went wrong",
                            ));
                        }
                    };

                if let Err(payment_required) = ensure_capability(entitlements, capability) {
                    return Ok(payment_required.into_response());
                }

                inner.call(req).await
            }
            .instrument(span),
        )
    }
}
