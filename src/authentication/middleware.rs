use super::extract::SessionUserId;
use crate::{session_state::UserSession, utils::error_response};
use anyhow::anyhow;
use axum::{
    http::{Request, StatusCode},
    response::Response,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{Instrument, Span};

/// Rejects requests without a logged-in session with `401` and exposes the
/// user id to handlers as [`SessionUserId`].
#[derive(Clone, Debug)]
pub struct AuthorizedSessionLayer;

impl<S> Layer<S> for AuthorizedSessionLayer {
    type Service = AuthorizedSession<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizedSession { inner }
    }
}

#[derive(Clone, Debug)]
pub struct AuthorizedSession<S> {
    inner: S,
}

impl<S> AuthorizedSession<S> {
    fn unauthorized() -> Response {
        tracing::info!("User is not logged in");
        error_response(StatusCode::UNAUTHORIZED, "Authentication required")
    }

    fn internal_server_error(error: anyhow::Error) -> Response {
        tracing::error!("{:#?}", error);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
    }
}

impl<ReqBody, S> Service<Request<ReqBody>> for AuthorizedSession<S>
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

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let span = tracing::info_span!("Authorize session", user_id = tracing::field::Empty);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let Some(session) = UserSession::from_extensions(req.extensions()) else {
                    return Ok(Self::internal_server_error(anyhow!("Session not found")));
                };

                match session.user_id().await {
                    Ok(Some(user_id)) => {
                        Span::current().record("user_id", tracing::field::display(user_id));
                        req.extensions_mut().insert(SessionUserId(user_id));
                    }
                    Ok(None) => return Ok(Self::unauthorized()),
                    Err(e) => return Ok(Self::internal_server_error(e)),
                };

                inner.call(req).await
            }
            .instrument(span),
        )
    }
}
