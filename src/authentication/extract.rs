use crate::utils::error_response;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Response,
};
use uuid::Uuid;

/// Id of the logged-in user, put into request extensions by `AuthorizedSessionLayer`.
#[derive(Clone, Copy, Debug)]
pub struct SessionUserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUserId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionUserId>().copied().ok_or_else(|| {
            tracing::error!("User id not found in request extensions");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        })
    }
}
