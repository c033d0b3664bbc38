//! Acting user extractor

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::types::ApiError;
use crate::domain::ids::UserId;

/// Header carrying the id of the user the request acts for
pub const ACTOR_HEADER: &str = "x-user-id";

/// Extractor for the acting user, read from the `x-user-id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parse_actor(&parts.headers)?;
        debug!(actor = %user_id, "Resolved acting user");
        Ok(Actor(user_id))
    }
}

/// Parse the acting user from request headers
pub fn parse_actor(headers: &axum::http::HeaderMap) -> Result<UserId, ApiError> {
    let value = headers.get(ACTOR_HEADER).ok_or_else(|| {
        ApiError::unauthorized(format!("Missing {} header", ACTOR_HEADER))
    })?;

    let raw = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid x-user-id header encoding").with_param(ACTOR_HEADER))?;

    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(UserId::new(id)),
        _ => Err(ApiError::bad_request(format!("Invalid user id '{}'", raw)).with_param(ACTOR_HEADER)),
    }
}
