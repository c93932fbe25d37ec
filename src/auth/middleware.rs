use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::Identity;
use super::session::SessionState;
use crate::error::ApiError;
use crate::models::Role;

/// bearer_token
///
/// Pulls the token out of `Authorization: Bearer <token>`. The scheme is matched
/// case-insensitively and the header must split on single spaces into exactly two
/// segments; anything else (missing header, other scheme, stray segments, empty token)
/// is rejected before any signature work happens.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthorized("unauthorized: missing token");

    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(missing)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(missing()),
    }
}

/// authenticate
///
/// Identity middleware. Verifies the bearer token and attaches the resulting [`Identity`]
/// to this request's extensions; a rejection short-circuits with 401 and the inner
/// service never runs. No store access happens here: the signed claims are the identity.
pub async fn authenticate(
    State(sessions): State<SessionState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;

    let identity = sessions.verify_access(token).map_err(|e| {
        tracing::debug!(reason = %e, "access token rejected");
        ApiError::unauthorized("unauthorized: invalid token")
    })?;

    tracing::debug!(user_id = %identity.user_id(), "request authenticated");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Identity Extractor Implementation
///
/// Hands the identity attached by [`authenticate`] to a handler. Routes that were not
/// wrapped by the identity middleware have none, and the extractor rejects with 401.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("unauthorized"))
    }
}

/// AllowedRoles
///
/// The role set a route accepts, fixed when the router is built. A caller passes if any
/// one of their recognized roles is in the set. There is no hierarchy: a route that
/// admits subadmins but not admins really does refuse admins.
#[derive(Debug, Clone)]
pub struct AllowedRoles(Arc<[Role]>);

impl AllowedRoles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn permits(&self, identity: &Identity) -> bool {
        identity.has_any_role(&self.0)
    }

    /// The whole authorization decision, usable without a request pipeline.
    pub fn check(&self, identity: Option<&Identity>) -> Result<(), ApiError> {
        let identity = identity.ok_or_else(|| ApiError::unauthorized("unauthorized"))?;
        if self.permits(identity) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %identity.user_id(),
                allowed = ?self.0,
                "request forbidden"
            );
            Err(ApiError::forbidden("forbidden: insufficient role"))
        }
    }
}

/// authorize
///
/// Authorization middleware. Must sit inside [`authenticate`]; it only reads the identity
/// already attached to the request.
pub async fn authorize(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    allowed.check(request.extensions().get::<Identity>())?;
    Ok(next.run(request).await)
}
