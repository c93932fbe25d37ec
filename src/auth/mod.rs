//! Authentication and access control.
//!
//! `password` hashes credentials, `token` signs and verifies JWTs, `session` turns an
//! account into an access/refresh pair, `middleware` attaches an [`Identity`] to requests
//! and enforces per-route role sets, and `service` holds the register/login flows.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Role, RoleTag};

pub mod cookie;
pub mod middleware;
pub mod password;
pub mod service;
pub mod session;
pub mod token;

pub use middleware::{AllowedRoles, authenticate, authorize, bearer_token};
pub use session::{SessionIssuer, SessionState, TokenPair};
pub use token::{AccessClaims, RefreshClaims, TokenCodec, TokenError, TokenUse};

/// Identity
///
/// The caller of one request, built from a verified access token. It is inserted into the
/// request extensions by [`authenticate`] and handed to handlers as an extractor argument;
/// it has no setters, so nothing downstream can alter what the token said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: Uuid,
    roles: Vec<RoleTag>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Identity {
    /// Role strings are case-folded onto the closed enumeration here, once, at the token
    /// boundary.
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.iter().map(|r| RoleTag::from_claim(r)).collect(),
            issued_at: DateTime::from_timestamp(claims.iat, 0).unwrap_or_default(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn roles(&self) -> &[RoleTag] {
        &self.roles
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|tag| tag.role() == Some(role))
    }

    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.iter().any(|role| self.has_role(*role))
    }
}
