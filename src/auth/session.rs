use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::Identity;
use super::token::{AccessClaims, RefreshClaims, TokenCodec, TokenError, TokenUse};
use crate::config::AppConfig;
use crate::error::{ApiError, store_failure};
use crate::repository::Repository;

/// TokenPair
///
/// A freshly minted access token and the refresh token that can later replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// RefreshedSession
///
/// Outcome of a refresh: the subject, the roles re-read from the store, and the new pair.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub tokens: TokenPair,
}

/// SessionIssuer
///
/// Owns the token codec and the two lifetimes. Built once at startup and shared read-only
/// behind an `Arc`.
#[derive(Clone)]
pub struct SessionIssuer {
    codec: TokenCodec,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

/// SessionState
///
/// The concrete type used to share the issuer through the application state.
pub type SessionState = Arc<SessionIssuer>;

impl SessionIssuer {
    pub fn new(codec: TokenCodec, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            codec,
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            TokenCodec::new(config.jwt_secret.as_bytes()),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn issue_pair(&self, user_id: Uuid, roles: &[String]) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(user_id, roles, Utc::now().timestamp())
    }

    /// The access token embeds `roles` verbatim; the refresh token embeds only the subject.
    pub fn issue_pair_at(
        &self,
        user_id: Uuid,
        roles: &[String],
        now: i64,
    ) -> Result<TokenPair, TokenError> {
        let expiry = |ttl: i64| {
            now.checked_add(ttl)
                .ok_or_else(|| TokenError::Signing(format!("lifetime of {ttl}s overflows")))
        };
        let access = AccessClaims {
            sub: user_id,
            roles: roles.to_vec(),
            iat: now,
            exp: expiry(self.access_ttl_secs)?,
            token_use: TokenUse::Access,
        };
        let refresh = RefreshClaims {
            sub: user_id,
            iat: now,
            exp: expiry(self.refresh_ttl_secs)?,
            token_use: TokenUse::Refresh,
        };

        Ok(TokenPair {
            access_token: self.codec.issue(&access)?,
            refresh_token: self.codec.issue(&refresh)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.codec.verify::<AccessClaims>(token)?;
        Ok(Identity::from_claims(&claims))
    }

    /// refresh
    ///
    /// Exchanges a refresh token for a new pair. Roles come from the store as they are now,
    /// never from the presented token. The presented token is not recorded anywhere and
    /// stays usable until it expires on its own.
    pub async fn refresh(
        &self,
        repo: &dyn Repository,
        refresh_token: &str,
    ) -> Result<RefreshedSession, ApiError> {
        let claims = self
            .codec
            .verify::<RefreshClaims>(refresh_token)
            .map_err(|e| {
                tracing::debug!(reason = %e, "refresh token rejected");
                ApiError::unauthorized("invalid or expired refresh token")
            })?;

        let roles = repo
            .roles_for_user(claims.sub)
            .await
            .map_err(|e| store_failure("could not refresh session", e))?;
        if roles.is_empty() {
            tracing::warn!(
                user_id = %claims.sub,
                "refresh refused: account archived or without roles"
            );
            return Err(ApiError::unauthorized("invalid or expired refresh token"));
        }

        let tokens = self.issue_pair(claims.sub, &roles).map_err(|e| {
            tracing::error!(error = %e, user_id = %claims.sub, "token signing failed");
            ApiError::internal("failed to generate token")
        })?;

        Ok(RefreshedSession {
            user_id: claims.sub,
            roles,
            tokens,
        })
    }
}
