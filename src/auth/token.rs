use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

/// TokenUse
///
/// Which slot a token was minted for. Verified on decode so an access token cannot be
/// replayed against `/refresh` and a refresh token cannot authenticate API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// AccessClaims
///
/// Payload of the short-lived bearer token. `roles` is a snapshot of the account's role
/// assignments at issuance time and is trusted as-is until `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued At (iat), seconds since the Unix epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the Unix epoch.
    pub exp: i64,
    pub token_use: TokenUse,
}

/// RefreshClaims
///
/// Payload of the long-lived cookie token. Carries no roles: authority is re-read from the
/// store whenever it is exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub token_use: TokenUse,
}

pub trait TokenClaims: Serialize + DeserializeOwned {
    const USE: TokenUse;

    fn expires_at(&self) -> i64;
    fn token_use(&self) -> TokenUse;
}

impl TokenClaims for AccessClaims {
    const USE: TokenUse = TokenUse::Access;

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn token_use(&self) -> TokenUse {
        self.token_use
    }
}

impl TokenClaims for RefreshClaims {
    const USE: TokenUse = TokenUse::Refresh;

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn token_use(&self) -> TokenUse {
        self.token_use
    }
}

/// TokenError
///
/// Why a token was not accepted. Only ever logged; every variant reaches the client as the
/// same 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token minted for {found:?}, expected {expected:?}")]
    WrongUse { expected: TokenUse, found: TokenUse },
    #[error("could not sign token: {0}")]
    Signing(String),
}

/// TokenCodec
///
/// HS256 signer/verifier keyed by the process-wide secret. The secret is handed in at
/// construction so tests can build codecs with their own keys.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `verify_at` against the caller's clock, strictly and
        // without leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue<C: TokenClaims>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify<C: TokenClaims>(&self, token: &str) -> Result<C, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies signature, shape, kind and expiry (`now >= exp` is expired).
    pub fn verify_at<C: TokenClaims>(&self, token: &str, now: i64) -> Result<C, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Empty);
        }

        let data = decode::<C>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.token_use() != C::USE {
            return Err(TokenError::WrongUse {
                expected: C::USE,
                found: claims.token_use(),
            });
        }
        if now >= claims.expires_at() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
