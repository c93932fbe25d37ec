use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{Duration, Utc};

use crate::error::ApiError;

pub const REFRESH_COOKIE: &str = "refresh_token";

const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=Strict; Path=/";

/// `Set-Cookie` value carrying a refresh token for `max_age_secs`.
pub fn refresh_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let expires = Duration::try_seconds(max_age_secs)
        .and_then(|max_age| Utc::now().checked_add_signed(max_age))
        .ok_or_else(|| {
            tracing::error!(max_age_secs, "refresh cookie expiry out of range");
            ApiError::internal("failed to generate token")
        })?
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}={token}; {COOKIE_ATTRIBUTES}; Max-Age={max_age_secs}; Expires={expires}"
    ))
    .map_err(|e| {
        tracing::error!(error = %e, "refresh token is not a valid header value");
        ApiError::internal("failed to generate token")
    })
}

/// `Set-Cookie` value that overwrites the refresh cookie with an empty, already expired one.
pub fn cleared_refresh_cookie() -> HeaderValue {
    HeaderValue::from_static(concat!(
        "refresh_token=; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=0; ",
        "Expires=Thu, 01 Jan 1970 00:00:00 GMT",
    ))
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
