mod common;

use chrono::Utc;
use common::{TEST_JWT_SECRET, seed_user};
use restro_api::{
    ApiError, MemoryRepository, SessionIssuer,
    auth::{AccessClaims, RefreshClaims, TokenCodec, TokenError, TokenUse},
    models::Role,
};
use uuid::Uuid;

// --- Helper Functions ---

const ACCESS_TTL: i64 = 900;
const REFRESH_TTL: i64 = 7 * 24 * 3600;

fn issuer() -> SessionIssuer {
    SessionIssuer::new(
        TokenCodec::new(TEST_JWT_SECRET.as_bytes()),
        ACCESS_TTL,
        REFRESH_TTL,
    )
}

fn codec() -> TokenCodec {
    TokenCodec::new(TEST_JWT_SECRET.as_bytes())
}

fn access_claims(roles: &[&str], iat: i64, exp: i64) -> AccessClaims {
    AccessClaims {
        sub: Uuid::new_v4(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        iat,
        exp,
        token_use: TokenUse::Access,
    }
}

// --- Token Codec ---

#[test]
fn test_issue_then_verify_returns_same_claims() {
    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let now = Utc::now().timestamp();
    let claims = access_claims(&["user", "subadmin"], now, now + ACCESS_TTL);

    let token = codec.issue(&claims).unwrap();
    let decoded: AccessClaims = codec.verify(&token).unwrap();

    assert_eq!(decoded, claims);
}

#[test]
fn test_verify_is_repeatable() {
    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let now = Utc::now().timestamp();
    let token = codec.issue(&access_claims(&["user"], now, now + 60)).unwrap();

    let first: AccessClaims = codec.verify(&token).unwrap();
    let second: AccessClaims = codec.verify(&token).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_expiry_boundary_is_strict() {
    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let claims = access_claims(&["user"], 1_000, 2_000);
    let token = codec.issue(&claims).unwrap();

    assert!(codec.verify_at::<AccessClaims>(&token, 1_999).is_ok());
    assert_eq!(
        codec.verify_at::<AccessClaims>(&token, 2_000).unwrap_err(),
        TokenError::Expired
    );
    assert_eq!(
        codec.verify_at::<AccessClaims>(&token, 2_001).unwrap_err(),
        TokenError::Expired
    );
}

#[test]
fn test_wrong_secret_is_bad_signature() {
    let signer = TokenCodec::new(b"secret-one");
    let verifier = TokenCodec::new(b"secret-two");
    let now = Utc::now().timestamp();
    let token = signer.issue(&access_claims(&["admin"], now, now + 60)).unwrap();

    assert_eq!(
        verifier.verify::<AccessClaims>(&token).unwrap_err(),
        TokenError::BadSignature
    );
}

#[test]
fn test_tampered_payload_is_rejected() {
    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let now = Utc::now().timestamp();
    let token = codec.issue(&access_claims(&["user"], now, now + 60)).unwrap();

    let forged_payload = codec
        .issue(&access_claims(&["admin"], now, now + 60))
        .unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();
    let forged_body = forged_payload.split('.').nth(1).unwrap();
    parts[1] = forged_body;
    let spliced = parts.join(".");

    assert_eq!(
        codec.verify::<AccessClaims>(&spliced).unwrap_err(),
        TokenError::BadSignature
    );
}

#[test]
fn test_empty_and_garbage_tokens_are_rejected() {
    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());

    assert_eq!(codec.verify::<AccessClaims>("").unwrap_err(), TokenError::Empty);
    assert_eq!(
        codec.verify::<AccessClaims>("not-a-jwt").unwrap_err(),
        TokenError::Malformed
    );
}

#[test]
fn test_token_use_is_enforced_both_ways() {
    let sessions = issuer();
    let pair = sessions
        .issue_pair(Uuid::new_v4(), &["user".to_string()])
        .unwrap();

    assert_eq!(
        codec()
            .verify::<RefreshClaims>(&pair.access_token)
            .unwrap_err(),
        TokenError::WrongUse {
            expected: TokenUse::Refresh,
            found: TokenUse::Access
        }
    );
    assert_eq!(
        codec()
            .verify::<AccessClaims>(&pair.refresh_token)
            .unwrap_err(),
        TokenError::WrongUse {
            expected: TokenUse::Access,
            found: TokenUse::Refresh
        }
    );
}

// --- Session Issuer ---

#[test]
fn test_issue_pair_uses_configured_lifetimes() {
    let sessions = issuer();
    let user_id = Uuid::new_v4();
    let now = 1_700_000_000;

    let pair = sessions
        .issue_pair_at(user_id, &["user".to_string()], now)
        .unwrap();
    let access: AccessClaims = codec().verify_at(&pair.access_token, now).unwrap();
    let refresh: RefreshClaims = codec().verify_at(&pair.refresh_token, now).unwrap();

    assert_eq!(access.sub, user_id);
    assert_eq!(access.roles, vec!["user".to_string()]);
    assert_eq!(access.iat, now);
    assert_eq!(access.exp, now + ACCESS_TTL);
    assert_eq!(refresh.sub, user_id);
    assert_eq!(refresh.exp, now + REFRESH_TTL);
}

#[test]
fn test_issue_pair_with_overflowing_lifetime_fails_cleanly() {
    let sessions = SessionIssuer::new(codec(), ACCESS_TTL, i64::MAX);

    let err = sessions
        .issue_pair(Uuid::new_v4(), &["user".to_string()])
        .unwrap_err();

    assert!(matches!(err, TokenError::Signing(_)));
}

#[test]
fn test_issue_pair_preserves_role_order_and_case() {
    let sessions = issuer();
    let roles = vec!["SubAdmin".to_string(), "user".to_string()];
    let now = Utc::now().timestamp();

    let pair = sessions.issue_pair_at(Uuid::new_v4(), &roles, now).unwrap();
    let access: AccessClaims = codec().verify(&pair.access_token).unwrap();

    assert_eq!(access.roles, roles);
}

#[test]
fn test_verify_access_normalizes_roles() {
    let sessions = issuer();
    let user_id = Uuid::new_v4();
    let pair = sessions
        .issue_pair(user_id, &["ADMIN".to_string(), "chef".to_string()])
        .unwrap();

    let identity = sessions.verify_access(&pair.access_token).unwrap();

    assert_eq!(identity.user_id(), user_id);
    assert!(identity.has_role(Role::Admin));
    assert!(!identity.has_role(Role::User));
    assert_eq!(identity.roles()[1].as_str(), "chef");
    assert!(identity.expires_at() > identity.issued_at());
}

// --- Refresh ---

#[tokio::test]
async fn test_refresh_reflects_current_roles() {
    let repo = MemoryRepository::new();
    let user_id = seed_user(&repo, "alice@example.com", &["user"]).await;
    let sessions = issuer();
    let first = sessions
        .issue_pair(user_id, &["user".to_string()])
        .unwrap();

    repo.set_roles(user_id, &["user", "subadmin"]).await;
    let refreshed = sessions.refresh(&repo, &first.refresh_token).await.unwrap();

    assert_eq!(refreshed.user_id, user_id);
    assert_eq!(
        refreshed.roles,
        vec!["user".to_string(), "subadmin".to_string()]
    );
    let identity = sessions
        .verify_access(&refreshed.tokens.access_token)
        .unwrap();
    assert!(identity.has_role(Role::SubAdmin));
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let repo = MemoryRepository::new();
    let user_id = seed_user(&repo, "bob@example.com", &["user"]).await;
    let sessions = issuer();
    let pair = sessions
        .issue_pair(user_id, &["user".to_string()])
        .unwrap();

    let err = sessions
        .refresh(&repo, &pair.access_token)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::unauthorized("invalid or expired refresh token")
    );
}

#[tokio::test]
async fn test_refresh_rejects_expired_token() {
    let repo = MemoryRepository::new();
    let user_id = seed_user(&repo, "carol@example.com", &["user"]).await;
    let sessions = issuer();
    let long_ago = Utc::now().timestamp() - REFRESH_TTL - 10;
    let pair = sessions
        .issue_pair_at(user_id, &["user".to_string()], long_ago)
        .unwrap();

    let err = sessions
        .refresh(&repo, &pair.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_refuses_archived_account() {
    let repo = MemoryRepository::new();
    let user_id = seed_user(&repo, "dave@example.com", &["user"]).await;
    let sessions = issuer();
    let pair = sessions
        .issue_pair(user_id, &["user".to_string()])
        .unwrap();

    repo.archive_account(user_id, Utc::now()).await;
    let err = sessions
        .refresh(&repo, &pair.refresh_token)
        .await
        .unwrap_err();

    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_stays_usable_after_rotation() {
    // Refresh tokens are not tracked, so the old one is still accepted.
    let repo = MemoryRepository::new();
    let user_id = seed_user(&repo, "erin@example.com", &["user"]).await;
    let sessions = issuer();
    let pair = sessions
        .issue_pair(user_id, &["user".to_string()])
        .unwrap();

    sessions.refresh(&repo, &pair.refresh_token).await.unwrap();
    assert!(sessions.refresh(&repo, &pair.refresh_token).await.is_ok());
}
