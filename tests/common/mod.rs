#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, header},
    response::Response,
};
use restro_api::{
    AppConfig, AppState, MemoryRepository,
    auth::password::hash_password,
    repository::RepositoryState,
};
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const TEST_PASSWORD: &str = "correct-horse";

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn create_test_state(repo: MemoryRepository) -> AppState {
    create_test_state_with(repo, test_config())
}

pub fn create_test_state_with(repo: MemoryRepository, config: AppConfig) -> AppState {
    AppState::new(Arc::new(repo) as RepositoryState, config)
}

/// Seeds a live account whose password is [`TEST_PASSWORD`].
pub async fn seed_user(repo: &MemoryRepository, email: &str, roles: &[&str]) -> Uuid {
    let hash = hash_password(TEST_PASSWORD).expect("hash");
    repo.seed_account("Test User", email, &hash, roles)
        .await
        .expect("seed account")
}

pub fn access_token(state: &AppState, user_id: Uuid, roles: &[&str]) -> String {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    state
        .sessions
        .issue_pair(user_id, &roles)
        .expect("issue pair")
        .access_token
}

pub fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

/// Value of the `refresh_token` cookie set by a response, if any.
pub fn refresh_cookie_value(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| raw.strip_prefix("refresh_token="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}
