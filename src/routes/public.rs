use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that carry no identity. Login and refresh are the only places a token pair is
/// minted besides registration; none of them read an `Authorization` header.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers. Returns {"alive":true}.
        .route("/health", get(handlers::health))
        // POST /register
        // Creates the account and its `user` role in one transaction, then signs in.
        .route("/register", post(handlers::register_user))
        // POST /login
        // Verifies credentials and sets the refresh cookie.
        .route("/login", post(handlers::login))
        // POST /refresh
        // Reads the refresh cookie and rotates the pair with roles re-read from the store.
        .route("/refresh", post(handlers::refresh_token))
}
