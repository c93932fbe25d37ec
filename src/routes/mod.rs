//! Router Module Index
//!
//! Routing is split by who may call a route. Each module returns a plain
//! `Router<AppState>`; `create_router` decides which guard wraps it.

/// Routes reachable without a token: health, sign-up, login and refresh.
pub mod public;

/// Routes behind the identity middleware. Any valid access token will do.
pub mod authenticated;

/// Routes behind identity plus a per-router role set.
pub mod admin;
