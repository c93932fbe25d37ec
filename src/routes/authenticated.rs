use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Mounted under `/api` behind `authenticate`, so every handler here can take an
/// `Identity` argument. No role is required.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/logout
        // Clears the refresh cookie. Outstanding tokens expire on their own.
        .route("/logout", post(handlers::logout))
        // GET /api/restaurants
        .route("/restaurants", get(handlers::list_restaurants))
        // GET /api/restaurants/{id}/dishes
        // A non-UUID id is a 400, not a 404.
        .route(
            "/restaurants/{id}/dishes",
            get(handlers::get_dishes_by_restaurant),
        )
}
