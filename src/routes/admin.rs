use crate::{
    AppState,
    auth::{AllowedRoles, authorize},
    handlers,
    models::Role,
};
use axum::{Router, middleware, routing::get};

/// Admin Router Module
///
/// Mounted at `/api/admin`, inside the identity middleware. Two role sets apply:
/// subadmin management is admin-only, while user and resource management is open to
/// admins and subadmins alike. Each set is attached with `route_layer`, so a path that
/// matches nothing still falls through to a plain 404.
pub fn admin_routes() -> Router<AppState> {
    admin_only_routes().merge(staff_routes())
}

fn admin_only_routes() -> Router<AppState> {
    Router::new()
        // POST /api/admin/subadmins grants `subadmin` to an existing account.
        // GET  /api/admin/subadmins lists current subadmins.
        .route(
            "/subadmins",
            get(handlers::list_subadmins).post(handlers::create_subadmin),
        )
        .route_layer(middleware::from_fn_with_state(
            AllowedRoles::new([Role::Admin]),
            authorize,
        ))
}

fn staff_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/users
        // Admins see everyone; subadmins see the accounts they created.
        .route("/users", get(handlers::list_users))
        // GET/POST /api/admin/resources?type=user|restaurant|menu
        .route(
            "/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route_layer(middleware::from_fn_with_state(
            AllowedRoles::new([Role::Admin, Role::SubAdmin]),
            authorize,
        ))
}
