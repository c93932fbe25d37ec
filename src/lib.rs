use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, StatusCode},
    middleware,
};
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authentication, sessions and access control.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Route groups, split by the guard each one sits behind.
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{SessionIssuer, SessionState};
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::register_user, handlers::login, handlers::refresh_token,
        handlers::logout, handlers::list_restaurants, handlers::get_dishes_by_restaurant,
        handlers::create_subadmin, handlers::list_subadmins, handlers::list_users,
        handlers::list_resources, handlers::create_resource
    ),
    components(
        schemas(
            models::Role, models::UserSummary, models::Restaurant, models::MenuItem,
            models::RegisterRequest, models::LoginRequest, models::CreateSubAdminRequest,
            models::CreateRestaurantRequest, models::CreateMenuItemRequest,
            models::RegisterResponse, models::LoginResponse, models::RefreshResponse,
            models::MessageResponse, models::CreatedResponse, models::HealthResponse,
        )
    ),
    tags(
        (
            name = "restro-api",
            description = "Restaurant API: accounts, sessions and access control"
        )
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once in `main` and cloned per request. All
/// members are cheap handles (`Arc`s and a small config struct).
#[derive(Clone)]
pub struct AppState {
    /// Account, role and catalogue persistence.
    pub repo: RepositoryState,
    /// Token codec plus access/refresh lifetimes.
    pub sessions: SessionState,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let sessions = std::sync::Arc::new(SessionIssuer::from_config(&config));
        Self {
            repo,
            sessions,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

/// create_router
///
/// Public routes at the root, everything else under `/api` behind the identity
/// middleware, with the role-gated admin routes nested one level further at
/// `/api/admin`. Guards are attached with `route_layer`, so they only run for paths that
/// actually matched. Every request is bounded by `request_timeout_secs` and answered with
/// 408 when it runs over.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let protected = authenticated::authenticated_routes()
        .nest("/admin", admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            auth::authenticate,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/api", protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with its `x-request-id` so every log line of the
/// request can be correlated. Headers other than the request id are never recorded, which
/// keeps bearer tokens and cookies out of the logs.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
