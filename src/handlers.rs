use crate::{
    AppState,
    auth::{
        Identity,
        cookie::{REFRESH_COOKIE, cleared_refresh_cookie, read_cookie, refresh_cookie},
        service,
    },
    error::{ApiError, store_failure},
    models::{
        CreateMenuItemRequest, CreateRestaurantRequest, CreateSubAdminRequest, CreatedResponse,
        HealthResponse, LoginRequest, LoginResponse, MenuItem, MessageResponse, RefreshResponse,
        RegisterRequest, RegisterResponse, Restaurant, Role, UserSummary,
    },
    repository::StoreError,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

// --- Query Structs ---

/// ResourceQuery
///
/// `?type=` selector for the generic admin resources endpoint.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResourceQuery {
    /// One of `user`, `restaurant`, `menu`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Restaurant,
    Menu,
}

impl ResourceQuery {
    fn kind(&self) -> Result<ResourceKind, ApiError> {
        match self.kind.as_deref().map(str::trim) {
            None | Some("") => Err(ApiError::invalid_input("missing resource type")),
            Some(raw) if raw.eq_ignore_ascii_case("user") => Ok(ResourceKind::User),
            Some(raw) if raw.eq_ignore_ascii_case("restaurant") => Ok(ResourceKind::Restaurant),
            Some(raw) if raw.eq_ignore_ascii_case("menu") => Ok(ResourceKind::Menu),
            Some(_) => Err(ApiError::invalid_input("invalid resource type")),
        }
    }
}

/// Any JSON body that fails to parse or bind is a plain 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "rejected request body");
        ApiError::invalid_input("invalid request")
    })
}

fn bind_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| {
        tracing::debug!(reason = %e, "rejected resource body");
        ApiError::invalid_input("invalid input")
    })
}

/// Admins see every row; anyone else only the rows they created.
fn creator_scope(identity: &Identity) -> Option<Uuid> {
    if identity.has_role(Role::Admin) {
        None
    } else {
        Some(identity.user_id())
    }
}

// --- Public Handlers ---

/// health
///
/// [Public Route] Liveness check for load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Alive", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { alive: true })
}

/// register_user
///
/// [Public Route] Creates an account holding the `user` role and signs it in. The access
/// token is returned in the body; the refresh token is set as the `refresh_token` cookie.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Missing fields or short password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Registration failed")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let registered = service::register(state.repo.as_ref(), &state.sessions, &payload).await?;

    let cookie = refresh_cookie(
        &registered.tokens.refresh_token,
        state.sessions.refresh_ttl_secs(),
    )?;
    let body = RegisterResponse {
        user_id: registered.user_id,
        name: registered.name,
        email: registered.email,
        access_token: registered.tokens.access_token,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// login
///
/// [Public Route] Exchanges email and password for an access token (body) and a refresh
/// token (cookie).
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    let logged_in = service::login(state.repo.as_ref(), &state.sessions, &payload).await?;

    let cookie = refresh_cookie(
        &logged_in.tokens.refresh_token,
        state.sessions.refresh_ttl_secs(),
    )?;
    let body = LoginResponse {
        user_id: logged_in.user_id,
        name: logged_in.name,
        email: logged_in.email,
        roles: logged_in.roles,
        access_token: logged_in.tokens.access_token,
        message: "Successfully logged in".to_string(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// refresh_token
///
/// [Public Route] Reads the `refresh_token` cookie and rotates both tokens. The new access
/// token carries the roles the account holds now.
#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "Rotated", body = RefreshResponse),
        (status = 401, description = "Missing, invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let presented = read_cookie(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("refresh token missing"))?;

    let refreshed = state
        .sessions
        .refresh(state.repo.as_ref(), &presented)
        .await?;

    let cookie = refresh_cookie(
        &refreshed.tokens.refresh_token,
        state.sessions.refresh_ttl_secs(),
    )?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(RefreshResponse {
            access_token: refreshed.tokens.access_token,
        }),
    ))
}

// --- Authenticated Handlers ---

/// logout
///
/// [Authenticated Route] Overwrites the refresh cookie with an expired empty value. Tokens
/// already handed out stay valid until they expire.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(identity: Identity) -> impl IntoResponse {
    tracing::info!(user_id = %identity.user_id(), "logout");
    (
        [(header::SET_COOKIE, cleared_refresh_cookie())],
        Json(MessageResponse {
            message: "Successfully logged out".to_string(),
        }),
    )
}

/// list_restaurants
///
/// [Authenticated Route] Every restaurant, newest first.
#[utoipa::path(
    get,
    path = "/api/restaurants",
    responses((status = 200, description = "Restaurants", body = [Restaurant]))
)]
pub async fn list_restaurants(
    _identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Restaurant>>, ApiError> {
    let restaurants = state
        .repo
        .list_restaurants(None)
        .await
        .map_err(|e| store_failure("failed to query restaurants", e))?;
    Ok(Json(restaurants))
}

/// get_dishes_by_restaurant
///
/// [Authenticated Route] Menu of a single restaurant.
#[utoipa::path(
    get,
    path = "/api/restaurants/{id}/dishes",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Dishes", body = [MenuItem]),
        (status = 400, description = "Malformed restaurant ID")
    )
)]
pub async fn get_dishes_by_restaurant(
    _identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let restaurant_id =
        Uuid::parse_str(&id).map_err(|_| ApiError::invalid_input("invalid restaurant ID"))?;
    let dishes = state
        .repo
        .dishes_for_restaurant(restaurant_id)
        .await
        .map_err(|e| store_failure("failed to fetch dishes", e))?;
    Ok(Json(dishes))
}

// --- Admin Handlers ---

/// create_subadmin
///
/// [Admin Route] Grants the `subadmin` role to an existing, non-archived account.
#[utoipa::path(
    post,
    path = "/api/admin/subadmins",
    request_body = CreateSubAdminRequest,
    responses(
        (status = 200, description = "Promoted", body = CreatedResponse),
        (status = 404, description = "No such user"),
        (status = 409, description = "Already a subadmin")
    )
)]
pub async fn create_subadmin(
    identity: Identity,
    State(state): State<AppState>,
    payload: Result<Json<CreateSubAdminRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let payload = json_body(payload)?;
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(ApiError::invalid_input("name and email are required"));
    }

    let account = state
        .repo
        .find_account_by_email(payload.email.trim())
        .await
        .map_err(|e| store_failure("server error", e))?
        .ok_or_else(|| ApiError::not_found("user does not exist"))?;

    let already = state
        .repo
        .has_role(account.id, Role::SubAdmin)
        .await
        .map_err(|e| store_failure("role check failed", e))?;
    if already {
        return Err(ApiError::conflict("user is already a subadmin"));
    }

    match state.repo.assign_role(account.id, Role::SubAdmin).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::conflict("user is already a subadmin"));
        }
        Err(e) => return Err(store_failure("failed to assign subadmin role", e)),
    }

    tracing::info!(granted_by = %identity.user_id(), user_id = %account.id, "subadmin granted");
    Ok(Json(CreatedResponse {
        message: "Subadmin created successfully".to_string(),
        id: account.id,
    }))
}

/// list_subadmins
///
/// [Admin Route] Every non-archived account holding `subadmin`.
#[utoipa::path(
    get,
    path = "/api/admin/subadmins",
    responses((status = 200, description = "Subadmins", body = [UserSummary]))
)]
pub async fn list_subadmins(
    _identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let subadmins = state
        .repo
        .list_users_with_role(Role::SubAdmin)
        .await
        .map_err(|e| store_failure("failed to query subadmins", e))?;
    Ok(Json(subadmins))
}

/// list_users
///
/// [Admin/Subadmin Route] Admins see every live account, subadmins only the accounts they
/// created.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses((status = 200, description = "Users", body = [UserSummary]))
)]
pub async fn list_users(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state
        .repo
        .list_users(creator_scope(&identity))
        .await
        .map_err(|e| store_failure("failed to query users", e))?;
    Ok(Json(users))
}

/// list_resources
///
/// [Admin/Subadmin Route] Users, restaurants or menu items, scoped to the caller's own
/// creations unless the caller is an admin.
#[utoipa::path(
    get,
    path = "/api/admin/resources",
    params(ResourceQuery),
    responses(
        (status = 200, description = "Resources of the requested type"),
        (status = 400, description = "Missing or unknown type")
    )
)]
pub async fn list_resources(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = creator_scope(&identity);
    let body = match query.kind()? {
        ResourceKind::User => serde_json::to_value(
            state
                .repo
                .list_users(scope)
                .await
                .map_err(|e| store_failure("failed to query users", e))?,
        ),
        ResourceKind::Restaurant => serde_json::to_value(
            state
                .repo
                .list_restaurants(scope)
                .await
                .map_err(|e| store_failure("failed to query restaurants", e))?,
        ),
        ResourceKind::Menu => serde_json::to_value(
            state
                .repo
                .list_menu_items(scope)
                .await
                .map_err(|e| store_failure("failed to query menu items", e))?,
        ),
    }
    .map_err(|e| {
        tracing::error!(error = %e, "failed to encode resources");
        ApiError::internal("read error")
    })?;
    Ok(Json(body))
}

/// create_resource
///
/// [Admin/Subadmin Route] Creates a user, restaurant or menu item owned by the caller.
/// Users are created through the same atomic account unit as self-registration.
#[utoipa::path(
    post,
    path = "/api/admin/resources",
    params(ResourceQuery),
    responses(
        (status = 201, description = "Created", body = CreatedResponse),
        (status = 400, description = "Missing or unknown type, or invalid body"),
        (status = 404, description = "Referenced restaurant does not exist"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_resource(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = query.kind()?;
    let value = json_body(payload)?;
    let creator = identity.user_id();

    let created = match kind {
        ResourceKind::User => {
            let req: RegisterRequest = bind_value(value)?;
            let (user_id, _) =
                service::create_account(state.repo.as_ref(), &req, Some(creator)).await?;
            CreatedResponse {
                message: "User created".to_string(),
                id: user_id,
            }
        }
        ResourceKind::Restaurant => {
            let req: CreateRestaurantRequest = bind_value(value)?;
            if req.name.trim().is_empty() {
                return Err(ApiError::invalid_input("name is required"));
            }
            let restaurant = state
                .repo
                .create_restaurant(req, creator)
                .await
                .map_err(|e| store_failure("failed to create restaurant", e))?;
            CreatedResponse {
                message: "Restaurant created".to_string(),
                id: restaurant.id,
            }
        }
        ResourceKind::Menu => {
            let req: CreateMenuItemRequest = bind_value(value)?;
            if req.name.trim().is_empty() {
                return Err(ApiError::invalid_input("name is required"));
            }
            let item = match state.repo.create_menu_item(req, creator).await {
                Ok(item) => item,
                Err(StoreError::NotFound(_)) => {
                    return Err(ApiError::not_found("restaurant does not exist"));
                }
                Err(e) => return Err(store_failure("failed to create menu item", e)),
            };
            CreatedResponse {
                message: "Menu item created".to_string(),
                id: item.id,
            }
        }
    };

    Ok((StatusCode::CREATED, Json(created)))
}
