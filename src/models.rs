use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// Role
///
/// The closed set of authorization tags an account can hold. Stored as lowercase text in
/// `user_roles.role` and embedded as lowercase strings in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    SubAdmin,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::SubAdmin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::SubAdmin => "subadmin",
            Role::User => "user",
        }
    }

    /// Case-insensitive lookup against the canonical tag names.
    pub fn parse(raw: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// RoleTag
///
/// A role string as it arrived inside a verified token, normalized once at decode time.
/// Tags outside the closed set are kept so they survive into logs and responses, but
/// they never satisfy an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleTag {
    Known(Role),
    Unrecognized(String),
}

impl RoleTag {
    pub fn from_claim(raw: &str) -> Self {
        match Role::parse(raw) {
            Some(role) => RoleTag::Known(role),
            None => RoleTag::Unrecognized(raw.to_string()),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            RoleTag::Known(role) => Some(*role),
            RoleTag::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleTag::Known(role) => role.as_str(),
            RoleTag::Unrecognized(raw) => raw,
        }
    }
}

// --- Credential Store Records ---

/// Account
///
/// A row of the `users` table as the credential store returns it. `archived_at` marks a
/// soft-deleted account; lookups used for authentication never return archived rows.
/// Not `Serialize`: the password hash never reaches a response body.
#[derive(Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// NewAccount
///
/// Input for the atomic account-creation unit. `created_by` is `None` for self-registration
/// and the creator's id when an admin or subadmin provisions the account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_by: Option<Uuid>,
}

/// UserSummary
///
/// Public projection of an account used by the admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

// --- Catalogue ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MenuItem
///
/// A dish offered by a restaurant (`menu_items` table).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub is_available: bool,
    pub created_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /register`, and for creating a user through the admin
/// resources endpoint. The password is hashed before it touches the store and is never
/// logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateSubAdminRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRestaurantRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateMenuItemRequest {
    pub restaurant_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
}

/// --- Response Payloads (Output Schemas) ---

/// RegisterResponse
///
/// The refresh token is not part of the body; it travels in the `refresh_token` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub access_token: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// CreatedResponse
///
/// Acknowledgement for admin writes, carrying the id of the row that was created or
/// promoted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub alive: bool,
}
