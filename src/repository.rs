use crate::models::{
    Account, CreateMenuItemRequest, CreateRestaurantRequest, MenuItem, NewAccount, Restaurant,
    Role, UserSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// StoreError
///
/// Failures reported by a credential/catalogue store. `Conflict` is the uniqueness
/// constraint speaking (duplicate email, duplicate role assignment) and is the only
/// variant callers are expected to turn into something other than a 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("missing referenced row: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("store failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::NotFound(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations, so handlers and the auth core can
/// run against Postgres in production and the in-memory store in tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credentials ---
    /// Case-insensitive lookup among non-archived accounts.
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    /// Inserts the account row and its initial role assignment as one atomic unit.
    /// Either both rows exist afterwards or neither does.
    async fn create_account(&self, account: NewAccount, role: Role) -> StoreResult<Uuid>;
    /// Raw role tags currently held by a non-archived account, oldest assignment first.
    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>>;
    async fn has_role(&self, user_id: Uuid, role: Role) -> StoreResult<bool>;
    async fn assign_role(&self, user_id: Uuid, role: Role) -> StoreResult<()>;

    // --- Admin listings ---
    async fn list_users_with_role(&self, role: Role) -> StoreResult<Vec<UserSummary>>;
    /// All non-archived users, or only those provisioned by `created_by`.
    async fn list_users(&self, created_by: Option<Uuid>) -> StoreResult<Vec<UserSummary>>;

    // --- Catalogue ---
    async fn list_restaurants(&self, created_by: Option<Uuid>) -> StoreResult<Vec<Restaurant>>;
    async fn create_restaurant(
        &self,
        req: CreateRestaurantRequest,
        created_by: Uuid,
    ) -> StoreResult<Restaurant>;
    async fn dishes_for_restaurant(&self, restaurant_id: Uuid) -> StoreResult<Vec<MenuItem>>;
    async fn list_menu_items(&self, created_by: Option<Uuid>) -> StoreResult<Vec<MenuItem>>;
    async fn create_menu_item(
        &self,
        req: CreateMenuItemRequest,
        created_by: Uuid,
    ) -> StoreResult<MenuItem>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Runs inside the caller's transaction; must not commit.
async fn insert_account(conn: &mut PgConnection, account: &NewAccount) -> StoreResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"INSERT INTO users (name, email, password_hash, created_by)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(&account.name)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Runs inside the caller's transaction; must not commit.
async fn insert_role_assignment(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: Role,
) -> StoreResult<()> {
    sqlx::query(r#"INSERT INTO user_roles (user_id, role) VALUES ($1, $2)"#)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"SELECT id, name, email, password_hash, created_by, created_at, archived_at
               FROM users
               WHERE LOWER(email) = LOWER($1) AND archived_at IS NULL"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// create_account
    ///
    /// Both inserts share one transaction. Any `?` below drops `tx` uncommitted, which
    /// rolls the whole unit back.
    async fn create_account(&self, account: NewAccount, role: Role) -> StoreResult<Uuid> {
        let mut tx = self.pool.begin().await?;
        let user_id = insert_account(&mut tx, &account).await?;
        insert_role_assignment(&mut tx, user_id, role).await?;
        tx.commit().await?;
        Ok(user_id)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let roles = sqlx::query_scalar::<_, String>(
            r#"SELECT ur.role
               FROM user_roles ur
               JOIN users u ON u.id = ur.user_id
               WHERE ur.user_id = $1 AND ur.archived_at IS NULL AND u.archived_at IS NULL
               ORDER BY ur.created_at ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn has_role(&self, user_id: Uuid, role: Role) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM user_roles
                   WHERE user_id = $1 AND LOWER(role) = $2 AND archived_at IS NULL
               )"#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn assign_role(&self, user_id: Uuid, role: Role) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_role_assignment(&mut conn, user_id, role).await
    }

    async fn list_users_with_role(&self, role: Role) -> StoreResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"SELECT u.id, u.name, u.email
               FROM users u
               JOIN user_roles ur ON u.id = ur.user_id
               WHERE LOWER(ur.role) = $1 AND u.archived_at IS NULL AND ur.archived_at IS NULL
               ORDER BY u.created_at ASC"#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn list_users(&self, created_by: Option<Uuid>) -> StoreResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, name, email
               FROM users
               WHERE archived_at IS NULL AND ($1::uuid IS NULL OR created_by = $1)
               ORDER BY created_at ASC"#,
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn list_restaurants(&self, created_by: Option<Uuid>) -> StoreResult<Vec<Restaurant>> {
        let restaurants = sqlx::query_as::<_, Restaurant>(
            r#"SELECT id, name, description, latitude, longitude, created_by, created_at
               FROM restaurants
               WHERE ($1::uuid IS NULL OR created_by = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;
        Ok(restaurants)
    }

    async fn create_restaurant(
        &self,
        req: CreateRestaurantRequest,
        created_by: Uuid,
    ) -> StoreResult<Restaurant> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r#"INSERT INTO restaurants (name, description, latitude, longitude, created_by)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, name, description, latitude, longitude, created_by, created_at"#,
        )
        .bind(req.name)
        .bind(req.description)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(restaurant)
    }

    async fn dishes_for_restaurant(&self, restaurant_id: Uuid) -> StoreResult<Vec<MenuItem>> {
        let dishes = sqlx::query_as::<_, MenuItem>(
            r#"SELECT id, restaurant_id, name, description, price, is_available,
                      created_by, created_at
               FROM menu_items
               WHERE restaurant_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dishes)
    }

    async fn list_menu_items(&self, created_by: Option<Uuid>) -> StoreResult<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"SELECT id, restaurant_id, name, description, price, is_available,
                      created_by, created_at
               FROM menu_items
               WHERE ($1::uuid IS NULL OR created_by = $1)
               ORDER BY created_at DESC"#,
        )
        .bind(created_by)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn create_menu_item(
        &self,
        req: CreateMenuItemRequest,
        created_by: Uuid,
    ) -> StoreResult<MenuItem> {
        let item = sqlx::query_as::<_, MenuItem>(
            r#"INSERT INTO menu_items (restaurant_id, name, description, price, created_by)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, restaurant_id, name, description, price, is_available,
                         created_by, created_at"#,
        )
        .bind(req.restaurant_id)
        .bind(req.name)
        .bind(req.description)
        .bind(req.price)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }
}

// --- In-Memory Implementation ---

#[derive(Clone)]
struct RoleAssignment {
    user_id: Uuid,
    role: String,
}

/// Unicode case-insensitive equality, matching Postgres `LOWER()` on both sides.
fn lower_eq(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

#[derive(Clone, Default)]
struct MemoryState {
    accounts: Vec<Account>,
    roles: Vec<RoleAssignment>,
    restaurants: Vec<Restaurant>,
    menu_items: Vec<MenuItem>,
}

impl MemoryState {
    fn live_account(&self, user_id: Uuid) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == user_id && a.archived_at.is_none())
    }

    fn insert_account(&mut self, account: &NewAccount) -> StoreResult<Uuid> {
        // Mirrors the partial unique index on LOWER(email) WHERE archived_at IS NULL.
        let taken = self.accounts.iter().any(|a| {
            a.archived_at.is_none() && lower_eq(&a.email, &account.email)
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                account.email
            )));
        }
        let id = Uuid::new_v4();
        self.accounts.push(Account {
            id,
            name: account.name.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            created_by: account.created_by,
            created_at: Utc::now(),
            archived_at: None,
        });
        Ok(id)
    }

    fn insert_role_assignment(&mut self, user_id: Uuid, role: &str) -> StoreResult<()> {
        if !self.accounts.iter().any(|a| a.id == user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let duplicate = self
            .roles
            .iter()
            .any(|r| r.user_id == user_id && lower_eq(&r.role, role));
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already holds {role}"
            )));
        }
        self.roles.push(RoleAssignment {
            user_id,
            role: role.to_string(),
        });
        Ok(())
    }

    fn summaries<'a>(&self, accounts: impl Iterator<Item = &'a Account>) -> Vec<UserSummary> {
        accounts
            .map(|a| UserSummary {
                id: a.id,
                name: a.name.clone(),
                email: a.email.clone(),
            })
            .collect()
    }
}

/// MemoryRepository
///
/// A process-local implementation of `Repository` used by the test suite and for running
/// the API without Postgres. Multi-row writes are staged on a copy of the state and only
/// swapped in once every step succeeded, which gives `create_account` the same
/// all-or-nothing behaviour as the Postgres transaction.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
    fail_role_assignment: Arc<AtomicBool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent role-assignment insert fail, after the account insert of the
    /// same unit has already succeeded.
    pub fn fail_role_assignments(&self, fail: bool) {
        self.fail_role_assignment.store(fail, Ordering::SeqCst);
    }

    /// Inserts an account with arbitrary role tags, bypassing the registration flow.
    pub async fn seed_account(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        roles: &[&str],
    ) -> StoreResult<Uuid> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let id = staged.insert_account(&NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_by: None,
        })?;
        for role in roles {
            staged.insert_role_assignment(id, role)?;
        }
        *state = staged;
        Ok(id)
    }

    /// Replaces every role assignment of `user_id`.
    pub async fn set_roles(&self, user_id: Uuid, roles: &[&str]) {
        let mut state = self.state.write().await;
        state.roles.retain(|r| r.user_id != user_id);
        state
            .roles
            .extend(roles.iter().map(|role| RoleAssignment {
                user_id,
                role: role.to_string(),
            }));
    }

    pub async fn archive_account(&self, user_id: Uuid, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        if let Some(account) = state.accounts.iter_mut().find(|a| a.id == user_id) {
            account.archived_at = Some(at);
        }
    }

    /// Number of account rows with this email, archived ones included.
    pub async fn accounts_with_email(&self, email: &str) -> usize {
        let state = self.state.read().await;
        state
            .accounts
            .iter()
            .filter(|a| lower_eq(&a.email, email))
            .count()
    }

    pub async fn role_assignment_count(&self) -> usize {
        self.state.read().await.roles.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.archived_at.is_none() && lower_eq(&a.email, email))
            .cloned())
    }

    async fn create_account(&self, account: NewAccount, role: Role) -> StoreResult<Uuid> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let user_id = staged.insert_account(&account)?;
        if self.fail_role_assignment.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!(
                "role assignment for {user_id} rejected"
            )));
        }
        staged.insert_role_assignment(user_id, role.as_str())?;
        *state = staged;
        Ok(user_id)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        if state.live_account(user_id).is_none() {
            return Ok(vec![]);
        }
        Ok(state
            .roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role.clone())
            .collect())
    }

    async fn has_role(&self, user_id: Uuid, role: Role) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .iter()
            .any(|r| r.user_id == user_id && lower_eq(&r.role, role.as_str())))
    }

    async fn assign_role(&self, user_id: Uuid, role: Role) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.insert_role_assignment(user_id, role.as_str())
    }

    async fn list_users_with_role(&self, role: Role) -> StoreResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        let holders = state.accounts.iter().filter(|a| {
            a.archived_at.is_none()
                && state
                    .roles
                    .iter()
                    .any(|r| r.user_id == a.id && lower_eq(&r.role, role.as_str()))
        });
        Ok(state.summaries(holders))
    }

    async fn list_users(&self, created_by: Option<Uuid>) -> StoreResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        let visible = state.accounts.iter().filter(|a| {
            a.archived_at.is_none()
                && created_by.is_none_or(|creator| a.created_by == Some(creator))
        });
        Ok(state.summaries(visible))
    }

    async fn list_restaurants(&self, created_by: Option<Uuid>) -> StoreResult<Vec<Restaurant>> {
        let state = self.state.read().await;
        Ok(state
            .restaurants
            .iter()
            .rev()
            .filter(|r| created_by.is_none_or(|creator| r.created_by == Some(creator)))
            .cloned()
            .collect())
    }

    async fn create_restaurant(
        &self,
        req: CreateRestaurantRequest,
        created_by: Uuid,
    ) -> StoreResult<Restaurant> {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            latitude: req.latitude,
            longitude: req.longitude,
            created_by: Some(created_by),
            created_at: Utc::now(),
        };
        self.state.write().await.restaurants.push(restaurant.clone());
        Ok(restaurant)
    }

    async fn dishes_for_restaurant(&self, restaurant_id: Uuid) -> StoreResult<Vec<MenuItem>> {
        let state = self.state.read().await;
        Ok(state
            .menu_items
            .iter()
            .rev()
            .filter(|m| m.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn list_menu_items(&self, created_by: Option<Uuid>) -> StoreResult<Vec<MenuItem>> {
        let state = self.state.read().await;
        Ok(state
            .menu_items
            .iter()
            .rev()
            .filter(|m| created_by.is_none_or(|creator| m.created_by == Some(creator)))
            .cloned()
            .collect())
    }

    async fn create_menu_item(
        &self,
        req: CreateMenuItemRequest,
        created_by: Uuid,
    ) -> StoreResult<MenuItem> {
        let mut state = self.state.write().await;
        if !state.restaurants.iter().any(|r| r.id == req.restaurant_id) {
            return Err(StoreError::NotFound(format!(
                "restaurant {}",
                req.restaurant_id
            )));
        }
        let item = MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: req.restaurant_id,
            name: req.name,
            description: req.description,
            price: req.price,
            is_available: true,
            created_by: Some(created_by),
            created_at: Utc::now(),
        };
        state.menu_items.push(item.clone());
        Ok(item)
    }
}
