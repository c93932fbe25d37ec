use uuid::Uuid;

use super::password::{hash_password_blocking, verify_against_dummy, verify_password_blocking};
use super::session::{SessionIssuer, TokenPair};
use crate::error::{ApiError, store_failure};
use crate::models::{LoginRequest, NewAccount, RegisterRequest, Role};
use crate::repository::{Repository, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Registered
///
/// A newly created account together with its first token pair.
#[derive(Debug, Clone)]
pub struct Registered {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub tokens: TokenPair,
}

/// Trims the three fields and rejects empty ones or a short password.
pub fn validate_registration(req: &RegisterRequest) -> Result<RegisterRequest, ApiError> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid_input("all fields are required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_input(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(RegisterRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: req.password.clone(),
    })
}

/// create_account
///
/// Validates, checks for a live account with the same email, hashes the password and then
/// writes the user row plus its `user` role assignment as one atomic unit. `created_by`
/// is set when an admin or subadmin provisions the account on someone's behalf.
///
/// The existence check is only a fast path: two concurrent calls for one email can both
/// pass it, and the store's uniqueness constraint decides. The loser gets the same 409.
pub async fn create_account(
    repo: &dyn Repository,
    req: &RegisterRequest,
    created_by: Option<Uuid>,
) -> Result<(Uuid, RegisterRequest), ApiError> {
    let req = validate_registration(req)?;

    let existing = repo
        .find_account_by_email(&req.email)
        .await
        .map_err(|e| store_failure("registration failed", e))?;
    if existing.is_some() {
        return Err(ApiError::conflict("user already exists"));
    }

    let password_hash = hash_password_blocking(req.password.clone())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::internal("registration failed")
        })?;

    let new_account = NewAccount {
        name: req.name.clone(),
        email: req.email.clone(),
        password_hash,
        created_by,
    };
    let user_id = match repo.create_account(new_account, Role::User).await {
        Ok(id) => id,
        Err(StoreError::Conflict(detail)) => {
            tracing::info!(%detail, "registration lost uniqueness race");
            return Err(ApiError::conflict("user already exists"));
        }
        Err(e) => return Err(store_failure("registration failed", e)),
    };

    tracing::info!(%user_id, created_by = ?created_by, "account created");
    Ok((user_id, req))
}

/// register
///
/// Self-service sign-up. The token pair is minted after the account unit has committed;
/// issuing it needs no durability of its own.
pub async fn register(
    repo: &dyn Repository,
    sessions: &SessionIssuer,
    req: &RegisterRequest,
) -> Result<Registered, ApiError> {
    let (user_id, req) = create_account(repo, req, None).await?;

    let tokens = sessions
        .issue_pair(user_id, &[Role::User.as_str().to_string()])
        .map_err(|e| {
            tracing::error!(error = %e, %user_id, "token signing failed after registration");
            ApiError::internal("registration failed")
        })?;

    Ok(Registered {
        user_id,
        name: req.name,
        email: req.email,
        tokens,
    })
}

/// login
///
/// Unknown email and wrong password produce the same 401 and roughly the same latency. An
/// account without any role assignment cannot be authorized for anything, so its login is
/// refused outright.
pub async fn login(
    repo: &dyn Repository,
    sessions: &SessionIssuer,
    req: &LoginRequest,
) -> Result<LoggedIn, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid_input("email and password required"));
    }
    let rejected = || ApiError::unauthorized("invalid credentials");

    let account = repo
        .find_account_by_email(email)
        .await
        .map_err(|e| store_failure("login failed", e))?;
    let Some(account) = account else {
        verify_against_dummy(req.password.clone()).await;
        return Err(rejected());
    };

    if !verify_password_blocking(account.password_hash.clone(), req.password.clone()).await {
        tracing::info!(user_id = %account.id, "login with wrong password");
        return Err(rejected());
    }

    let roles = repo
        .roles_for_user(account.id)
        .await
        .map_err(|e| store_failure("login failed", e))?;
    if roles.is_empty() {
        tracing::warn!(user_id = %account.id, "login refused: no roles assigned");
        return Err(rejected());
    }

    let tokens = sessions.issue_pair(account.id, &roles).map_err(|e| {
        tracing::error!(error = %e, user_id = %account.id, "token signing failed");
        ApiError::internal("failed to generate tokens")
    })?;

    tracing::info!(user_id = %account.id, "login succeeded");
    Ok(LoggedIn {
        user_id: account.id,
        name: account.name,
        email: account.email,
        roles,
        tokens,
    })
}
