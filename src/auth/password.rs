use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("could not gather salt entropy: {0}")]
    Entropy(String),
    #[error("could not hash password: {0}")]
    Hash(String),
    #[error("hashing task aborted: {0}")]
    Task(String),
}

/// Produces a salted Argon2 digest in PHC string format with the default work factor.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| PasswordError::Entropy(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Constant-time check of `password` against a stored PHC string. A corrupt or foreign
/// hash is indistinguishable from a wrong password.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hashing is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

pub async fn verify_password_blocking(hash: String, password: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .unwrap_or(false)
}

static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("restro-timing-equalizer").ok());

/// Burns one verification against a throwaway hash so a login for an unknown email costs
/// about as much as one with a wrong password. Always returns false. The first call also
/// builds the throwaway hash, so all of it runs on the blocking pool.
pub async fn verify_against_dummy(password: String) -> bool {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_ref() {
            verify_password(hash, &password);
        }
    })
    .await;
    false
}
