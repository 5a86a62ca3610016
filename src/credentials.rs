use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;

use crate::{
    db::{
        user::{UserStatus, UserTable},
        Database,
    },
    error::AuthError,
};

/// Verified against when the email is unknown, so both paths cost one Argon2 run.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

const INVALID_CREDENTIALS: &str = "invalid email or password";

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
}

/// Returns `Ok(false)` on a mismatch; errors only for an unparseable stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Internal(format!("invalid password hash in db: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Normalize a username for lookups and lockout bookkeeping.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Verifies end-user credentials for the password grant.
#[async_trait]
pub trait CredentialCheck: Send + Sync {
    /// Resolve the user owning `email` if `password` matches, or fail with the
    /// credential error to hand back to the client.
    async fn check(&self, email: &str, password: &str) -> Result<UserTable, AuthError>;
}

/// Checks credentials against the users stored in the [`Database`].
pub struct DatabaseCredentialCheck {
    db: Arc<dyn Database>,
}

impl DatabaseCredentialCheck {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialCheck for DatabaseCredentialCheck {
    async fn check(&self, email: &str, password: &str) -> Result<UserTable, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::NoPermission(INVALID_CREDENTIALS.to_string()));
        }

        let user = match self.db.find_user_by_email(&normalize_email(email)).await? {
            Some(user) => user,
            None => {
                let _ = verify_password(password, DUMMY_PASSWORD_HASH);
                return Err(AuthError::NoPermission(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::NoPermission(INVALID_CREDENTIALS.to_string()));
        }

        let status = user.status;
        match status {
            UserStatus::Active => Ok(user),
            UserStatus::Locked => Err(AuthError::NoPermission("account is locked".to_string())),
            UserStatus::Inactive => Err(AuthError::NoPermission("account is inactive".to_string())),
        }
    }
}
