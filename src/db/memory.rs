use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::{credentials::normalize_email, error::AuthError};

use super::access_token::AccessTokenTable;
use super::client::ClientTable;
use super::refresh_token::RefreshTokenTable;
use super::user::UserTable;

fn lock_error(e: impl std::fmt::Display) -> AuthError {
    AuthError::Internal(format!("Lock error: {e}"))
}

/// In-memory database backend for local development and testing.
/// Uses `Arc<RwLock<...>>` so it can be `Clone`d across axum handlers.
#[derive(Clone)]
pub struct MemoryDb {
    clients: Arc<RwLock<HashMap<String, ClientTable>>>,
    users: Arc<RwLock<HashMap<Uuid, UserTable>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessTokenTable>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshTokenTable>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
            access_tokens: Arc::new(RwLock::new(HashMap::new())),
            refresh_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn find_client_by_slug(&self, slug: &str) -> Result<Option<ClientTable>, AuthError> {
        let clients = self.clients.read().map_err(lock_error)?;
        Ok(clients.get(slug).cloned())
    }

    pub async fn add_client(&self, client: ClientTable) -> Result<(), AuthError> {
        let mut clients = self.clients.write().map_err(lock_error)?;
        if clients.contains_key(&client.slug) {
            return Err(AuthError::Conflict("client slug already in use".to_string()));
        }
        clients.insert(client.slug.clone(), client);
        Ok(())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserTable>, AuthError> {
        let users = self.users.read().map_err(lock_error)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserTable>, AuthError> {
        let users = self.users.read().map_err(lock_error)?;
        Ok(users.get(&user_id).cloned())
    }

    pub async fn add_user(&self, mut user: UserTable) -> Result<(), AuthError> {
        user.email = normalize_email(&user.email);
        let mut users = self.users.write().map_err(lock_error)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::Conflict("email already in use".to_string()));
        }
        users.insert(user.id, user);
        Ok(())
    }

    pub async fn find_access_token(
        &self,
        token: &str,
    ) -> Result<Option<AccessTokenTable>, AuthError> {
        let tokens = self.access_tokens.read().map_err(lock_error)?;
        Ok(tokens.get(token).cloned())
    }

    pub async fn add_access_token(&self, token: &AccessTokenTable) -> Result<(), AuthError> {
        let mut tokens = self.access_tokens.write().map_err(lock_error)?;
        if tokens.contains_key(&token.token) {
            return Err(AuthError::Internal("duplicate access token value".to_string()));
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    pub async fn edit_access_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        let mut tokens = self.access_tokens.write().map_err(lock_error)?;
        let entry = tokens
            .get_mut(token)
            .ok_or_else(|| AuthError::Internal("access token not found".to_string()))?;
        entry.expires = expires;
        Ok(())
    }

    pub async fn destroy_expired_access_tokens(&self, now: i64) -> Result<usize, AuthError> {
        let mut tokens = self.access_tokens.write().map_err(lock_error)?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired(now));
        Ok(before - tokens.len())
    }

    pub async fn find_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenTable>, AuthError> {
        let tokens = self.refresh_tokens.read().map_err(lock_error)?;
        Ok(tokens.get(token).cloned())
    }

    pub async fn add_refresh_token(&self, token: &RefreshTokenTable) -> Result<(), AuthError> {
        let mut tokens = self.refresh_tokens.write().map_err(lock_error)?;
        if tokens.contains_key(&token.token) {
            return Err(AuthError::Internal("duplicate refresh token value".to_string()));
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    pub async fn edit_refresh_token_expires(
        &self,
        token: &str,
        expires: i64,
    ) -> Result<(), AuthError> {
        let mut tokens = self.refresh_tokens.write().map_err(lock_error)?;
        let entry = tokens
            .get_mut(token)
            .ok_or_else(|| AuthError::Internal("refresh token not found".to_string()))?;
        entry.expires = expires;
        Ok(())
    }

    pub async fn destroy_expired_refresh_tokens(&self, now: i64) -> Result<usize, AuthError> {
        let mut tokens = self.refresh_tokens.write().map_err(lock_error)?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired(now));
        Ok(before - tokens.len())
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}
