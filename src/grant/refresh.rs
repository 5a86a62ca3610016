use serde::Serialize;

use crate::{
    db::{access_token::AccessTokenTable, client::ClientTable, Database},
    error::AuthError,
    token::{
        expires_in, generate_token, now_millis, REFRESHED_ACCESS_TOKEN_TTL_SECS,
        REFRESH_TOKEN_RENEWAL_SECS, SUPERSEDED_ACCESS_TOKEN_GRACE_SECS,
    },
};

use super::AuthInfo;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshGrant {
    pub access_token: String,
    pub expires_in: i64,
}

/// Trade a refresh token for a new access token.
///
/// The refresh token keeps its value and gets its expiry pushed out. Nothing
/// stops the same refresh token from being exchanged concurrently; every
/// caller gets its own access token.
///
/// `_client` is the authenticated caller. The refresh token is not checked
/// against it; the token's own `client_id` is carried over.
pub async fn exchange_refresh_token(
    db: &dyn Database,
    _client: &ClientTable,
    refresh_token: &str,
    auth_info: &AuthInfo,
) -> Result<RefreshGrant, AuthError> {
    let stored = db
        .find_refresh_token(refresh_token)
        .await?
        .ok_or_else(|| AuthError::NoPermission("invalid refresh token".to_string()))?;

    // Expired rows stay put until the startup sweep.
    if stored.is_expired(now_millis()) {
        return Err(AuthError::Unauthorized("refresh token expired".to_string()));
    }

    if let Some(previous) = auth_info.access_token.as_deref() {
        soften_superseded_access_token(db, previous).await?;
    }

    let access_token = generate_token()?;
    db.add_access_token(&AccessTokenTable {
        token: access_token.clone(),
        user_id: stored.user_id,
        client_id: stored.client_id,
        expires: expires_in(REFRESHED_ACCESS_TOKEN_TTL_SECS),
    })
    .await?;

    db.edit_refresh_token_expires(&stored.token, expires_in(REFRESH_TOKEN_RENEWAL_SECS))
        .await?;

    Ok(RefreshGrant {
        access_token,
        expires_in: REFRESHED_ACCESS_TOKEN_TTL_SECS,
    })
}

/// Cut the superseded access token down to a short grace window instead of
/// deleting it, so other tabs still holding it keep working briefly.
///
/// An already expired token is left as is.
async fn soften_superseded_access_token(db: &dyn Database, token: &str) -> Result<(), AuthError> {
    let Some(previous) = db.find_access_token(token).await? else {
        return Ok(());
    };

    if previous.is_expired(now_millis()) {
        return Ok(());
    }

    db.edit_access_token_expires(
        &previous.token,
        expires_in(SUPERSEDED_ACCESS_TOKEN_GRACE_SECS),
    )
    .await
}
