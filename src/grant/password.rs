use serde::Serialize;

use crate::{
    credentials::CredentialCheck,
    db::{access_token::AccessTokenTable, refresh_token::RefreshTokenTable, Database},
    error::AuthError,
    spam_prevention::SpamPrevention,
    token::{
        expires_in, generate_token, PASSWORD_ACCESS_TOKEN_TTL_SECS,
        PASSWORD_REFRESH_TOKEN_TTL_SECS,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PasswordGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Trade a client slug plus user credentials for a fresh access/refresh pair.
///
/// The access token is written before the refresh token. If the second write
/// fails the access token stays behind and the error is returned.
pub async fn exchange_password(
    db: &dyn Database,
    credentials: &dyn CredentialCheck,
    spam: &dyn SpamPrevention,
    client_slug: &str,
    username: &str,
    password: &str,
) -> Result<PasswordGrant, AuthError> {
    let client = db
        .find_client_by_slug(client_slug)
        .await?
        .ok_or_else(|| AuthError::NoPermission("invalid client".to_string()))?;

    let user = credentials.check(username, password).await?;

    let access_token = generate_token()?;
    let refresh_token = generate_token()?;

    db.add_access_token(&AccessTokenTable {
        token: access_token.clone(),
        user_id: user.id,
        client_id: client.id,
        expires: expires_in(PASSWORD_ACCESS_TOKEN_TTL_SECS),
    })
    .await?;

    db.add_refresh_token(&RefreshTokenTable {
        token: refresh_token.clone(),
        user_id: user.id,
        client_id: client.id,
        expires: expires_in(PASSWORD_REFRESH_TOKEN_TTL_SECS),
    })
    .await?;

    spam.reset_counter(username)?;

    Ok(PasswordGrant {
        access_token,
        refresh_token,
        expires_in: PASSWORD_ACCESS_TOKEN_TTL_SECS,
    })
}
