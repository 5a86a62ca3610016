use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    credentials::CredentialCheck,
    db::{client::ClientTable, Database},
    error::AuthError,
    grant::{exchange_password, exchange_refresh_token, AuthInfo},
    spam_prevention::SpamPrevention,
    token::now_millis,
};

/// A token request after grant-type parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantRequest {
    Password {
        client_id: String,
        client_secret: Option<String>,
        username: String,
        password: String,
    },
    RefreshToken {
        client_id: String,
        client_secret: Option<String>,
        refresh_token: String,
    },
}

/// Body of a successful token response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub access_tokens: usize,
    pub refresh_tokens: usize,
}

/// Remove every access and refresh token whose expiry has passed.
pub async fn sweep_expired_tokens(db: &dyn Database) -> Result<SweepSummary, AuthError> {
    let now = now_millis();
    let access_tokens = db.destroy_expired_access_tokens(now).await?;
    let refresh_tokens = db.destroy_expired_refresh_tokens(now).await?;
    Ok(SweepSummary {
        access_tokens,
        refresh_tokens,
    })
}

/// The token endpoint's grant dispatcher, built once per process.
pub struct OAuthServer {
    db: Arc<dyn Database>,
    credentials: Arc<dyn CredentialCheck>,
    spam: Arc<dyn SpamPrevention>,
}

impl OAuthServer {
    /// Build the dispatcher. Expired tokens are swept here and nowhere else,
    /// so they pile up until the next process start.
    pub async fn init(
        db: Arc<dyn Database>,
        credentials: Arc<dyn CredentialCheck>,
        spam: Arc<dyn SpamPrevention>,
    ) -> Self {
        match sweep_expired_tokens(db.as_ref()).await {
            Ok(summary) => tracing::info!(
                access_tokens = summary.access_tokens,
                refresh_tokens = summary.refresh_tokens,
                "Removed expired tokens"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to remove expired tokens"),
        }

        Self {
            db,
            credentials,
            spam,
        }
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Resolve `client_id` to a registered client. Confidential clients must
    /// also present their secret.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<ClientTable, AuthError> {
        let client = self
            .db
            .find_client_by_slug(client_id)
            .await?
            .ok_or_else(|| AuthError::NoPermission("invalid client".to_string()))?;

        if let Some(stored_hash) = client.secret_hash.as_deref() {
            let presented = client_secret.unwrap_or_default();
            if !verify_client_secret(presented, stored_hash) {
                return Err(AuthError::NoPermission("invalid client".to_string()));
            }
        }

        Ok(client)
    }

    pub async fn exchange(
        &self,
        request: GrantRequest,
        auth_info: AuthInfo,
    ) -> Result<TokenResponse, AuthError> {
        match request {
            GrantRequest::Password {
                client_id,
                client_secret,
                username,
                password,
            } => {
                if self.spam.is_locked_out(&username)? {
                    return Err(AuthError::TooManyRequests(
                        "too many failed login attempts, try again later".to_string(),
                    ));
                }

                let client = self
                    .authenticate_client(&client_id, client_secret.as_deref())
                    .await?;

                let grant = match exchange_password(
                    self.db.as_ref(),
                    self.credentials.as_ref(),
                    self.spam.as_ref(),
                    &client.slug,
                    &username,
                    &password,
                )
                .await
                {
                    Ok(grant) => grant,
                    Err(err @ AuthError::NoPermission(_)) => {
                        self.spam.record_failure(&username)?;
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                };

                tracing::debug!(client = %client.slug, "password grant issued tokens");

                Ok(TokenResponse {
                    access_token: grant.access_token,
                    refresh_token: Some(grant.refresh_token),
                    expires_in: grant.expires_in,
                    token_type: "Bearer",
                })
            }
            GrantRequest::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => {
                let client = self
                    .authenticate_client(&client_id, client_secret.as_deref())
                    .await?;

                let grant = exchange_refresh_token(
                    self.db.as_ref(),
                    &client,
                    &refresh_token,
                    &auth_info,
                )
                .await?;

                tracing::debug!(
                    client = %client.slug,
                    superseded = auth_info.access_token.is_some(),
                    "refresh grant issued access token"
                );

                Ok(TokenResponse {
                    access_token: grant.access_token,
                    refresh_token: None,
                    expires_in: grant.expires_in,
                    token_type: "Bearer",
                })
            }
        }
    }
}

/// Hex-encoded SHA-256 of a client secret, as stored in `ClientTable`.
pub fn hash_client_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn verify_client_secret(plaintext: &str, stored_hash: &str) -> bool {
    let computed = hash_client_secret(plaintext);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        credentials::{hash_password, DatabaseCredentialCheck},
        db::{
            access_token::AccessTokenTable, refresh_token::RefreshTokenTable, user::UserTable,
        },
        spam_prevention::LoginAttempts,
        token::expires_in,
    };

    const EMAIL: &str = "owner@example.com";
    const PASSWORD: &str = "Correct-Horse-1";

    async fn seeded_db() -> Arc<dyn Database> {
        let db = crate::db::memory();
        db.add_client(ClientTable::new_public("admin-app", "Admin"))
            .await
            .unwrap();
        db.add_client(ClientTable {
            secret_hash: Some(hash_client_secret("s3cret")),
            ..ClientTable::new_public("backend", "Backend")
        })
        .await
        .unwrap();
        db.add_user(UserTable {
            id: Uuid::new_v4(),
            email: EMAIL.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            status: Default::default(),
        })
        .await
        .unwrap();
        db
    }

    async fn server_with(db: Arc<dyn Database>, max_attempts: u32) -> OAuthServer {
        OAuthServer::init(
            db.clone(),
            Arc::new(DatabaseCredentialCheck::new(db)),
            Arc::new(LoginAttempts::new(max_attempts, 60)),
        )
        .await
    }

    fn password_request(client_id: &str, password: &str) -> GrantRequest {
        GrantRequest::Password {
            client_id: client_id.to_string(),
            client_secret: None,
            username: EMAIL.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_init_sweeps_only_expired_tokens() {
        let db = crate::db::memory();
        let past = now_millis() - 1_000;
        let future = expires_in(3600);
        for (value, expires) in [("a-old", past), ("a-new", future)] {
            db.add_access_token(&AccessTokenTable {
                token: value.to_string(),
                user_id: Uuid::new_v4(),
                client_id: Uuid::new_v4(),
                expires,
            })
            .await
            .unwrap();
        }
        for (value, expires) in [("r-old", past), ("r-new", future)] {
            db.add_refresh_token(&RefreshTokenTable {
                token: value.to_string(),
                user_id: Uuid::new_v4(),
                client_id: Uuid::new_v4(),
                expires,
            })
            .await
            .unwrap();
        }

        let _server = server_with(db.clone(), 5).await;

        assert!(db.find_access_token("a-old").await.unwrap().is_none());
        assert!(db.find_access_token("a-new").await.unwrap().is_some());
        assert!(db.find_refresh_token("r-old").await.unwrap().is_none());
        assert!(db.find_refresh_token("r-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_reports_counts() {
        let db = crate::db::memory();
        db.add_access_token(&AccessTokenTable {
            token: "gone".to_string(),
            user_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            expires: now_millis() - 1,
        })
        .await
        .unwrap();

        let summary = sweep_expired_tokens(db.as_ref()).await.unwrap();
        assert_eq!(
            summary,
            SweepSummary {
                access_tokens: 1,
                refresh_tokens: 0
            }
        );
    }

    #[tokio::test]
    async fn test_password_then_refresh_round_trip() {
        let server = server_with(seeded_db().await, 5).await;

        let issued = server
            .exchange(password_request("admin-app", PASSWORD), AuthInfo::default())
            .await
            .unwrap();
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);
        let refresh_token = issued.refresh_token.clone().unwrap();

        let refreshed = server
            .exchange(
                GrantRequest::RefreshToken {
                    client_id: "admin-app".to_string(),
                    client_secret: None,
                    refresh_token: refresh_token.clone(),
                },
                AuthInfo {
                    access_token: Some(issued.access_token.clone()),
                },
            )
            .await
            .unwrap();

        assert!(refreshed.refresh_token.is_none());
        assert_eq!(refreshed.expires_in, 2_628_000);
        assert_ne!(refreshed.access_token, issued.access_token);
        assert!(server
            .db()
            .find_refresh_token(&refresh_token)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_confidential_client_requires_secret() {
        let server = server_with(seeded_db().await, 5).await;

        let missing = server.authenticate_client("backend", None).await;
        assert_eq!(missing, Err(AuthError::NoPermission("invalid client".into())));

        let wrong = server.authenticate_client("backend", Some("nope")).await;
        assert!(wrong.is_err());

        let client = server
            .authenticate_client("backend", Some("s3cret"))
            .await
            .unwrap();
        assert_eq!(client.slug, "backend");
    }

    #[tokio::test]
    async fn test_unknown_client_is_rejected() {
        let server = server_with(seeded_db().await, 5).await;
        let err = server
            .exchange(password_request("unknown-app", PASSWORD), AuthInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NoPermission("invalid client".into()));
    }

    #[tokio::test]
    async fn test_repeated_bad_passwords_lock_out_username() {
        let server = server_with(seeded_db().await, 2).await;

        for _ in 0..2 {
            let err = server
                .exchange(password_request("admin-app", "wrong"), AuthInfo::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::NoPermission(_)));
        }

        let err = server
            .exchange(password_request("admin-app", PASSWORD), AuthInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TooManyRequests(_)));
    }

    #[test]
    fn test_token_response_omits_missing_refresh_token() {
        let body = serde_json::to_value(TokenResponse {
            access_token: "abc".to_string(),
            refresh_token: None,
            expires_in: 2_628_000,
            token_type: "Bearer",
        })
        .unwrap();
        assert!(body.get("refresh_token").is_none());
        assert_eq!(body["token_type"], "Bearer");
    }
}
