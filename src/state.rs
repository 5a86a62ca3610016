use std::sync::Arc;

use crate::{
    config::{Backend, Config},
    credentials::DatabaseCredentialCheck,
    db::{self, client::ClientTable, Database},
    error::AuthError,
    oauth::OAuthServer,
    spam_prevention::LoginAttempts,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub oauth: Arc<OAuthServer>,
}

impl AppState {
    pub async fn new(config: &Config) -> Self {
        let db = match config.backend {
            Backend::Memory => {
                tracing::info!("Using in-memory database backend");
                let db = db::memory();
                if let Err(e) = seed_default_client(db.as_ref(), &config.default_client_slug).await
                {
                    tracing::warn!(error = %e, "Failed to seed default client");
                }
                db
            }
            Backend::Dynamo => {
                tracing::info!("Using DynamoDB database backend");
                db::dynamo(config).await
            }
        };

        Self::with_database(db, config).await
    }

    /// Wire the token service around an existing store. Runs the expired
    /// token sweep.
    pub async fn with_database(db: Arc<dyn Database>, config: &Config) -> Self {
        let credentials = Arc::new(DatabaseCredentialCheck::new(db.clone()));
        let spam = Arc::new(LoginAttempts::new(
            config.login_max_attempts,
            config.login_lockout_seconds,
        ));
        let oauth = OAuthServer::init(db.clone(), credentials, spam).await;

        Self {
            db,
            oauth: Arc::new(oauth),
        }
    }
}

async fn seed_default_client(db: &dyn Database, slug: &str) -> Result<(), AuthError> {
    db.add_client(ClientTable::new_public(slug, "Default client"))
        .await?;
    tracing::info!(client = slug, "Registered default client");
    Ok(())
}
