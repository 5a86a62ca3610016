use std::env;

/// Which storage backend the service runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Dynamo,
}

/// Runtime configuration, read once at startup from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub clients_table: String,
    pub users_table: String,
    pub users_email_index: String,
    pub access_tokens_table: String,
    pub refresh_tokens_table: String,
    /// Failed password grants allowed per username before lockout.
    pub login_max_attempts: u32,
    pub login_lockout_seconds: i64,
    /// Public client registered when running on the memory backend.
    pub default_client_slug: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Dynamo,
            clients_table: "ClientsTable".to_string(),
            users_table: "UsersTable".to_string(),
            users_email_index: "emailIndex".to_string(),
            access_tokens_table: "AccessTokensTable".to_string(),
            refresh_tokens_table: "RefreshTokensTable".to_string(),
            login_max_attempts: 5,
            login_lockout_seconds: 60 * 60,
            default_client_slug: "admin-app".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let backend = match lookup("DATABASE_BACKEND").as_deref() {
            Some("memory") => Backend::Memory,
            _ => defaults.backend,
        };

        let login_max_attempts = lookup("LOGIN_MAX_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.login_max_attempts);
        let login_lockout_seconds = lookup("LOGIN_LOCKOUT_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.login_lockout_seconds);

        Self {
            backend,
            clients_table: string("CLIENTS_TABLE_NAME", defaults.clients_table),
            users_table: string("USERS_TABLE_NAME", defaults.users_table),
            users_email_index: string("USERS_TABLE_EMAIL_INDEX_NAME", defaults.users_email_index),
            access_tokens_table: string("ACCESS_TOKENS_TABLE_NAME", defaults.access_tokens_table),
            refresh_tokens_table: string(
                "REFRESH_TOKENS_TABLE_NAME",
                defaults.refresh_tokens_table,
            ),
            login_max_attempts,
            login_lockout_seconds,
            default_client_slug: string("DEFAULT_CLIENT_SLUG", defaults.default_client_slug),
        }
    }
}
