//! Token exchanges for the `password` and `refresh_token` grants.
//!
//! Each exchange runs its store operations one after another and stops at the
//! first failure. Writes that already landed are not rolled back.

pub mod password;
pub mod refresh;

pub use password::{exchange_password, PasswordGrant};
pub use refresh::{exchange_refresh_token, RefreshGrant};

/// Per-request context handed to an exchange alongside the grant parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthInfo {
    /// Access token presented with the request, i.e. the one a refresh is
    /// about to supersede.
    pub access_token: Option<String>,
}
