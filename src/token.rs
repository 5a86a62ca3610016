use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use crate::error::AuthError;

pub const ONE_HOUR_SECS: i64 = 60 * 60;
pub const ONE_WEEK_SECS: i64 = 7 * 24 * ONE_HOUR_SECS;
/// A twelfth of a year.
pub const ONE_MONTH_SECS: i64 = 2_628_000;
pub const SIX_MONTHS_SECS: i64 = 6 * ONE_MONTH_SECS;
pub const FIVE_MINUTES_SECS: i64 = 5 * 60;

/// Lifetime of the access token issued by the password grant.
pub const PASSWORD_ACCESS_TOKEN_TTL_SECS: i64 = ONE_HOUR_SECS;
/// Lifetime of the refresh token issued by the password grant.
pub const PASSWORD_REFRESH_TOKEN_TTL_SECS: i64 = ONE_WEEK_SECS;
/// Lifetime of the access token issued by the refresh grant.
pub const REFRESHED_ACCESS_TOKEN_TTL_SECS: i64 = ONE_MONTH_SECS;
/// How far a refresh token's expiry is pushed out each time it is used.
pub const REFRESH_TOKEN_RENEWAL_SECS: i64 = SIX_MONTHS_SECS;
/// Remaining validity of an access token superseded by a refresh.
pub const SUPERSEDED_ACCESS_TOKEN_GRACE_SECS: i64 = FIVE_MINUTES_SECS;

/// Current time as a Unix timestamp in milliseconds, the unit of every
/// stored `expires` field.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Expiry timestamp (milliseconds) `secs` seconds from now.
pub fn expires_in(secs: i64) -> i64 {
    now_millis() + secs * 1000
}

/// Generate an opaque token value from 256 bits of OS randomness.
pub fn generate_token() -> Result<String, AuthError> {
    let mut token_bytes = [0u8; 32];
    getrandom::fill(&mut token_bytes)
        .map_err(|e| AuthError::Internal(format!("Failed to generate token: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(token_bytes))
}
