use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Long-lived credential used only to mint new access tokens. The value is
/// never rotated; each use pushes `expires` (Unix milliseconds) further out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenTable {
    pub token: String,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub expires: i64,
}

impl RefreshTokenTable {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires <= now
    }
}
