use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer credential for API calls. `expires` is in Unix milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenTable {
    pub token: String,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub expires: i64,
}

impl AccessTokenTable {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires <= now
    }
}
