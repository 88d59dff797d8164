use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Pending password reset. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    #[serde(rename = "_id")]
    pub token_hash: String,
    pub email: String,
    #[serde(rename = "expiresAt", with = "bson_datetime_as_chrono")]
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
