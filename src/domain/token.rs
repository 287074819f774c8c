//! Single-use, time-limited deletion confirmation tokens.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const TOKEN_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub collection: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ConfirmationToken {
    pub fn issue(collection: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            collection: collection.into(),
            token: hex::encode(bytes),
            expires_at: now + Duration::seconds(TOKEN_TTL_SECS),
            consumed: false,
        }
    }

    /// Validate and consume in one step, fail-closed: anything other than an
    /// unconsumed, unexpired, matching token is rejected.
    pub fn try_consume(&mut self, supplied: &str, now: DateTime<Utc>) -> bool {
        if self.consumed || now >= self.expires_at || self.token != supplied {
            return false;
        }
        self.consumed = true;
        true
    }
}
