use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Access/refresh pair for one authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Credential {
    pub principal_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A push-notification subscription on one remote calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct WatchChannel {
    pub channel_id: String,
    pub principal_id: String,
    pub verification_token: String,
    pub resource_id: String,
    pub calendar_id: String,
    pub sync_cursor: String,
}
