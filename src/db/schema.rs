//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `credentials` table (one row per authenticated principal)
/// - `watch_channels` table (one row per (principal, calendar) subscription)
///
/// Webhook authentication reads a channel by its primary key and then compares
/// the verification token and resource handle, so no extra index is needed.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    principal_id TEXT PRIMARY KEY NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL DEFAULT '',
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS watch_channels (
    channel_id TEXT PRIMARY KEY NOT NULL,
    principal_id TEXT NOT NULL,
    verification_token TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    calendar_id TEXT NOT NULL,
    sync_cursor TEXT NOT NULL DEFAULT '', -- empty: full resync required
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_watch_channels_principal ON watch_channels(principal_id);
"#;
