use crate::db::models::{Credential, WatchChannel};
use crate::db::schema::SQLITE_INIT;
use crate::error::CalpushError;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use subtle::ConstantTimeEq;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, CalpushError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), CalpushError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert or refresh the credential handed over by the authorization flow.
    /// An empty refresh token keeps the stored one.
    pub async fn upsert_credential(&self, cred: &Credential) -> Result<(), CalpushError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO credentials (
                principal_id, access_token, refresh_token, expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(principal_id) DO UPDATE SET
                access_token=excluded.access_token,
                refresh_token=COALESCE(NULLIF(excluded.refresh_token, ''), credentials.refresh_token),
                expires_at=excluded.expires_at,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&cred.principal_id)
        .bind(&cred.access_token)
        .bind(&cred.refresh_token)
        .bind(cred.expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CalpushError::Persistence)?;
        Ok(())
    }

    pub async fn get_credential(
        &self,
        principal_id: &str,
    ) -> Result<Option<Credential>, CalpushError> {
        let cred = sqlx::query_as::<_, Credential>(
            r#"SELECT principal_id, access_token, refresh_token, expires_at
               FROM credentials WHERE principal_id = ?"#,
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cred)
    }

    /// Persist a rotated credential. An empty refresh token keeps the stored one.
    pub async fn update_credential(&self, cred: &Credential) -> Result<(), CalpushError> {
        let result = sqlx::query(
            r#"UPDATE credentials SET
                access_token = ?,
                refresh_token = COALESCE(NULLIF(?, ''), refresh_token),
                expires_at = ?,
                updated_at = ?
              WHERE principal_id = ?"#,
        )
        .bind(&cred.access_token)
        .bind(&cred.refresh_token)
        .bind(cred.expires_at)
        .bind(Utc::now())
        .bind(&cred.principal_id)
        .execute(&self.pool)
        .await
        .map_err(CalpushError::Persistence)?;

        if result.rows_affected() == 0 {
            return Err(CalpushError::UserNotFound(cred.principal_id.clone()));
        }
        Ok(())
    }

    /// Upsert by channel id. Re-registration replaces the verification token,
    /// resource handle and cursor; owner and calendar stay as first recorded.
    pub async fn upsert_channel(&self, channel: &WatchChannel) -> Result<(), CalpushError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO watch_channels (
                channel_id, principal_id, verification_token, resource_id,
                calendar_id, sync_cursor, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                verification_token=excluded.verification_token,
                resource_id=excluded.resource_id,
                sync_cursor=excluded.sync_cursor,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&channel.channel_id)
        .bind(&channel.principal_id)
        .bind(&channel.verification_token)
        .bind(&channel.resource_id)
        .bind(&channel.calendar_id)
        .bind(&channel.sync_cursor)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CalpushError::Persistence)?;
        Ok(())
    }

    pub async fn get_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<WatchChannel>, CalpushError> {
        let channel = sqlx::query_as::<_, WatchChannel>(
            r#"SELECT channel_id, principal_id, verification_token, resource_id,
               calendar_id, sync_cursor
               FROM watch_channels WHERE channel_id = ?"#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    /// Exact-match lookup on (channel id, verification token, resource handle).
    /// A record matching the id alone is reported the same as no record.
    pub async fn find_channel(
        &self,
        channel_id: &str,
        verification_token: &str,
        resource_id: &str,
    ) -> Result<Option<WatchChannel>, CalpushError> {
        let Some(channel) = self.get_channel(channel_id).await? else {
            return Ok(None);
        };
        let token_matches = channel
            .verification_token
            .as_bytes()
            .ct_eq(verification_token.as_bytes());
        let resource_matches = channel.resource_id.as_bytes().ct_eq(resource_id.as_bytes());
        Ok(bool::from(token_matches & resource_matches).then_some(channel))
    }

    pub async fn update_sync_cursor(
        &self,
        channel_id: &str,
        sync_cursor: &str,
    ) -> Result<(), CalpushError> {
        let result = sqlx::query(
            "UPDATE watch_channels SET sync_cursor = ?, updated_at = ? WHERE channel_id = ?",
        )
        .bind(sync_cursor)
        .bind(Utc::now())
        .bind(channel_id)
        .execute(&self.pool)
        .await
        .map_err(CalpushError::Persistence)?;

        if result.rows_affected() == 0 {
            return Err(CalpushError::ChannelNotFound);
        }
        Ok(())
    }
}
