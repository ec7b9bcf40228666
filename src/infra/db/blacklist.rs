use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{BlacklistRepo, RepoError};
use crate::domain::entities::BlacklistEntry;

use super::SqliteRepositories;
use super::util::{decode_ts, decode_ts_opt, encode_ts, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BlacklistRow {
    id: Uuid,
    ip_pattern: String,
    reason: Option<String>,
    created_at: String,
    expires_at: Option<String>,
}

impl BlacklistRow {
    fn into_entry(self) -> Result<BlacklistEntry, RepoError> {
        Ok(BlacklistEntry {
            id: self.id,
            ip_pattern: self.ip_pattern,
            reason: self.reason,
            created_at: decode_ts(&self.created_at)?,
            expires_at: decode_ts_opt(self.expires_at.as_deref())?,
        })
    }
}

#[async_trait]
impl BlacklistRepo for SqliteRepositories {
    async fn list_entries(&self) -> Result<Vec<BlacklistEntry>, RepoError> {
        let rows = sqlx::query_as::<_, BlacklistRow>(
            "SELECT id, ip_pattern, reason, created_at, expires_at FROM ip_blacklist \
             ORDER BY created_at DESC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(BlacklistRow::into_entry).collect()
    }

    async fn insert_entry(
        &self,
        ip_pattern: String,
        reason: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<BlacklistEntry, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO ip_blacklist (id, ip_pattern, reason, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&ip_pattern)
        .bind(&reason)
        .bind(encode_ts(now)?)
        .bind(expires_at.map(encode_ts).transpose()?)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(BlacklistEntry {
            id,
            ip_pattern,
            reason,
            created_at: now,
            expires_at,
        })
    }

    async fn delete_entry(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM ip_blacklist WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    // Wildcard patterns make this a scan. The table is expected to stay
    // small; matching in Rust keeps the pattern rules in one place.
    async fn is_blacklisted(&self, ip: &str, now: OffsetDateTime) -> Result<bool, RepoError> {
        let entries = self.list_entries().await?;
        Ok(entries.iter().any(|entry| entry.matches(ip, now)))
    }
}
