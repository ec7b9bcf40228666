use async_trait::async_trait;

use crate::application::repos::{RepoError, SettingsRepo};
use crate::domain::settings::SettingsSnapshot;

use super::SqliteRepositories;
use super::util::map_sqlx_error;

#[async_trait]
impl SettingsRepo for SqliteRepositories {
    async fn load_settings(&self) -> Result<SettingsSnapshot, RepoError> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().collect())
    }

    async fn upsert_settings(&self, entries: &[(String, String)]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES (?, ?) \
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
