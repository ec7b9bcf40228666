use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{LinksRepo, RepoError, UpsertLinkParams};
use crate::domain::entities::LinkRecord;

use super::SqliteRepositories;
use super::util::{decode_ts, encode_ts, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    name: String,
    url: String,
    description: Option<String>,
    sort_order: i32,
    created_at: String,
}

impl LinkRow {
    fn into_record(self) -> Result<LinkRecord, RepoError> {
        Ok(LinkRecord {
            id: self.id,
            name: self.name,
            url: self.url,
            description: self.description,
            sort_order: self.sort_order,
            created_at: decode_ts(&self.created_at)?,
        })
    }
}

#[async_trait]
impl LinksRepo for SqliteRepositories {
    async fn list_links(&self) -> Result<Vec<LinkRecord>, RepoError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT id, name, url, description, sort_order, created_at FROM links \
             ORDER BY sort_order ASC, name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(LinkRow::into_record).collect()
    }

    async fn insert_link(&self, params: UpsertLinkParams) -> Result<LinkRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO links (id, name, url, description, sort_order, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&params.name)
        .bind(&params.url)
        .bind(&params.description)
        .bind(params.sort_order)
        .bind(encode_ts(now)?)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(LinkRecord {
            id,
            name: params.name,
            url: params.url,
            description: params.description,
            sort_order: params.sort_order,
            created_at: now,
        })
    }

    async fn update_link(
        &self,
        id: Uuid,
        params: UpsertLinkParams,
    ) -> Result<LinkRecord, RepoError> {
        let result = sqlx::query(
            "UPDATE links SET name = ?, url = ?, description = ?, sort_order = ? WHERE id = ?",
        )
        .bind(&params.name)
        .bind(&params.url)
        .bind(&params.description)
        .bind(params.sort_order)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        let row = sqlx::query_as::<_, LinkRow>(
            "SELECT id, name, url, description, sort_order, created_at FROM links WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.into_record()
    }

    async fn delete_link(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
