use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{ImagesRepo, Page, PageRequest, RepoError};
use crate::domain::entities::ImageRecord;

use super::SqliteRepositories;
use super::util::{convert_count, decode_ts, encode_ts, map_sqlx_error};

const IMAGE_COLUMNS: &str = "id, file_name, storage_path, size, mime_type, uploaded_at, post_id";

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: Uuid,
    file_name: String,
    storage_path: String,
    size: i64,
    mime_type: String,
    uploaded_at: String,
    post_id: Option<Uuid>,
}

impl ImageRow {
    fn into_record(self) -> Result<ImageRecord, RepoError> {
        Ok(ImageRecord {
            id: self.id,
            file_name: self.file_name,
            storage_path: self.storage_path,
            size: self.size,
            mime_type: self.mime_type,
            uploaded_at: decode_ts(&self.uploaded_at)?,
            post_id: self.post_id,
        })
    }
}

#[async_trait]
impl ImagesRepo for SqliteRepositories {
    async fn insert_image(&self, record: ImageRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO images (id, file_name, storage_path, size, mime_type, uploaded_at, \
             post_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(&record.storage_path)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(encode_ts(record.uploaded_at)?)
        .bind(record.post_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<ImageRecord>, RepoError> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ImageRow::into_record).transpose()
    }

    async fn list_images(&self, page: PageRequest) -> Result<Page<ImageRecord>, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images \
             ORDER BY uploaded_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.per_page as i64)
        .bind(page.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(ImageRow::into_record)
                .collect::<Result<_, _>>()?,
            total: convert_count(total)?,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_post_images(
        &self,
        post_id: Uuid,
        urls: &[String],
        storage_paths: &[String],
    ) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM post_images WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for url in urls {
            sqlx::query("INSERT OR IGNORE INTO post_images (post_id, url) VALUES (?, ?)")
                .bind(post_id)
                .bind(url)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        sqlx::query("UPDATE images SET post_id = NULL WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for storage_path in storage_paths {
            sqlx::query("UPDATE images SET post_id = ? WHERE storage_path = ?")
                .bind(post_id)
                .bind(storage_path)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
