use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, StatsRepo};
use crate::domain::entities::SiteStatistics;

use super::SqliteRepositories;
use super::util::{convert_count, encode_ts, map_sqlx_error};

#[async_trait]
impl StatsRepo for SqliteRepositories {
    async fn record_view(
        &self,
        post_id: Uuid,
        ip: &str,
        viewed_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("INSERT INTO post_views_log (id, post_id, ip, viewed_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4())
            .bind(post_id)
            .bind(ip)
            .bind(encode_ts(viewed_at)?)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO post_views (post_id, view_count) VALUES (?, 1) \
             ON CONFLICT (post_id) DO UPDATE SET view_count = view_count + 1",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn statistics(&self) -> Result<SiteStatistics, RepoError> {
        let (posts, published_posts): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN is_published AND NOT is_draft THEN 1 ELSE 0 END), 0) \
             FROM posts",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let (comments, pending_comments): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN is_approved THEN 0 ELSE 1 END), 0) \
             FROM comments",
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total_views: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(view_count), 0) FROM post_views")
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(SiteStatistics {
            posts: convert_count(posts)?,
            published_posts: convert_count(published_posts)?,
            comments: convert_count(comments)?,
            pending_comments: convert_count(pending_comments)?,
            images: convert_count(images)?,
            total_views: convert_count(total_views)?,
        })
    }
}
