use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, NewCommentParams, Page, PageRequest, RepoError,
};
use crate::domain::entities::CommentRecord;

use super::SqliteRepositories;
use super::util::{convert_count, decode_ts, encode_ts, map_sqlx_error};

const COMMENT_COLUMNS: &str =
    "id, post_id, author, email, content, ip, created_at, is_approved, parent_id, reply_to";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author: String,
    email: Option<String>,
    content: String,
    ip: String,
    created_at: String,
    is_approved: bool,
    parent_id: Option<Uuid>,
    reply_to: Option<String>,
}

impl CommentRow {
    fn into_record(self) -> Result<CommentRecord, RepoError> {
        Ok(CommentRecord {
            id: self.id,
            post_id: self.post_id,
            author: self.author,
            email: self.email,
            content: self.content,
            ip: self.ip,
            created_at: decode_ts(&self.created_at)?,
            is_approved: self.is_approved,
            parent_id: self.parent_id,
            reply_to: self.reply_to,
        })
    }
}

#[async_trait]
impl CommentsRepo for SqliteRepositories {
    async fn insert_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO comments (id, post_id, author, email, content, ip, created_at, \
             is_approved, parent_id, reply_to) VALUES (?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?)",
        )
        .bind(id)
        .bind(params.post_id)
        .bind(&params.author)
        .bind(&params.email)
        .bind(&params.content)
        .bind(&params.ip)
        .bind(encode_ts(params.created_at)?)
        .bind(params.parent_id)
        .bind(&params.reply_to)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentRecord {
            id,
            post_id: params.post_id,
            author: params.author,
            email: params.email,
            content: params.content,
            ip: params.ip,
            created_at: params.created_at,
            is_approved: false,
            parent_id: params.parent_id,
            reply_to: params.reply_to,
        })
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CommentRow::into_record).transpose()
    }

    async fn list_approved_for_post(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE post_id = ? AND is_approved ORDER BY created_at ASC, id ASC"
        ))
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CommentRow::into_record).collect()
    }

    async fn list_comments(
        &self,
        approved: Option<bool>,
        page: PageRequest,
    ) -> Result<Page<CommentRecord>, RepoError> {
        let (where_clause, bind_approved) = match approved {
            Some(value) => ("WHERE is_approved = ?", Some(value)),
            None => ("", None),
        };

        let count_sql = format!("SELECT COUNT(*) FROM comments {where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(value) = bind_approved {
            count_query = count_query.bind(value);
        }
        let total = count_query
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let list_sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut list_query = sqlx::query_as::<_, CommentRow>(&list_sql);
        if let Some(value) = bind_approved {
            list_query = list_query.bind(value);
        }
        let rows = list_query
            .bind(page.per_page as i64)
            .bind(page.offset())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(CommentRow::into_record)
                .collect::<Result<_, _>>()?,
            total: convert_count(total)?,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn count_from_ip_since(
        &self,
        ip: &str,
        since: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE ip = ? AND created_at >= ?",
        )
        .bind(ip)
        .bind(encode_ts(since)?)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn set_approved(&self, id: Uuid, approved: bool) -> Result<CommentRecord, RepoError> {
        let result = sqlx::query("UPDATE comments SET is_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.find_comment(id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
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
