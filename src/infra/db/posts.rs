use std::sync::LazyLock;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use sqlx::{QueryBuilder, Sqlite};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CategoryCount, CreatePostParams, Page, PageRequest, PostNeighbors, PostQueryFilter, PostsRepo,
    PostsWriteRepo, RepoError, TagCount, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::SqliteRepositories;
use super::util::{convert_count, decode_tags, decode_ts, encode_tags, encode_ts, map_sqlx_error};

const POST_COLUMNS: &str = "id, title, slug, content, category, tags, published_at, \
     is_published, is_draft, is_pinned, feature_image, created_at, updated_at";

const VISIBLE: &str = "is_published AND NOT is_draft";

// The stream borrows its SQL for as long as it lives, so the query text
// needs a 'static home.
static STREAM_VISIBLE_SQL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE {VISIBLE} \
         ORDER BY published_at DESC, id DESC"
    )
});

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    slug: String,
    content: String,
    category: Option<String>,
    tags: String,
    published_at: String,
    is_published: bool,
    is_draft: bool,
    is_pinned: bool,
    feature_image: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PostRow {
    fn into_record(self) -> Result<PostRecord, RepoError> {
        Ok(PostRecord {
            id: self.id,
            title: self.title,
            slug: self.slug,
            content: self.content,
            category: self.category,
            tags: decode_tags(&self.tags)?,
            published_at: decode_ts(&self.published_at)?,
            is_published: self.is_published,
            is_draft: self.is_draft,
            is_pinned: self.is_pinned,
            feature_image: self.feature_image,
            created_at: decode_ts(&self.created_at)?,
            updated_at: decode_ts(&self.updated_at)?,
        })
    }
}

fn apply_filter<'q>(qb: &mut QueryBuilder<'q, Sqlite>, filter: &'q PostQueryFilter) {
    if let Some(category) = filter.category.as_ref() {
        qb.push(" AND category = ");
        qb.push_bind(category);
    }

    if let Some(tag) = filter.tag.as_ref() {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(posts.tags) WHERE json_each.value = ");
        qb.push_bind(tag);
        qb.push(")");
    }

    if let Some(search) = filter.search.as_ref() {
        let needle = format!("%{search}%");
        qb.push(" AND (title LIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR content LIKE ");
        qb.push_bind(needle.clone());
        qb.push(" OR category LIKE ");
        qb.push_bind(needle);
        qb.push(")");
    }
}

#[async_trait]
impl PostsRepo for SqliteRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRow::into_record).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRow::into_record).transpose()
    }

    async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError> {
        let count: i64 = match exclude {
            Some(id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND id <> ?")
                    .bind(slug)
                    .bind(id)
                    .fetch_one(self.pool())
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ?")
                    .bind(slug)
                    .fetch_one(self.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(count > 0)
    }

    async fn neighbors_of(
        &self,
        published_at: OffsetDateTime,
        id: Uuid,
    ) -> Result<PostNeighbors, RepoError> {
        let at = encode_ts(published_at)?;

        // Identifiers break timestamp ties; blob comparison is bytewise and
        // therefore total.
        let prev = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE {VISIBLE} AND (published_at < ?1 OR (published_at = ?1 AND id < ?2)) \
             ORDER BY published_at DESC, id DESC LIMIT 1"
        ))
        .bind(&at)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .map(PostRow::into_record)
        .transpose()?;

        let next = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE {VISIBLE} AND (published_at > ?1 OR (published_at = ?1 AND id > ?2)) \
             ORDER BY published_at ASC, id ASC LIMIT 1"
        ))
        .bind(&at)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .map(PostRow::into_record)
        .transpose()?;

        Ok(PostNeighbors { prev, next })
    }

    async fn list_visible(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError> {
        let mut count_qb =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM posts WHERE {VISIBLE}"));
        apply_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {VISIBLE}"
        ));
        apply_filter(&mut qb, filter);
        qb.push(" ORDER BY is_pinned DESC, published_at DESC, id DESC LIMIT ");
        qb.push_bind(page.per_page as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(PostRow::into_record)
                .collect::<Result<_, _>>()?,
            total: convert_count(total)?,
            page: page.page,
            per_page: page.per_page,
        })
    }

    fn stream_visible(&self) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        let stream = sqlx::query_as::<_, PostRow>(&STREAM_VISIBLE_SQL)
            .fetch(self.pool())
            .map(|row| match row {
                Ok(row) => row.into_record(),
                Err(err) => Err(map_sqlx_error(err)),
            });

        Box::pin(stream)
    }

    async fn list_all(&self, page: PageRequest) -> Result<Page<PostRecord>, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             ORDER BY published_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(page.per_page as i64)
        .bind(page.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(PostRow::into_record)
                .collect::<Result<_, _>>()?,
            total: convert_count(total)?,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, RepoError> {
        let rows = sqlx::query_as::<_, (String, i64)>(&format!(
            "SELECT category, COUNT(*) FROM posts \
             WHERE {VISIBLE} AND category IS NOT NULL \
             GROUP BY category ORDER BY COUNT(*) DESC, category ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(name, count)| {
                Ok(CategoryCount {
                    name,
                    count: convert_count(count)?,
                })
            })
            .collect()
    }

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepoError> {
        let rows = sqlx::query_as::<_, (String, i64)>(&format!(
            "SELECT json_each.value, COUNT(*) FROM posts, json_each(posts.tags) \
             WHERE {VISIBLE} \
             GROUP BY json_each.value ORDER BY COUNT(*) DESC, json_each.value ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(name, count)| {
                Ok(TagCount {
                    name,
                    count: convert_count(count)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PostsWriteRepo for SqliteRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO posts (id, title, slug, content, category, tags, published_at, \
             is_published, is_draft, is_pinned, feature_image, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&params.title)
        .bind(&params.slug)
        .bind(&params.content)
        .bind(&params.category)
        .bind(encode_tags(&params.tags)?)
        .bind(encode_ts(params.published_at)?)
        .bind(params.is_published)
        .bind(params.is_draft)
        .bind(params.is_pinned)
        .bind(&params.feature_image)
        .bind(encode_ts(now)?)
        .bind(encode_ts(now)?)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord {
            id,
            title: params.title,
            slug: params.slug,
            content: params.content,
            category: params.category,
            tags: params.tags,
            published_at: params.published_at,
            is_published: params.is_published,
            is_draft: params.is_draft,
            is_pinned: params.is_pinned,
            feature_image: params.feature_image,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();

        let result = sqlx::query(
            "UPDATE posts SET title = ?, slug = ?, content = ?, category = ?, tags = ?, \
             published_at = ?, is_published = ?, is_draft = ?, is_pinned = ?, \
             feature_image = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&params.title)
        .bind(&params.slug)
        .bind(&params.content)
        .bind(&params.category)
        .bind(encode_tags(&params.tags)?)
        .bind(encode_ts(params.published_at)?)
        .bind(params.is_published)
        .bind(params.is_draft)
        .bind(params.is_pinned)
        .bind(&params.feature_image)
        .bind(encode_ts(now)?)
        .bind(params.id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.find_by_id(params.id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
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
