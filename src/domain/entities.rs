//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub is_published: bool,
    pub is_draft: bool,
    pub is_pinned: bool,
    pub feature_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PostRecord {
    /// A post participates in public listings, neighbor computation and the
    /// blob cache only when it is published and not a draft.
    pub fn is_visible(&self) -> bool {
        self.is_published && !self.is_draft
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: String,
    pub email: Option<String>,
    pub content: String,
    pub ip: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_approved: bool,
    pub parent_id: Option<Uuid>,
    /// Cached author name of the parent comment, resolved at submission time.
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub file_name: String,
    pub storage_path: String,
    pub size: i64,
    pub mime_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRecord {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlacklistEntry {
    pub id: Uuid,
    pub ip_pattern: String,
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl BlacklistEntry {
    /// Whether `ip` matches this entry at the given instant. Patterns are
    /// exact addresses or prefixes ending in `*` (for example `10.0.*`).
    pub fn matches(&self, ip: &str, now: OffsetDateTime) -> bool {
        if let Some(expires_at) = self.expires_at
            && expires_at <= now
        {
            return false;
        }

        match self.ip_pattern.strip_suffix('*') {
            Some(prefix) => ip.starts_with(prefix),
            None => ip == self.ip_pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiteStatistics {
    pub posts: u64,
    pub published_posts: u64,
    pub comments: u64,
    pub pending_comments: u64,
    pub images: u64,
    pub total_views: u64,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn entry(pattern: &str, expires_at: Option<OffsetDateTime>) -> BlacklistEntry {
        BlacklistEntry {
            id: Uuid::new_v4(),
            ip_pattern: pattern.to_string(),
            reason: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
            expires_at,
        }
    }

    #[test]
    fn exact_pattern_matches_only_that_address() {
        let entry = entry("192.0.2.7", None);
        let now = datetime!(2024-06-01 00:00 UTC);

        assert!(entry.matches("192.0.2.7", now));
        assert!(!entry.matches("192.0.2.70", now));
    }

    #[test]
    fn wildcard_pattern_matches_prefix() {
        let entry = entry("10.0.*", None);
        let now = datetime!(2024-06-01 00:00 UTC);

        assert!(entry.matches("10.0.3.4", now));
        assert!(!entry.matches("10.10.3.4", now));
    }

    #[test]
    fn expired_entry_no_longer_matches() {
        let entry = entry("192.0.2.7", Some(datetime!(2024-02-01 00:00 UTC)));

        assert!(entry.matches("192.0.2.7", datetime!(2024-01-15 00:00 UTC)));
        assert!(!entry.matches("192.0.2.7", datetime!(2024-03-01 00:00 UTC)));
    }
}
