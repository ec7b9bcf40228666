//! Cascade plan computation.
//!
//! A plan is the complete set of slugs whose cached pages a single mutation
//! can invalidate. Plans are computed from repository state captured at the
//! right moments (for updates: neighbors before *and* after the write) and
//! executed later by the worker, in any order.

use crate::application::repos::PostNeighbors;
use crate::domain::entities::PostRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenPlan {
    /// Slug whose blob must be removed (post deletion).
    pub delete_blob: Option<String>,
    /// Slugs to regenerate, deduplicated, mutated post first.
    pub regenerate: Vec<String>,
}

impl RegenPlan {
    /// Plan for a newly created post: the post itself plus both neighbors at
    /// its timestamp. The predecessor's next-link and the successor's
    /// prev-link now point at the new post.
    pub fn for_create(post: &PostRecord, neighbors: &PostNeighbors) -> Self {
        let mut plan = Self::default();
        plan.push(&post.slug);
        for neighbor in neighbors.iter() {
            plan.push(&neighbor.slug);
        }
        plan
    }

    /// Plan for an updated post: the post plus the union of its neighbors
    /// before and after the write. A timestamp change can relocate the post
    /// anywhere in publish order, invalidating up to four other pages.
    pub fn for_update(
        post: &PostRecord,
        before: &PostNeighbors,
        after: &PostNeighbors,
    ) -> Self {
        let mut plan = Self::default();
        plan.push(&post.slug);
        for neighbor in before.iter().chain(after.iter()) {
            if neighbor.id != post.id {
                plan.push(&neighbor.slug);
            }
        }
        plan
    }

    /// Plan for a deleted post: drop its blob and regenerate the neighbors
    /// captured before deletion, whose links now skip the deleted post.
    pub fn for_delete(post: &PostRecord, neighbors_before: &PostNeighbors) -> Self {
        let mut plan = Self {
            delete_blob: Some(post.slug.clone()),
            regenerate: Vec::new(),
        };
        for neighbor in neighbors_before.iter() {
            plan.push(&neighbor.slug);
        }
        plan
    }

    /// Plan for any comment change (submission, approval, deletion): comment
    /// visibility lives only in the owning post's page, and comment changes
    /// never move publish timestamps.
    pub fn for_comment_change(post_slug: &str) -> Self {
        Self {
            delete_blob: None,
            regenerate: vec![post_slug.to_string()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete_blob.is_none() && self.regenerate.is_empty()
    }

    fn push(&mut self, slug: &str) {
        if !self.regenerate.iter().any(|s| s == slug) {
            self.regenerate.push(slug.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    fn post(slug: &str, published_at: OffsetDateTime) -> PostRecord {
        PostRecord {
            id: Uuid::new_v4(),
            title: slug.to_string(),
            slug: slug.to_string(),
            content: String::new(),
            category: None,
            tags: Vec::new(),
            published_at,
            is_published: true,
            is_draft: false,
            is_pinned: false,
            feature_image: None,
            created_at: published_at,
            updated_at: published_at,
        }
    }

    fn neighbors(prev: Option<&PostRecord>, next: Option<&PostRecord>) -> PostNeighbors {
        PostNeighbors {
            prev: prev.cloned(),
            next: next.cloned(),
        }
    }

    #[test]
    fn create_plan_covers_post_and_both_neighbors() {
        let a = post("a", datetime!(2024-01-01 00:00 UTC));
        let b = post("b", datetime!(2024-01-03 00:00 UTC));
        let fresh = post("fresh", datetime!(2024-01-02 00:00 UTC));

        let plan = RegenPlan::for_create(&fresh, &neighbors(Some(&a), Some(&b)));

        assert_eq!(plan.regenerate, vec!["fresh", "a", "b"]);
        assert!(plan.delete_blob.is_none());
    }

    #[test]
    fn create_plan_with_no_neighbors_regenerates_only_the_post() {
        let fresh = post("first", datetime!(2024-01-01 00:00 UTC));
        let plan = RegenPlan::for_create(&fresh, &PostNeighbors::default());

        assert_eq!(plan.regenerate, vec!["first"]);
    }

    #[test]
    fn update_plan_unions_old_and_new_neighbors() {
        // Moving P from between A,B to between C,D invalidates P, A, B, C, D.
        let a = post("a", datetime!(2024-01-01 00:00 UTC));
        let b = post("b", datetime!(2024-01-03 00:00 UTC));
        let c = post("c", datetime!(2024-02-01 00:00 UTC));
        let d = post("d", datetime!(2024-02-03 00:00 UTC));
        let moved = post("p", datetime!(2024-02-02 00:00 UTC));

        let plan = RegenPlan::for_update(
            &moved,
            &neighbors(Some(&a), Some(&b)),
            &neighbors(Some(&c), Some(&d)),
        );

        assert_eq!(plan.regenerate, vec!["p", "a", "b", "c", "d"]);
    }

    #[test]
    fn update_plan_deduplicates_shared_neighbors_and_excludes_self() {
        let a = post("a", datetime!(2024-01-01 00:00 UTC));
        let b = post("b", datetime!(2024-01-03 00:00 UTC));
        let subject = post("p", datetime!(2024-01-02 00:00 UTC));

        // Content-only edit: neighbors unchanged on both sides.
        let plan = RegenPlan::for_update(
            &subject,
            &neighbors(Some(&a), Some(&b)),
            &neighbors(Some(&a), Some(&b)),
        );

        assert_eq!(plan.regenerate, vec!["p", "a", "b"]);
    }

    #[test]
    fn delete_plan_drops_blob_and_regenerates_captured_neighbors() {
        let a = post("a", datetime!(2024-01-01 00:00 UTC));
        let b = post("b", datetime!(2024-01-03 00:00 UTC));
        let doomed = post("doomed", datetime!(2024-01-02 00:00 UTC));

        let plan = RegenPlan::for_delete(&doomed, &neighbors(Some(&a), Some(&b)));

        assert_eq!(plan.delete_blob.as_deref(), Some("doomed"));
        assert_eq!(plan.regenerate, vec!["a", "b"]);
    }

    #[test]
    fn delete_plan_without_neighbors_only_removes_the_blob() {
        let doomed = post("doomed", datetime!(2024-01-02 00:00 UTC));
        let plan = RegenPlan::for_delete(&doomed, &PostNeighbors::default());

        assert_eq!(plan.delete_blob.as_deref(), Some("doomed"));
        assert!(plan.regenerate.is_empty());
    }

    #[test]
    fn comment_change_touches_only_the_owning_post() {
        let plan = RegenPlan::for_comment_change("hello");
        assert_eq!(plan.regenerate, vec!["hello"]);
        assert!(plan.delete_blob.is_none());
    }
}
