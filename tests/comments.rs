//! Comment submission rules: ordering of checks, rate limiting and the
//! effect of moderation on cached pages.

mod support;

use std::time::Duration;

use lamina::application::comments::{RateLimitPolicy, SubmitCommentCommand};
use lamina::application::error::AppError;
use lamina::application::repos::NewCommentParams;
use time::OffsetDateTime;
use time::macros::datetime;

use support::TestApp;

fn comment(slug: &str, ip: &str, content: &str) -> SubmitCommentCommand {
    SubmitCommentCommand {
        post_slug: slug.to_string(),
        author: "ada".to_string(),
        email: None,
        content: content.to_string(),
        ip: ip.to_string(),
        parent_id: None,
    }
}

#[tokio::test]
async fn submission_stores_an_unapproved_comment() {
    let app = TestApp::new().await;
    let post = app.publish_post("Hello", datetime!(2024-01-01 12:00 UTC)).await;

    let stored = app
        .state
        .comments
        .submit(comment(&post.slug, "192.0.2.1", "first!"))
        .await
        .expect("submit");
    app.drain().await;

    assert!(!stored.is_approved);
    // Unapproved comments never appear on the page.
    let page = app.page_html(&post.slug).await.expect("page");
    assert!(!page.contains("first!"));
}

#[tokio::test]
async fn approving_a_comment_regenerates_the_page() {
    let app = TestApp::new().await;
    let post = app.publish_post("Hello", datetime!(2024-01-01 12:00 UTC)).await;

    let stored = app
        .state
        .comments
        .submit(comment(&post.slug, "192.0.2.1", "nice piece"))
        .await
        .expect("submit");
    app.drain().await;

    app.state
        .comments
        .set_approved(stored.id, true)
        .await
        .expect("approve");
    app.drain().await;

    let page = app.page_html(&post.slug).await.expect("page");
    assert!(page.contains("nice piece"));

    app.state
        .comments
        .delete(stored.id)
        .await
        .expect("delete");
    app.drain().await;

    let page = app.page_html(&post.slug).await.expect("page");
    assert!(!page.contains("nice piece"));
}

#[tokio::test]
async fn fourth_comment_in_the_window_is_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitPolicy {
        window: Duration::from_secs(60),
        max_comments: 3,
    })
    .await;
    let post = app.publish_post("Busy", datetime!(2024-01-01 12:00 UTC)).await;

    for n in 0..3 {
        app.state
            .comments
            .submit(comment(&post.slug, "198.51.100.7", &format!("msg {n}")))
            .await
            .expect("submit");
    }

    let err = app
        .state
        .comments
        .submit(comment(&post.slug, "198.51.100.7", "one too many"))
        .await
        .expect_err("must be limited");
    assert!(matches!(err, AppError::RateLimited { .. }));

    // A different address is unaffected.
    app.state
        .comments
        .submit(comment(&post.slug, "198.51.100.8", "hello"))
        .await
        .expect("other ip");
}

#[tokio::test]
async fn blacklisted_address_is_rejected_before_validation() {
    let app = TestApp::new().await;
    let post = app.publish_post("Guarded", datetime!(2024-01-01 12:00 UTC)).await;

    app.state
        .blacklist_repo
        .insert_entry("203.0.113.*".to_string(), None, None)
        .await
        .expect("insert entry");

    // Empty content would normally fail validation; the blacklist wins.
    let mut command = comment(&post.slug, "203.0.113.9", "");
    command.author = String::new();
    let err = app
        .state
        .comments
        .submit(command)
        .await
        .expect_err("must be forbidden");
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn replies_resolve_the_parent_author() {
    let app = TestApp::new().await;
    let post = app.publish_post("Thread", datetime!(2024-01-01 12:00 UTC)).await;

    let parent = app
        .state
        .comments
        .submit(SubmitCommentCommand {
            author: "grace".to_string(),
            ..comment(&post.slug, "192.0.2.1", "root comment")
        })
        .await
        .expect("parent");

    let reply = app
        .state
        .comments
        .submit(SubmitCommentCommand {
            parent_id: Some(parent.id),
            ..comment(&post.slug, "192.0.2.2", "replying")
        })
        .await
        .expect("reply");

    assert_eq!(reply.parent_id, Some(parent.id));
    assert_eq!(reply.reply_to.as_deref(), Some("grace"));
}

#[tokio::test]
async fn reply_to_a_comment_on_another_post_is_rejected() {
    let app = TestApp::new().await;
    let first = app.publish_post("First", datetime!(2024-01-01 12:00 UTC)).await;
    let second = app.publish_post("Second", datetime!(2024-01-02 12:00 UTC)).await;

    let parent = app
        .state
        .comments
        .submit(comment(&first.slug, "192.0.2.1", "on first"))
        .await
        .expect("parent");

    let err = app
        .state
        .comments
        .submit(SubmitCommentCommand {
            parent_id: Some(parent.id),
            ..comment(&second.slug, "192.0.2.2", "crossed wires")
        })
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn raw_html_in_comments_is_sanitized_before_storage() {
    let app = TestApp::new().await;
    let post = app.publish_post("Safe", datetime!(2024-01-01 12:00 UTC)).await;

    let stored = app
        .state
        .comments
        .submit(comment(
            &post.slug,
            "192.0.2.1",
            "hi <script>alert(1)</script> there",
        ))
        .await
        .expect("submit");

    assert!(!stored.content.contains("<script>"));
    assert!(stored.content.contains("hi"));
}

#[tokio::test]
async fn rate_limit_clears_once_the_window_has_passed() {
    let app = TestApp::with_rate_limit(RateLimitPolicy {
        window: Duration::from_secs(60),
        max_comments: 3,
    })
    .await;
    let post = app.publish_post("Busy", datetime!(2024-01-01 12:00 UTC)).await;

    // Three earlier comments from the same address, all outside the window.
    let stale = OffsetDateTime::now_utc() - Duration::from_secs(120);
    for n in 0..3 {
        app.state
            .comments_repo
            .insert_comment(NewCommentParams {
                post_id: post.id,
                author: "ada".to_string(),
                email: None,
                content: format!("earlier {n}"),
                ip: "198.51.100.7".to_string(),
                created_at: stale,
                parent_id: None,
                reply_to: None,
            })
            .await
            .expect("insert backdated comment");
    }

    app.state
        .comments
        .submit(comment(&post.slug, "198.51.100.7", "fresh"))
        .await
        .expect("old comments no longer count against the limit");
}

#[tokio::test]
async fn drafts_do_not_accept_comments() {
    let app = TestApp::new().await;

    let draft = app
        .state
        .posts
        .create(lamina::application::posts::CreatePostCommand {
            title: "Unfinished".to_string(),
            content: "wip".to_string(),
            category: None,
            tags: Vec::new(),
            published_at: None,
            is_published: Some(true),
            is_draft: Some(true),
            is_pinned: None,
            feature_image: None,
        })
        .await
        .expect("create draft");
    app.drain().await;

    let err = app
        .state
        .comments
        .submit(comment(&draft.slug, "192.0.2.1", "sneak preview"))
        .await
        .expect_err("drafts have no public page");
    assert!(matches!(err, AppError::NotFound(_)));
}
