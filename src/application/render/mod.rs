//! Static page rendering.
//!
//! `render_post_page` is a pure function: a post plus its neighbors, its
//! approved comments and a settings snapshot always produce byte-identical
//! HTML. The one wall-clock dependency, the copyright year in the footer, is
//! passed in explicitly by the caller.

use askama::Template;
use comrak::{Options, markdown_to_html};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::settings::SettingsSnapshot;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
pub const MONTH_LABEL_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [year]");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
    #[error("date formatting failed: {0}")]
    DateFormat(#[from] time::error::Format),
}

/// Everything a post page is a function of.
#[derive(Debug)]
pub struct PostPageContext<'a> {
    pub post: &'a PostRecord,
    pub prev: Option<&'a PostRecord>,
    pub next: Option<&'a PostRecord>,
    pub comments: &'a [CommentRecord],
    pub settings: &'a SettingsSnapshot,
    pub year: i32,
}

/// Convert Markdown to HTML. Raw HTML in the source is escaped, not passed
/// through.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.render.escape = true;
    markdown_to_html(markdown, &options)
}

pub fn format_human_date(at: OffsetDateTime) -> Result<String, RenderError> {
    Ok(at.format(HUMAN_DATE_FORMAT)?)
}

pub fn format_month_label(at: OffsetDateTime) -> Result<String, RenderError> {
    Ok(at.format(MONTH_LABEL_FORMAT)?)
}

#[derive(Debug, Clone)]
pub struct NavLinkView {
    pub href: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub author: String,
    pub content_html: String,
    pub published: String,
    pub reply_to: Option<String>,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostPageTemplate {
    site_title: String,
    site_subtitle: String,
    site_url: String,
    footer_copy: String,
    title: String,
    slug: String,
    published: String,
    body_html: String,
    category: Option<String>,
    tags: Vec<String>,
    feature_image: String,
    prev: Option<NavLinkView>,
    next: Option<NavLinkView>,
    comments: Vec<CommentView>,
    year: i32,
}

/// Render the complete, self-contained HTML document for a post.
pub fn render_post_page(ctx: &PostPageContext<'_>) -> Result<String, RenderError> {
    let nav_link = |post: &PostRecord| NavLinkView {
        href: format!("/blog/{}", post.slug),
        title: post.title.clone(),
    };

    let comments = ctx
        .comments
        .iter()
        .map(|comment| {
            Ok(CommentView {
                author: comment.author.clone(),
                // Comment bodies are sanitized at submission time.
                content_html: comment.content.clone(),
                published: format_human_date(comment.created_at)?,
                reply_to: comment.reply_to.clone(),
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;

    let feature_image = ctx
        .post
        .feature_image
        .clone()
        .unwrap_or_else(|| ctx.settings.default_feature_image().to_string());

    let template = PostPageTemplate {
        site_title: ctx.settings.blog_title().to_string(),
        site_subtitle: ctx.settings.blog_subtitle().to_string(),
        site_url: ctx.settings.site_url().to_string(),
        footer_copy: ctx.settings.footer_copy().to_string(),
        title: ctx.post.title.clone(),
        slug: ctx.post.slug.clone(),
        published: format_human_date(ctx.post.published_at)?,
        body_html: render_markdown(&ctx.post.content),
        category: ctx.post.category.clone(),
        tags: ctx.post.tags.clone(),
        feature_image,
        prev: ctx.prev.map(nav_link),
        next: ctx.next.map(nav_link),
        comments,
        year: ctx.year,
    };

    Ok(template.render()?)
}

#[derive(Debug, Clone)]
pub struct PostSummaryView {
    pub href: String,
    pub title: String,
    pub published: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SideLinkView {
    pub name: String,
    pub url: String,
}

#[derive(Template)]
#[template(path = "listing.html")]
pub struct ListingTemplate {
    pub site_title: String,
    pub site_subtitle: String,
    pub heading: String,
    pub posts: Vec<PostSummaryView>,
    pub links: Vec<SideLinkView>,
    pub page: u32,
    pub has_next_page: bool,
    pub next_page_href: String,
    pub year: i32,
}

#[derive(Debug, Clone)]
pub struct MonthGroupView {
    pub label: String,
    pub posts: Vec<PostSummaryView>,
}

#[derive(Template)]
#[template(path = "archive.html")]
pub struct ArchiveTemplate {
    pub site_title: String,
    pub groups: Vec<MonthGroupView>,
    pub year: i32,
}

pub fn post_summary(post: &PostRecord) -> Result<PostSummaryView, RenderError> {
    Ok(PostSummaryView {
        href: format!("/blog/{}", post.slug),
        title: post.title.clone(),
        published: format_human_date(post.published_at)?,
        category: post.category.clone(),
        tags: post.tags.clone(),
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    fn post(title: &str, slug: &str) -> PostRecord {
        PostRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: slug.to_string(),
            content: "# Heading\n\nSome *body* text.".to_string(),
            category: Some("notes".to_string()),
            tags: vec!["rust".to_string(), "web".to_string()],
            published_at: datetime!(2024-03-10 12:00 UTC),
            is_published: true,
            is_draft: false,
            is_pinned: false,
            feature_image: None,
            created_at: datetime!(2024-03-10 12:00 UTC),
            updated_at: datetime!(2024-03-10 12:00 UTC),
        }
    }

    fn context<'a>(
        post: &'a PostRecord,
        prev: Option<&'a PostRecord>,
        next: Option<&'a PostRecord>,
        settings: &'a SettingsSnapshot,
    ) -> PostPageContext<'a> {
        PostPageContext {
            post,
            prev,
            next,
            comments: &[],
            settings,
            year: 2024,
        }
    }

    #[test]
    fn markdown_escapes_raw_html() {
        let html = render_markdown("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn same_inputs_render_identical_bytes() {
        let post = post("Hello", "hello");
        let settings = SettingsSnapshot::default();
        let ctx = context(&post, None, None, &settings);

        let first = render_post_page(&ctx).expect("render");
        let second = render_post_page(&ctx).expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn neighbor_links_appear_when_present_and_are_omitted_when_absent() {
        let subject = post("Middle", "middle");
        let older = post("Older", "older");
        let newer = post("Newer", "newer");
        let settings = SettingsSnapshot::default();

        let with_neighbors =
            render_post_page(&context(&subject, Some(&older), Some(&newer), &settings))
                .expect("render");
        assert!(with_neighbors.contains("/blog/older"));
        assert!(with_neighbors.contains("/blog/newer"));

        let alone = render_post_page(&context(&subject, None, None, &settings)).expect("render");
        assert!(!alone.contains("/blog/older"));
        assert!(!alone.contains("/blog/newer"));
    }

    #[test]
    fn approved_comments_render_with_reply_names() {
        let subject = post("Hello", "hello");
        let settings = SettingsSnapshot::default();
        let comments = vec![CommentRecord {
            id: Uuid::new_v4(),
            post_id: subject.id,
            author: "ada".to_string(),
            email: None,
            content: "nice write-up".to_string(),
            ip: "192.0.2.1".to_string(),
            created_at: datetime!(2024-03-11 09:00 UTC),
            is_approved: true,
            parent_id: Some(Uuid::new_v4()),
            reply_to: Some("grace".to_string()),
        }];

        let ctx = PostPageContext {
            post: &subject,
            prev: None,
            next: None,
            comments: &comments,
            settings: &settings,
            year: 2024,
        };

        let html = render_post_page(&ctx).expect("render");
        assert!(html.contains("ada"));
        assert!(html.contains("nice write-up"));
        assert!(html.contains("grace"));
    }

    #[test]
    fn feature_image_falls_back_to_site_default() {
        let subject = post("Hello", "hello");
        let settings = SettingsSnapshot::default();
        let html =
            render_post_page(&context(&subject, None, None, &settings)).expect("render");
        assert!(html.contains(settings.default_feature_image()));
    }
}
