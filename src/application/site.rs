//! Public site surfaces rendered on request rather than on write: listing
//! pages, the archive, syndication feeds and crawler endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use askama::Template;
use futures::TryStreamExt;
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

use crate::application::error::AppError;
use crate::application::render::{
    ArchiveTemplate, ListingTemplate, MonthGroupView, RenderError, SideLinkView, format_month_label,
    post_summary, render_markdown,
};
use crate::application::repos::{
    LinksRepo, PageRequest, PostQueryFilter, PostsRepo, SettingsRepo,
};
use crate::domain::entities::PostRecord;
use crate::domain::settings::SettingsSnapshot;

const LISTING_PER_PAGE: u32 = 10;
const FEED_ITEM_LIMIT: usize = 20;

pub struct SiteService {
    posts: Arc<dyn PostsRepo>,
    links: Arc<dyn LinksRepo>,
    settings: Arc<dyn SettingsRepo>,
}

impl SiteService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        links: Arc<dyn LinksRepo>,
        settings: Arc<dyn SettingsRepo>,
    ) -> Self {
        Self { posts, links, settings }
    }

    pub async fn index_page(&self, page: u32) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let heading = settings.blog_title().to_string();
        self.listing(PostQueryFilter::default(), page, heading, "/", &settings)
            .await
    }

    pub async fn search_page(&self, query: &str, page: u32) -> Result<String, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("search query must not be empty"));
        }
        let settings = self.settings.load_settings().await?;
        let filter = PostQueryFilter {
            search: Some(query.to_string()),
            ..Default::default()
        };
        let base = format!("/search?q={}", urlencode(query));
        self.listing(filter, page, format!("Search: {query}"), &base, &settings)
            .await
    }

    pub async fn category_page(&self, name: &str, page: u32) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let filter = PostQueryFilter {
            category: Some(name.to_string()),
            ..Default::default()
        };
        let base = format!("/category/{}", urlencode(name));
        self.listing(filter, page, format!("Category: {name}"), &base, &settings)
            .await
    }

    pub async fn tag_page(&self, name: &str, page: u32) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let filter = PostQueryFilter {
            tag: Some(name.to_string()),
            ..Default::default()
        };
        let base = format!("/tags/{}", urlencode(name));
        self.listing(filter, page, format!("Tag: {name}"), &base, &settings)
            .await
    }

    async fn listing(
        &self,
        filter: PostQueryFilter,
        page: u32,
        heading: String,
        base_href: &str,
        settings: &SettingsSnapshot,
    ) -> Result<String, AppError> {
        let request = PageRequest::new(page, LISTING_PER_PAGE);
        let result = self.posts.list_visible(&filter, request).await?;
        let has_next_page =
            (result.page as u64) * (result.per_page as u64) < result.total;

        let posts = result
            .items
            .iter()
            .map(post_summary)
            .collect::<Result<Vec<_>, RenderError>>()?;

        let links = self
            .links
            .list_links()
            .await?
            .into_iter()
            .map(|link| SideLinkView { name: link.name, url: link.url })
            .collect();

        let separator = if base_href.contains('?') { '&' } else { '?' };
        let template = ListingTemplate {
            site_title: settings.blog_title().to_string(),
            site_subtitle: settings.blog_subtitle().to_string(),
            heading,
            posts,
            links,
            page: result.page,
            has_next_page,
            next_page_href: format!("{base_href}{separator}page={}", result.page.saturating_add(1)),
            year: OffsetDateTime::now_utc().year(),
        };
        Ok(template.render().map_err(RenderError::from)?)
    }

    /// All visible posts grouped by publication month, newest month first.
    pub async fn archive_page(&self) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let posts: Vec<PostRecord> = self.posts.stream_visible().try_collect().await?;

        // BTreeMap keyed by (year, month) keeps months sorted; reverse on
        // collect for newest-first output.
        let mut by_month: BTreeMap<(i32, u8), Vec<&PostRecord>> = BTreeMap::new();
        for post in &posts {
            by_month
                .entry((post.published_at.year(), post.published_at.month() as u8))
                .or_default()
                .push(post);
        }

        let mut groups = Vec::with_capacity(by_month.len());
        for (_, members) in by_month.into_iter().rev() {
            let label = format_month_label(members[0].published_at)?;
            let posts = members
                .iter()
                .map(|post| post_summary(post))
                .collect::<Result<Vec<_>, RenderError>>()?;
            groups.push(MonthGroupView { label, posts });
        }

        let template = ArchiveTemplate {
            site_title: settings.blog_title().to_string(),
            groups,
            year: OffsetDateTime::now_utc().year(),
        };
        Ok(template.render().map_err(RenderError::from)?)
    }

    /// RSS 2.0 feed over the newest visible posts.
    pub async fn feed_xml(&self) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let posts: Vec<PostRecord> = self.posts.stream_visible().try_collect().await?;
        let site_url = settings.site_url();

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<rss version=\"2.0\">\n<channel>\n");
        push_element(&mut out, "title", settings.blog_title());
        push_element(&mut out, "link", site_url);
        push_element(&mut out, "description", settings.blog_subtitle());

        for post in posts.iter().take(FEED_ITEM_LIMIT) {
            let url = format!("{site_url}/blog/{}", post.slug);
            out.push_str("<item>\n");
            push_element(&mut out, "title", &post.title);
            push_element(&mut out, "link", &url);
            push_element(&mut out, "guid", &url);
            push_element(
                &mut out,
                "pubDate",
                &post
                    .published_at
                    .format(&Rfc2822)
                    .map_err(RenderError::from)?,
            );
            push_element(&mut out, "description", &render_markdown(&post.content));
            out.push_str("</item>\n");
        }

        out.push_str("</channel>\n</rss>\n");
        Ok(out)
    }

    /// Sitemap covering the landing page and every visible post.
    pub async fn sitemap_xml(&self) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        let posts: Vec<PostRecord> = self.posts.stream_visible().try_collect().await?;
        let site_url = settings.site_url();

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

        out.push_str("<url>");
        push_element(&mut out, "loc", site_url);
        out.push_str("</url>\n");

        for post in &posts {
            out.push_str("<url>");
            push_element(&mut out, "loc", &format!("{site_url}/blog/{}", post.slug));
            push_element(
                &mut out,
                "lastmod",
                &post.updated_at.format(&Rfc3339).map_err(RenderError::from)?,
            );
            out.push_str("</url>\n");
        }

        out.push_str("</urlset>\n");
        Ok(out)
    }

    pub async fn robots_txt(&self) -> Result<String, AppError> {
        let settings = self.settings.load_settings().await?;
        Ok(format!(
            "User-agent: *\nDisallow: /api/\n\nSitemap: {}/sitemap.xml\n",
            settings.site_url()
        ))
    }
}

fn push_element(out: &mut String, name: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&xml_escape(text));
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_escape_covers_the_five_predefined_entities() {
        assert_eq!(
            xml_escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn urlencode_leaves_unreserved_characters_alone() {
        assert_eq!(urlencode("rust-web_1.0~x"), "rust-web_1.0~x");
        assert_eq!(urlencode("hello world/?"), "hello%20world%2F%3F");
        assert_eq!(urlencode("日"), "%E6%97%A5");
    }
}
