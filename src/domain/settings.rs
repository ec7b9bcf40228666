//! Site settings snapshot.
//!
//! Settings live in an open-ended key/value table. Rendering takes an
//! explicit snapshot of that table rather than reading ambient global state,
//! so the renderer stays a pure function of its inputs.

use std::collections::BTreeMap;

pub mod keys {
    pub const SITE_URL: &str = "site_url";
    pub const BLOG_TITLE: &str = "blog_title";
    pub const BLOG_SUBTITLE: &str = "blog_subtitle";
    pub const DEFAULT_FEATURE_IMAGE: &str = "default_feature_image";
    pub const FOOTER_COPY: &str = "footer_copy";
}

const DEFAULT_BLOG_TITLE: &str = "Lamina";
const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_FEATURE_IMAGE: &str = "/static/banner.png";

/// Immutable view of the settings table taken at render or request time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSnapshot {
    values: BTreeMap<String, String>,
}

impl SettingsSnapshot {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn blog_title(&self) -> &str {
        self.get(keys::BLOG_TITLE).unwrap_or(DEFAULT_BLOG_TITLE)
    }

    pub fn blog_subtitle(&self) -> &str {
        self.get(keys::BLOG_SUBTITLE).unwrap_or_default()
    }

    /// Base URL without a trailing slash.
    pub fn site_url(&self) -> &str {
        self.get(keys::SITE_URL)
            .unwrap_or(DEFAULT_SITE_URL)
            .trim_end_matches('/')
    }

    /// Banner used when a post has no feature image of its own.
    pub fn default_feature_image(&self) -> &str {
        self.get(keys::DEFAULT_FEATURE_IMAGE)
            .unwrap_or(DEFAULT_FEATURE_IMAGE)
    }

    pub fn footer_copy(&self) -> &str {
        self.get(keys::FOOTER_COPY).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for SettingsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_for_missing_keys() {
        let snapshot = SettingsSnapshot::default();

        assert_eq!(snapshot.blog_title(), DEFAULT_BLOG_TITLE);
        assert_eq!(snapshot.blog_subtitle(), "");
        assert_eq!(snapshot.site_url(), DEFAULT_SITE_URL);
        assert_eq!(snapshot.default_feature_image(), DEFAULT_FEATURE_IMAGE);
    }

    #[test]
    fn site_url_drops_trailing_slash() {
        let snapshot: SettingsSnapshot =
            [(keys::SITE_URL.to_string(), "https://blog.example/".to_string())]
                .into_iter()
                .collect();

        assert_eq!(snapshot.site_url(), "https://blog.example");
    }
}
