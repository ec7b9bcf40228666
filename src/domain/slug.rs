//! Deterministic slug derivation for post URLs.
//!
//! Slugs are derived from post titles with an allow-list filter that keeps
//! ASCII alphanumerics and CJK characters verbatim, so titles like
//! “基线对齐” stay readable in the URL. Consumers provide their own
//! uniqueness predicate so the derivation itself stays pure.

use std::future::Future;

use thiserror::Error;

/// Fallback slug for titles that reduce to nothing after filtering.
const EMPTY_TITLE_SLUG: &str = "post";

/// Integer suffixes are unbounded in principle; the bound exists only so a
/// corrupted uniqueness predicate surfaces as an error instead of a spin.
const MAX_SUFFIX_ATTEMPTS: u32 = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors from generating a slug via an async uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from a title. Total: never returns an empty string.
pub fn derive_slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.trim().chars() {
        if ch.is_whitespace() || ch == '-' {
            pending_hyphen = !out.is_empty();
            continue;
        }
        if !is_slug_char(ch) {
            continue;
        }
        if pending_hyphen {
            out.push('-');
            pending_hyphen = false;
        }
        for lowered in ch.to_lowercase() {
            out.push(lowered);
        }
    }

    if out.is_empty() {
        EMPTY_TITLE_SLUG.to_string()
    } else {
        out
    }
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// `is_taken` must return `true` when the candidate already belongs to some
/// other post (callers exclude the post being renamed from that check).
/// Colliding candidates are retried with a monotonic suffix (`-1`, `-2`, …).
pub fn generate_unique_slug<F>(title: &str, mut is_taken: F) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    let base = derive_slug(title);

    if !is_taken(&base) {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}-{attempt}");
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted { base })
}

/// Async variant of [`generate_unique_slug`] that awaits the predicate.
pub async fn generate_unique_slug_async<F, Fut, E>(
    title: &str,
    mut is_taken: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(title);

    if !is_taken(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}-{attempt}");
        if !is_taken(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn is_slug_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || is_cjk(ch)
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{3400}'..='\u{4DBF}'    // CJK extension A
        | '\u{4E00}'..='\u{9FFF}'  // CJK unified ideographs
        | '\u{3040}'..='\u{309F}'  // hiragana
        | '\u{30A0}'..='\u{30FF}'  // katakana
        | '\u{AC00}'..='\u{D7AF}'  // hangul syllables
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Hello   World"), "hello-world");
        assert_eq!(derive_slug("  Rust 2024 Edition  "), "rust-2024-edition");
    }

    #[test]
    fn derive_slug_strips_punctuation_and_collapses_hyphens() {
        assert_eq!(derive_slug("C'est la vie!"), "cest-la-vie");
        assert_eq!(derive_slug("a -- b --- c"), "a-b-c");
        assert_eq!(derive_slug("--edges--"), "edges");
    }

    #[test]
    fn derive_slug_preserves_cjk() {
        assert_eq!(derive_slug("基线 对齐"), "基线-对齐");
        assert_eq!(derive_slug("Rust 入門ガイド"), "rust-入門ガイド");
    }

    #[test]
    fn derive_slug_keeps_underscore() {
        assert_eq!(derive_slug("snake_case title"), "snake_case-title");
    }

    #[test]
    fn empty_title_falls_back_to_placeholder() {
        assert_eq!(derive_slug(""), "post");
        assert_eq!(derive_slug("!!! ???"), "post");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let existing = ["hello-world".to_string(), "hello-world-1".to_string()];
        let slug = generate_unique_slug("Hello World", |candidate| {
            existing.iter().any(|s| s == candidate)
        })
        .expect("unique slug");

        assert_eq!(slug, "hello-world-2");
    }

    #[test]
    fn unique_slug_exhausts_after_bounded_attempts() {
        let result = generate_unique_slug("Example", |_| true).expect_err("should exhaust");
        assert_eq!(
            result,
            SlugError::Exhausted {
                base: "example".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unique_slug_async_consults_predicate() {
        let existing = vec!["pattern-library".to_string()];

        let slug = generate_unique_slug_async("Pattern Library", |candidate| {
            let taken = existing.contains(&candidate.to_string());
            async move { Ok::<bool, std::convert::Infallible>(taken) }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "pattern-library-1");
    }
}
