//! Canonical identity keys for recipe records.
//!
//! A record has three independent identity axes: its source URL, its slug and
//! its title. Each is reduced to a comparison-safe key here. An empty key means
//! "no identity on this axis" and never matches anything.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::model::Recipe;

/// Slug used when a URL has no usable path segment
pub const FALLBACK_SLUG: &str = "ricetta";

/// The three identity keys of one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IdentityKeys {
    pub url_key: String,
    pub slug_key: String,
    pub title_key: String,
}

impl IdentityKeys {
    pub fn is_empty(&self) -> bool {
        self.url_key.is_empty() && self.slug_key.is_empty() && self.title_key.is_empty()
    }
}

/// Lower-case, strip diacritics, replace punctuation with spaces and collapse
/// whitespace.
///
/// Diacritics are removed through canonical decomposition (NFD) so the result
/// does not depend on the locale.
pub fn normalize_text(s: &str) -> String {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for a source URL: lower-cased host without `www.`, path
/// without the trailing slash, and the query string. Scheme and fragment are
/// ignored. Path and query keep their case.
///
/// Returns an empty key for anything that does not parse as a URL with a host.
pub fn normalize_url(raw: &str) -> String {
    let Some(url) = parse_lenient(raw) else {
        return String::new();
    };
    let Some(host) = url.host_str() else {
        return String::new();
    };

    let host = host.to_lowercase();
    let host = host.trim_start_matches("www.");
    let path = url.path().trim_end_matches('/');
    let mut key = format!("{host}{path}");
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// Final non-empty path segment of `url` with any `.htm`/`.html` extension
/// removed. Falls back to [`FALLBACK_SLUG`].
pub fn slug_from_url(url: &str) -> String {
    url_slug(url).unwrap_or_else(|| FALLBACK_SLUG.to_string())
}

fn url_slug(raw: &str) -> Option<String> {
    let url = parse_lenient(raw)?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;

    let lower = segment.to_ascii_lowercase();
    let stem = if lower.ends_with(".html") {
        &segment[..segment.len() - 5]
    } else if lower.ends_with(".htm") {
        &segment[..segment.len() - 4]
    } else {
        segment
    };

    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Scraped URLs sometimes come without a scheme ("www.site.it/ricetta").
fn parse_lenient(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}")).ok(),
        Err(_) => None,
    }
}

/// Compute all three identity keys for a record.
///
/// The slug key comes from the explicit `slug` when present, otherwise from the
/// source URL. The fallback slug is never used as a key, since every URL
/// without a path would otherwise collide on it.
pub fn identity_keys(record: &Recipe) -> IdentityKeys {
    let url = record.source_url.as_deref().unwrap_or_default();

    let slug_key = match record.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => normalize_text(slug),
        _ => url_slug(url)
            .map(|slug| normalize_text(&slug))
            .unwrap_or_default(),
    };

    IdentityKeys {
        url_key: normalize_url(url),
        slug_key,
        title_key: normalize_text(&record.title),
    }
}
