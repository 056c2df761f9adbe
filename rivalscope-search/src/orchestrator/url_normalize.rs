//! Domain normalisation for candidate deduplication.
//!
//! Canonicalises result URLs to a bare host so that equivalent sites
//! (differing only in scheme, `www.` prefix, capitalisation, port, path
//! or trailing dot) compare as equal.

use url::Url;

/// Normalise a URL (or bare host) to its deduplication domain.
///
/// Applies the following transformations:
///
/// 1. Assume `http://` when no scheme is present.
/// 2. Keep only the host; path, query, fragment and port are dropped.
/// 3. Lowercase the host and strip a trailing dot.
/// 4. Strip a leading `www.`.
///
/// Returns `None` when no host can be extracted.
///
/// # Examples
///
/// ```
/// use rivalscope_search::orchestrator::url_normalize::normalize_domain;
///
/// assert_eq!(normalize_domain("https://WWW.Example.COM/about/").as_deref(), Some("example.com"));
/// assert_eq!(normalize_domain("example.com/").as_deref(), Some("example.com"));
/// ```
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("http://{trimmed}")).ok()?
    };

    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_owned())
}

/// Whether `domain` equals `parent` or is one of its sub-domains.
///
/// Both arguments are expected to be normalised already.
pub fn is_same_site(domain: &str, parent: &str) -> bool {
    domain == parent
        || domain
            .strip_suffix(parent)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
