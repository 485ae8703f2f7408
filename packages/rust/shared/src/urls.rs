//! URL normalization and admission policy.
//!
//! The same policy is applied by the frontier (when admitting URLs) and by
//! the extractor (when filtering discovered links), so the rules are derived
//! exactly once per run.

use regex::Regex;
use url::Url;

/// Path extensions that never point at a crawlable document.
const SKIP_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".json", ".xml",
    ".zip", ".tar", ".gz", ".pdf", ".mp4", ".webm", ".woff", ".woff2",
];

/// Why a URL was not admitted, for rejection logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The URL passed every filter.
    Admitted,
    /// Scheme is not http/https.
    BadScheme,
    /// Host differs from the target host.
    OffHost,
    /// Path ends in a non-document extension.
    NonDocument,
    /// Path matches a configured exclusion pattern.
    ExcludedPath,
}

impl Admission {
    /// True when the URL passed every filter.
    pub fn is_admitted(self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Short reason string for logs.
    pub fn reason(self) -> &'static str {
        match self {
            Admission::Admitted => "admitted",
            Admission::BadScheme => "non-http scheme",
            Admission::OffHost => "off-domain host",
            Admission::NonDocument => "non-document extension",
            Admission::ExcludedPath => "excluded path",
        }
    }
}

/// Admission filter for a single target site.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    host: String,
    exclude_patterns: Vec<Regex>,
}

impl UrlPolicy {
    /// Build a policy for the site rooted at `base`.
    ///
    /// `exclude_globs` are glob-like path patterns (`/api/**`) compiled to
    /// anchored regexes; unparsable patterns are dropped.
    pub fn new(base: &Url, exclude_globs: &[String]) -> Self {
        Self {
            host: base.host_str().unwrap_or("").to_string(),
            exclude_patterns: exclude_globs.iter().filter_map(|p| glob_to_regex(p)).collect(),
        }
    }

    /// Resolve `raw` against `referrer` and normalize it.
    ///
    /// Returns `None` when the reference cannot be parsed as a URL at all.
    pub fn resolve(&self, raw: &str, referrer: &Url) -> Option<Url> {
        let joined = referrer.join(raw.trim()).ok()?;
        Some(normalize_url(&joined))
    }

    /// Check a normalized URL against the admission filters.
    pub fn admit(&self, url: &Url) -> Admission {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Admission::BadScheme;
        }
        if url.host_str().unwrap_or("") != self.host {
            return Admission::OffHost;
        }

        let path = url.path().to_ascii_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return Admission::NonDocument;
        }
        if self.exclude_patterns.iter().any(|p| p.is_match(&path)) {
            return Admission::ExcludedPath;
        }

        Admission::Admitted
    }
}

/// Normalize a URL for deduplication: strip the fragment and the trailing
/// slash (except for the root path). The `url` crate already lowercases
/// scheme and host on parse, which makes this idempotent.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    if normalized.path().len() > 1 && normalized.path().ends_with('/') {
        let trimmed = normalized.path().trim_end_matches('/').to_string();
        normalized.set_path(&trimmed);
    }
    normalized
}

/// True when `raw` is a fragment-only reference (`#section`).
pub fn is_fragment_only(raw: &str) -> bool {
    raw.trim_start().starts_with('#')
}

/// Convert a glob-like path pattern to an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}
