//! Core domain types for the crawl → extract → order → assemble pipeline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single bind run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// RawPage
// ---------------------------------------------------------------------------

/// A fetched page before extraction. Owned transiently by the crawl loop
/// and dropped once the extractor consumes it.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL that was requested (frontier identity).
    pub url: Url,
    /// Final URL after redirects, when it differs from `url`.
    pub final_url: Option<Url>,
    /// Raw response body.
    pub raw_markup: String,
    /// HTTP status code of the final response.
    pub http_status: u16,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    /// The URL extraction should resolve relative references against.
    pub fn effective_url(&self) -> &Url {
        self.final_url.as_ref().unwrap_or(&self.url)
    }
}

// ---------------------------------------------------------------------------
// Content tree
// ---------------------------------------------------------------------------

/// A reference to an image discovered during extraction. The payload is
/// fetched later by the assembler, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Absolute source URI of the image.
    pub source: Url,
    /// Alt text, possibly empty.
    pub alt: String,
}

/// A node in the extracted content tree.
///
/// This is a typed tree independent of any parsing library's node types:
/// exclusion matching and assembly operate on these variants only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    /// A retained markup element with its children.
    Element {
        tag: String,
        classes: Vec<String>,
        id: Option<String>,
        children: Vec<ContentNode>,
    },
    /// A run of text.
    Text(String),
    /// Placeholder for an image; `index` points into
    /// [`ExtractedPage::image_refs`]. Resolved by the assembler.
    Image { index: usize },
    /// A hyperlink; children carry its label (text, nested images).
    Link {
        href: String,
        children: Vec<ContentNode>,
    },
    /// Replacement for an embedded video: a label plus the watch URL.
    VideoLink { label: String, url: String },
}

impl ContentNode {
    /// Collect the plain text of this subtree, space-separated.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            ContentNode::Text(t) => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(t);
            }
            ContentNode::Element { children, .. } | ContentNode::Link { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
            ContentNode::VideoLink { label, .. } => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(label);
            }
            ContentNode::Image { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// ExtractedPage
// ---------------------------------------------------------------------------

/// A page after extraction: clean content tree, discovered links, and
/// image references awaiting resolution.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// Canonical page URL (final URL after redirects).
    pub url: Url,
    /// Page title. Never empty; falls back to the URL path.
    pub title: String,
    /// The content fragment, free of chrome and embedded-video nodes.
    pub content: Vec<ContentNode>,
    /// Absolute, admission-filtered links found in the content region.
    pub discovered_links: Vec<Url>,
    /// Images referenced by the content, in document order.
    pub image_refs: Vec<ImageRef>,
    /// True when extraction fell back to the degraded text-only record.
    pub degraded: bool,
}

impl ExtractedPage {
    /// Approximate word count of the page text.
    pub fn word_count(&self) -> usize {
        self.content
            .iter()
            .map(|n| n.plain_text().split_whitespace().count())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Final accounting for a bind run: what was produced, skipped, degraded.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique identifier for this run.
    pub run_id: RunId,
    /// Pages successfully fetched and included in the document.
    pub pages_fetched: usize,
    /// Pages skipped after exhausting fetch retries.
    pub pages_skipped: usize,
    /// URLs rejected by the frontier as duplicates.
    pub duplicates_rejected: usize,
    /// Pages that fell back to degraded extraction.
    pub pages_degraded: usize,
    /// Images fetched and embedded in the document.
    pub images_embedded: usize,
    /// Images replaced by an alt-text link after a failed fetch.
    pub images_failed: usize,
    /// Whether the text-only fallback rendering was used.
    pub used_fallback_render: bool,
    /// Output file size in bytes.
    pub output_bytes: usize,
    /// Total run duration in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    /// Total recoverable degradations across all stages.
    pub fn degrade_count(&self) -> usize {
        self.pages_skipped + self.pages_degraded + self.images_failed
    }
}

/// Convert a [`Duration`] to whole milliseconds for summary reporting.
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
