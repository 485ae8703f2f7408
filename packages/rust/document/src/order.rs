//! Hierarchical page ordering.
//!
//! Pages are linearized by a key derived from their URL path: the home page
//! first, then depth-first through the path hierarchy with siblings in
//! alphabetical segment order. Comparison is lexicographic over the segment
//! sequence, so a parent path (a strict prefix) always sorts immediately
//! before its descendants.

use url::Url;

use docbinder_shared::ExtractedPage;

/// Path values treated as the site root for ordering purposes.
const INDEX_MARKERS: &[&str] = &["index", "index.html", "index.htm", "home"];

/// Sort key for a page: its path segments paired with their depth index.
/// The empty key is the home page and sorts before everything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    segments: Vec<(usize, String)>,
}

impl OrderKey {
    /// Build a key from a URL's path. With `fold_case`, segments are
    /// lowercased so ordering ignores case.
    pub fn from_url(url: &Url, fold_case: bool) -> Self {
        Self::from_path(url.path(), fold_case)
    }

    /// Build a key from a raw path string.
    pub fn from_path(path: &str, fold_case: bool) -> Self {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() || INDEX_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            return Self {
                segments: Vec::new(),
            };
        }

        let segments = trimmed
            .split('/')
            .enumerate()
            .map(|(depth, seg)| {
                let seg = if fold_case {
                    seg.to_lowercase()
                } else {
                    seg.to_string()
                };
                (depth, seg)
            })
            .collect();

        Self { segments }
    }

    /// True for the home/index page key.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of path segments (0 for the home page).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True when `other` is a strict path extension of `self`.
    pub fn is_ancestor_of(&self, other: &OrderKey) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

/// A page paired with its sort key.
#[derive(Debug, Clone)]
pub struct OrderedPage {
    pub page: ExtractedPage,
    pub order_key: OrderKey,
}

/// Sort pages into document order. Stable; ties cannot occur because the
/// frontier guarantees URL uniqueness.
pub fn sort_pages(pages: Vec<ExtractedPage>, fold_case: bool) -> Vec<OrderedPage> {
    let mut ordered: Vec<OrderedPage> = pages
        .into_iter()
        .map(|page| {
            let order_key = OrderKey::from_url(&page.url, fold_case);
            OrderedPage { page, order_key }
        })
        .collect();

    ordered.sort_by(|a, b| a.order_key.cmp(&b.order_key));
    ordered
}
