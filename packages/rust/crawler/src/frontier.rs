//! URL frontier: dedup, FIFO queue, and admission filtering.
//!
//! The frontier is an explicit owned state object handed to the crawl loop.
//! It exclusively owns the queue and the seen/visited sets, and it is the
//! single place where a URL can be accepted into a run.

use std::collections::{HashSet, VecDeque};

use tracing::debug;
use url::Url;

use docbinder_shared::{UrlPolicy, normalize_url};

/// A queued URL with its provenance.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Normalized absolute URL.
    pub url: Url,
    /// The page this URL was discovered on.
    pub discovered_from: Url,
    /// Admission ordinal (FIFO position over the frontier's lifetime).
    pub enqueued_at: u64,
}

/// Counters exposed by [`Frontier::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    /// URLs accepted over the frontier's lifetime (queued, in flight, or visited).
    pub discovered: usize,
    /// URLs marked visited.
    pub visited: usize,
    /// URLs still queued.
    pub queued: usize,
    /// Admissions rejected because the URL was already seen.
    pub rejected_duplicates: usize,
}

/// Discovered-but-not-yet-visited URLs plus the visited set, with admission rules.
///
/// No two accepted entries ever share the same normalized URL, so `next()`
/// can never yield the same URL twice within a run.
#[derive(Debug)]
pub struct Frontier {
    policy: UrlPolicy,
    queue: VecDeque<FrontierEntry>,
    /// Normalized URLs ever accepted (queued, in flight, or visited).
    seen: HashSet<String>,
    /// Normalized URLs marked visited.
    visited: HashSet<String>,
    page_budget: Option<usize>,
    rejected_duplicates: usize,
    next_ordinal: u64,
}

impl Frontier {
    /// Create a frontier for the site rooted at `base` and seed it with the
    /// base URL itself.
    pub fn new(base: &Url, policy: UrlPolicy, page_budget: Option<usize>) -> Self {
        let mut frontier = Self {
            policy,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
            page_budget,
            rejected_duplicates: 0,
            next_ordinal: 0,
        };
        frontier.add(base.as_str(), base);
        frontier
    }

    /// Try to admit a URL discovered on `discovered_from`.
    ///
    /// Returns `true` when the URL was queued. Rejections (duplicate,
    /// off-domain, non-document, excluded path, budget reached) are logged
    /// at debug level and return `false`.
    pub fn add(&mut self, raw: &str, discovered_from: &Url) -> bool {
        let Some(url) = self.policy.resolve(raw, discovered_from) else {
            debug!(raw, "rejected: unparsable URL reference");
            return false;
        };

        let admission = self.policy.admit(&url);
        if !admission.is_admitted() {
            debug!(%url, reason = admission.reason(), "rejected");
            return false;
        }

        let key = url.as_str().to_string();
        if self.seen.contains(&key) {
            self.rejected_duplicates += 1;
            debug!(%url, "rejected: duplicate");
            return false;
        }

        if let Some(budget) = self.page_budget {
            if self.seen.len() >= budget {
                debug!(%url, budget, "rejected: page budget reached");
                return false;
            }
        }

        self.seen.insert(key);
        self.queue.push_back(FrontierEntry {
            url,
            discovered_from: discovered_from.clone(),
            enqueued_at: self.next_ordinal,
        });
        self.next_ordinal += 1;
        true
    }

    /// Pop the oldest queued URL (FIFO). The entry moves to "in flight":
    /// still counted as seen, not yet visited.
    pub fn next(&mut self) -> Option<Url> {
        self.queue.pop_front().map(|entry| entry.url)
    }

    /// Mark a URL visited. Idempotent; also accepts URLs that were never
    /// queued (redirect targets), keeping them out of future admissions.
    pub fn mark_visited(&mut self, url: &Url) {
        let key = normalize_url(url).as_str().to_string();
        self.seen.insert(key.clone());
        self.visited.insert(key);
    }

    /// Whether a URL has already been visited this run.
    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(normalize_url(url).as_str())
    }

    /// True when no URLs remain queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshot of the frontier counters.
    pub fn stats(&self) -> FrontierStats {
        FrontierStats {
            discovered: self.seen.len(),
            visited: self.visited.len(),
            queued: self.queue.len(),
            rejected_duplicates: self.rejected_duplicates,
        }
    }
}
