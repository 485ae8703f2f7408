//! The crawl loop: drives the frontier and the extractor until the site is
//! exhausted or the page budget is hit.
//!
//! Fetching is strictly sequential: crawl order determines which links are
//! discovered next, and sequential requests bound the load on the target
//! server. The loop owns nothing; frontier state is borrowed in.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use docbinder_crawler::{Frontier, FrontierStats, PageFetcher};
use docbinder_extract::ExtractRules;
use docbinder_shared::{ExtractedPage, UrlPolicy};

use crate::pipeline::ProgressReporter;

/// Crawl loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Fetching pages.
    Running,
    /// Budget reached with URLs still queued; the queue is abandoned.
    Draining,
    /// Frontier exhausted and all fetches resolved.
    Done,
}

/// Loop parameters.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Delay between consecutive fetches (not applied before the first).
    pub delay: Duration,
    /// Maximum pages to fetch (None = until the frontier empties).
    pub page_budget: Option<usize>,
}

/// What a crawl produced.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Extracted pages, in fetch order.
    pub pages: Vec<ExtractedPage>,
    /// URLs skipped after exhausting fetch retries (plus redirect duplicates).
    pub pages_skipped: usize,
    /// Frontier counters at the end of the crawl.
    pub frontier_stats: FrontierStats,
    /// Terminal state: `Done` or `Draining`.
    pub final_state: CrawlState,
}

/// Run the crawl loop to completion.
#[instrument(skip_all, fields(budget = ?opts.page_budget))]
pub async fn crawl(
    frontier: &mut Frontier,
    fetcher: &PageFetcher,
    rules: &ExtractRules,
    policy: &UrlPolicy,
    opts: &CrawlOptions,
    progress: &dyn ProgressReporter,
) -> CrawlOutcome {
    let mut pages: Vec<ExtractedPage> = Vec::new();
    let mut pages_skipped = 0usize;
    let mut first_fetch = true;

    let state = loop {
        if let Some(budget) = opts.page_budget {
            if pages.len() >= budget {
                if frontier.is_empty() {
                    break CrawlState::Done;
                }
                info!(
                    budget,
                    queued = frontier.stats().queued,
                    "page budget reached, draining queue"
                );
                break CrawlState::Draining;
            }
        }

        let Some(url) = frontier.next() else {
            break CrawlState::Done;
        };

        // A queued URL can become visited while waiting, as a redirect target.
        if frontier.is_visited(&url) {
            debug!(%url, "already visited via redirect, skipping");
            pages_skipped += 1;
            continue;
        }

        if !first_fetch && !opts.delay.is_zero() {
            tokio::time::sleep(opts.delay).await;
        }
        first_fetch = false;

        match fetcher.fetch(&url).await {
            Ok(raw) => {
                frontier.mark_visited(&url);

                let effective = raw.effective_url().clone();
                if raw.final_url.is_some() {
                    if frontier.is_visited(&effective) {
                        debug!(%url, target = %effective, "redirect target already visited, skipping");
                        pages_skipped += 1;
                        continue;
                    }
                    frontier.mark_visited(&effective);
                }

                let page = docbinder_extract::extract(&raw.raw_markup, &effective, rules, policy);

                for link in &page.discovered_links {
                    frontier.add(link.as_str(), &effective);
                }

                progress.page_fetched(effective.as_str(), pages.len() + 1, frontier.stats().queued);
                pages.push(page);
            }
            Err(e) => {
                // Stays visited so the URL is never retried this run.
                frontier.mark_visited(&url);
                warn!(%url, error = %e, "page skipped after retries");
                pages_skipped += 1;
            }
        }
    };

    let frontier_stats = frontier.stats();
    info!(
        pages = pages.len(),
        skipped = pages_skipped,
        discovered = frontier_stats.discovered,
        state = ?state,
        "crawl finished"
    );

    CrawlOutcome {
        pages,
        pages_skipped,
        frontier_stats,
        final_state: state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use docbinder_shared::RetryPolicy;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{l}\">{l}</a>"))
            .collect();
        format!("<html><body><main><h1>{title}</h1><p>Text for {title}.</p>{anchors}</main></body></html>")
    }

    async fn mount(server: &MockServer, page_path: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn components(server_uri: &str) -> (Frontier, PageFetcher, ExtractRules, UrlPolicy) {
        let base = Url::parse(server_uri).unwrap();
        let policy = UrlPolicy::new(&base, &[]);
        let frontier = Frontier::new(&base, policy.clone(), None);
        let fetcher = PageFetcher::new(
            Duration::from_secs(5),
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
        .unwrap();
        (frontier, fetcher, ExtractRules::default(), policy)
    }

    fn opts(budget: Option<usize>) -> CrawlOptions {
        CrawlOptions {
            delay: Duration::ZERO,
            page_budget: budget,
        }
    }

    #[tokio::test]
    async fn follows_links_until_frontier_empties() {
        let server = MockServer::start().await;
        mount(&server, "/", html("Root", &["/a", "/c"])).await;
        mount(&server, "/a", html("A", &["/a/b", "/", "/a"])).await;
        mount(&server, "/a/b", html("AB", &[])).await;
        mount(&server, "/c", html("C", &["/a"])).await;

        let (mut frontier, fetcher, rules, policy) = components(&server.uri());
        let outcome = crawl(
            &mut frontier,
            &fetcher,
            &rules,
            &policy,
            &opts(None),
            &SilentProgress,
        )
        .await;

        assert_eq!(outcome.final_state, CrawlState::Done);
        assert_eq!(outcome.pages.len(), 4);
        assert_eq!(outcome.pages_skipped, 0);
        // Every duplicate discovery was rejected, never re-fetched.
        assert!(outcome.frontier_stats.rejected_duplicates > 0);
        assert_eq!(outcome.frontier_stats.discovered, 4);
    }

    #[tokio::test]
    async fn budget_caps_fetches_and_drains() {
        let server = MockServer::start().await;
        // A 10-page star graph reachable from the root.
        let links: Vec<String> = (1..10).map(|i| format!("/p{i}")).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        mount(&server, "/", html("Root", &link_refs)).await;
        for link in &links {
            mount(&server, link, html(link, &[])).await;
        }

        let (mut frontier, fetcher, rules, policy) = components(&server.uri());
        let outcome = crawl(
            &mut frontier,
            &fetcher,
            &rules,
            &policy,
            &opts(Some(3)),
            &SilentProgress,
        )
        .await;

        assert_eq!(outcome.pages.len(), 3);
        assert_eq!(outcome.final_state, CrawlState::Draining);
    }

    #[tokio::test]
    async fn failed_page_is_skipped_and_not_retried() {
        let server = MockServer::start().await;
        mount(&server, "/", html("Root", &["/broken", "/ok"])).await;
        mount(&server, "/ok", html("Ok", &["/broken"])).await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2) // retry bound, then never again
            .mount(&server)
            .await;

        let (mut frontier, fetcher, rules, policy) = components(&server.uri());
        let outcome = crawl(
            &mut frontier,
            &fetcher,
            &rules,
            &policy,
            &opts(None),
            &SilentProgress,
        )
        .await;

        assert_eq!(outcome.pages.len(), 2);
        assert_eq!(outcome.pages_skipped, 1);
        assert_eq!(outcome.final_state, CrawlState::Done);
    }

    #[tokio::test]
    async fn redirect_to_visited_page_is_deduplicated() {
        let server = MockServer::start().await;
        mount(&server, "/", html("Root", &["/alias", "/real"])).await;
        mount(&server, "/real", html("Real", &[])).await;
        Mock::given(method("GET"))
            .and(path("/alias"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/real"))
            .mount(&server)
            .await;

        let (mut frontier, fetcher, rules, policy) = components(&server.uri());
        let outcome = crawl(
            &mut frontier,
            &fetcher,
            &rules,
            &policy,
            &opts(None),
            &SilentProgress,
        )
        .await;

        // Root + exactly one copy of /real.
        assert_eq!(outcome.pages.len(), 2);
        assert_eq!(outcome.pages_skipped, 1);
    }
}
