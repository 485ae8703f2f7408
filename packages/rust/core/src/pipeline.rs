//! End-to-end `bind` pipeline: URL → crawl → order → assemble → render → file.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use docbinder_crawler::{Frontier, PageFetcher};
use docbinder_document::{
    AssembleOptions, ImageCache, ImageOptions, Renderer, assemble, render_document, sort_pages,
};
use docbinder_extract::ExtractRules;
use docbinder_shared::{
    BindConfig, BinderError, Result, RunId, RunSummary, UrlPolicy, duration_ms,
};

use crate::crawl::{CrawlOptions, crawl};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page fetch during the crawl.
    fn page_fetched(&self, url: &str, fetched: usize, queued: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _fetched: usize, _queued: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full bind pipeline.
///
/// 1. Crawl the site (frontier + extractor, sequential)
/// 2. Order pages by path hierarchy
/// 3. Assemble the document (concurrent image resolution, TOC)
/// 4. Render (with text-only fallback) and write the output file
///
/// Recoverable failures (skipped pages, degraded extractions, failed
/// images, fallback rendering) are accounted in the returned summary;
/// only an empty crawl or an unwritable output is a hard error.
#[instrument(skip_all, fields(url = %config.base_url))]
pub async fn bind(
    config: &BindConfig,
    renderer: &dyn Renderer,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = RunId::new();

    config.validate()?;
    info!(%run_id, url = %config.base_url, output = %config.output_path.display(), "starting bind run");

    let policy = UrlPolicy::new(&config.base_url, &config.exclude_patterns);
    let mut frontier = Frontier::new(&config.base_url, policy.clone(), config.page_budget);
    let fetcher = PageFetcher::new(config.timeout, config.retry.clone())?;
    let rules = ExtractRules::from_lists(&config.excluded_selectors, &config.content_selectors);

    // --- Phase 1: Crawl ---
    progress.phase("Crawling site");
    let crawl_opts = CrawlOptions {
        delay: config.delay,
        page_budget: config.page_budget,
    };
    let outcome = crawl(
        &mut frontier,
        &fetcher,
        &rules,
        &policy,
        &crawl_opts,
        progress,
    )
    .await;

    if outcome.pages.is_empty() {
        return Err(BinderError::validation(
            "no pages could be fetched from the site",
        ));
    }

    let pages_degraded = outcome.pages.iter().filter(|p| p.degraded).count();

    // --- Phase 2: Order ---
    progress.phase("Ordering pages");
    let ordered = sort_pages(outcome.pages, config.case_insensitive_order);

    // --- Phase 3: Assemble ---
    progress.phase("Assembling document");
    let cache = Arc::new(ImageCache::new(ImageOptions {
        max_edge_px: config.image_max_edge_px,
        max_bytes: config.image_max_bytes,
        concurrency: config.image_concurrency,
        timeout: config.timeout,
        retry: config.retry.clone(),
    })?);
    let assemble_opts = AssembleOptions {
        site_title: config.site_title.clone(),
        source_url: config.base_url.to_string(),
        generated_at: Utc::now(),
    };
    let document = assemble(&ordered, &assemble_opts, cache).await;

    // --- Phase 4: Render and write ---
    progress.phase("Rendering document");
    let rendered = render_document(&document, renderer)?;

    std::fs::write(&config.output_path, &rendered.bytes)
        .map_err(|e| BinderError::io(&config.output_path, e))?;

    let summary = RunSummary {
        run_id,
        pages_fetched: ordered.len(),
        pages_skipped: outcome.pages_skipped,
        duplicates_rejected: outcome.frontier_stats.rejected_duplicates,
        pages_degraded,
        images_embedded: document.images_embedded,
        images_failed: document.images_failed,
        used_fallback_render: rendered.used_fallback,
        output_bytes: rendered.bytes.len(),
        duration_ms: duration_ms(start.elapsed()),
    };

    progress.done(&summary);
    info!(
        run_id = %summary.run_id,
        pages = summary.pages_fetched,
        skipped = summary.pages_skipped,
        degraded = summary.pages_degraded,
        images_embedded = summary.images_embedded,
        images_failed = summary.images_failed,
        elapsed_ms = summary.duration_ms,
        "bind run complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use docbinder_document::PassthroughRenderer;
    use docbinder_shared::{AppConfig, RetryPolicy};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_output(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docbinder-test-{}-{name}", uuid_suffix()))
    }

    fn uuid_suffix() -> String {
        docbinder_shared::RunId::new().to_string()
    }

    fn config(server_uri: &str, output: PathBuf) -> BindConfig {
        let mut config =
            BindConfig::from_app_config(&AppConfig::default(), Url::parse(server_uri).unwrap());
        config.output_path = output;
        config.delay = Duration::ZERO;
        config.retry = RetryPolicy::new(2, Duration::from_millis(1));
        config
    }

    async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn binds_a_small_site_end_to_end() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><h1>Home</h1><p>Welcome.</p>
               <a href="/guide">Guide</a><a href="/api">API</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/guide",
            r#"<html><body><main><h1>Guide</h1><p>How to.</p></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/api",
            r#"<html><body><main><h1>API</h1><p>Reference.</p></main></body></html>"#,
        )
        .await;

        let output = temp_output("e2e.html");
        let config = config(&server.uri(), output.clone());

        let summary = bind(&config, &PassthroughRenderer, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.pages_skipped, 0);
        assert!(!summary.used_fallback_render);

        let written = std::fs::read_to_string(&output).unwrap();
        // Ordered: home first, then alphabetical siblings.
        let home = written.find("<h1 class=\"page-title\">Home</h1>").unwrap();
        let api = written.find("<h1 class=\"page-title\">API</h1>").unwrap();
        let guide = written.find("<h1 class=\"page-title\">Guide</h1>").unwrap();
        assert!(home < api && api < guide);
        assert!(written.contains("Table of Contents"));

        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn budget_bounds_document_sections() {
        let server = MockServer::start().await;
        let links: Vec<String> = (1..10).map(|i| format!("/p{i}")).collect();
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{l}\">{l}</a>"))
            .collect();
        mount_page(
            &server,
            "/",
            &format!("<html><body><main><h1>Root</h1>{anchors}</main></body></html>"),
        )
        .await;
        for link in &links {
            mount_page(
                &server,
                link,
                &format!("<html><body><main><h1>{link}</h1></main></body></html>"),
            )
            .await;
        }

        let output = temp_output("budget.html");
        let mut config = config(&server.uri(), output.clone());
        config.page_budget = Some(3);

        let summary = bind(&config, &PassthroughRenderer, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 3);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.matches("class=\"page-section\"").count(), 3);

        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn skipped_page_does_not_abort_the_run() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><h1>Home</h1><a href="/gone">Gone</a><a href="/ok">Ok</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/ok",
            r#"<html><body><main><h1>Ok</h1></main></body></html>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let output = temp_output("skip.html");
        let config = config(&server.uri(), output.clone());

        let summary = bind(&config, &PassthroughRenderer, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.pages_skipped, 1);
        assert_eq!(summary.degrade_count(), 1);

        let _ = std::fs::remove_file(&output);
    }

    #[tokio::test]
    async fn empty_crawl_is_a_hard_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let output = temp_output("empty.html");
        let config = config(&server.uri(), output.clone());

        let err = bind(&config, &PassthroughRenderer, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no pages"));
        assert!(!output.exists());
    }
}
