//! Document assembly: ordered pages → one merged document.
//!
//! Resolves image placeholders through the per-run cache, builds the table
//! of contents, and concatenates page fragments into a single markup tree.
//! Every page that survived the crawl gets exactly one section; image and
//! extraction failures degrade locally, never globally.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use url::Url;

use docbinder_shared::{ContentNode, ImageRef};

use crate::images::{ImageCache, ImageOutcome};
use crate::order::OrderedPage;

/// Tags emitted without a closing counterpart.
const VOID_TAGS: &[&str] = &["br", "hr", "wbr"];

/// TOC indentation is capped at this depth.
const MAX_TOC_DEPTH: usize = 3;

/// Run-level inputs for assembly.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Title shown on the cover and in the document head.
    pub site_title: String,
    /// The crawled site's base URL, for the cover block.
    pub source_url: String,
    /// Generation timestamp for the cover block.
    pub generated_at: DateTime<Utc>,
}

/// One entry of the generated table of contents.
#[derive(Debug, Clone)]
pub struct TocEntry {
    pub title: String,
    /// In-document anchor (`page-3`).
    pub anchor: String,
    /// Indentation level derived from path depth, capped.
    pub depth: usize,
}

/// One page's contribution to the document.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    pub anchor: String,
    pub source_url: String,
    /// Serialized content fragment with images resolved.
    pub body_html: String,
    /// Flattened text, used by the fallback rendering.
    pub plain_text: String,
    pub degraded: bool,
}

/// The final merged artifact. Immutable once handed to the renderer.
#[derive(Debug, Clone)]
pub struct Document {
    pub site_title: String,
    pub source_url: String,
    pub generated_at: DateTime<Utc>,
    pub toc: Vec<TocEntry>,
    pub sections: Vec<Section>,
    /// Distinct images successfully embedded.
    pub images_embedded: usize,
    /// Distinct images that fell back to an alt-text link.
    pub images_failed: usize,
}

/// Merge ordered pages into a [`Document`], resolving images through the
/// cache (each distinct source fetched at most once, concurrently).
#[instrument(skip_all, fields(pages = pages.len()))]
pub async fn assemble(
    pages: &[OrderedPage],
    opts: &AssembleOptions,
    images: Arc<ImageCache>,
) -> Document {
    let resolved = resolve_images(pages, images).await;

    let images_embedded = resolved.values().filter(|o| o.is_embedded()).count();
    let images_failed = resolved.len() - images_embedded;

    let mut toc = Vec::with_capacity(pages.len());
    let mut sections = Vec::with_capacity(pages.len());

    for (i, ordered) in pages.iter().enumerate() {
        let page = &ordered.page;
        let anchor = format!("page-{}", i + 1);

        toc.push(TocEntry {
            title: page.title.clone(),
            anchor: anchor.clone(),
            depth: ordered.order_key.depth().min(MAX_TOC_DEPTH),
        });

        let mut body_html = String::new();
        for node in &page.content {
            write_node(&mut body_html, node, &page.image_refs, &resolved);
        }

        let plain_text = page
            .content
            .iter()
            .map(|n| n.plain_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        sections.push(Section {
            title: page.title.clone(),
            anchor,
            source_url: page.url.to_string(),
            body_html,
            plain_text,
            degraded: page.degraded,
        });
    }

    debug!(
        sections = sections.len(),
        images_embedded, images_failed, "document assembled"
    );

    Document {
        site_title: opts.site_title.clone(),
        source_url: opts.source_url.clone(),
        generated_at: opts.generated_at,
        toc,
        sections,
        images_embedded,
        images_failed,
    }
}

/// Resolve every distinct image source concurrently through the cache.
async fn resolve_images(
    pages: &[OrderedPage],
    images: Arc<ImageCache>,
) -> HashMap<String, ImageOutcome> {
    let mut distinct: Vec<Url> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for ordered in pages {
        for image_ref in &ordered.page.image_refs {
            if seen.insert(image_ref.source.as_str().to_string()) {
                distinct.push(image_ref.source.clone());
            }
        }
    }

    let mut handles = Vec::with_capacity(distinct.len());
    for source in distinct {
        let cache = images.clone();
        handles.push(tokio::spawn(async move {
            let outcome = cache.resolve(&source).await;
            (source, outcome)
        }));
    }

    let mut resolved = HashMap::new();
    for handle in handles {
        if let Ok((source, outcome)) = handle.await {
            resolved.insert(source.as_str().to_string(), outcome);
        }
    }
    resolved
}

// ---------------------------------------------------------------------------
// Fragment serialization
// ---------------------------------------------------------------------------

fn write_node(
    out: &mut String,
    node: &ContentNode,
    image_refs: &[ImageRef],
    resolved: &HashMap<String, ImageOutcome>,
) {
    match node {
        ContentNode::Text(text) => {
            out.push_str(&html_escape::encode_text(text));
            out.push(' ');
        }
        ContentNode::Element {
            tag, children, ..
        } => {
            if VOID_TAGS.contains(&tag.as_str()) {
                out.push_str(&format!("<{tag}>"));
                return;
            }
            out.push_str(&format!("<{tag}>"));
            for child in children {
                write_node(out, child, image_refs, resolved);
            }
            out.push_str(&format!("</{tag}>"));
        }
        ContentNode::Image { index } => {
            let Some(image_ref) = image_refs.get(*index) else {
                return;
            };
            write_image(out, image_ref, resolved.get(image_ref.source.as_str()));
        }
        ContentNode::Link { href, children } => {
            out.push_str(&format!(
                "<a href=\"{}\">",
                html_escape::encode_double_quoted_attribute(href)
            ));
            for child in children {
                write_node(out, child, image_refs, resolved);
            }
            out.push_str("</a>");
        }
        ContentNode::VideoLink { label, url } => {
            let escaped_url = html_escape::encode_double_quoted_attribute(url);
            out.push_str(&format!(
                "<p class=\"video-link\">Video: {} <a href=\"{}\">{}</a></p>",
                html_escape::encode_text(label),
                escaped_url,
                html_escape::encode_text(url)
            ));
        }
    }
}

/// Embedded image on success; alt text plus a visible source link otherwise.
fn write_image(out: &mut String, image_ref: &ImageRef, outcome: Option<&ImageOutcome>) {
    match outcome {
        Some(ImageOutcome::Embedded(encoded)) => {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">",
                encoded.data_uri(),
                html_escape::encode_double_quoted_attribute(&image_ref.alt)
            ));
        }
        _ => {
            let alt = if image_ref.alt.is_empty() {
                "Image unavailable"
            } else {
                image_ref.alt.as_str()
            };
            out.push_str(&format!(
                "<p class=\"missing-image\">{} (<a href=\"{}\">{}</a>)</p>",
                html_escape::encode_text(alt),
                html_escape::encode_double_quoted_attribute(image_ref.source.as_str()),
                html_escape::encode_text(image_ref.source.as_str())
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Document markup
// ---------------------------------------------------------------------------

impl Document {
    /// Full document markup: cover, table of contents, page sections.
    pub fn to_markup(&self) -> String {
        let title = html_escape::encode_text(&self.site_title);
        let source = html_escape::encode_text(&self.source_url);

        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{title}</title>\n"));
        out.push_str("<style>\n");
        out.push_str(DOCUMENT_CSS);
        out.push_str("</style>\n</head>\n<body>\n");

        // Cover
        out.push_str("<div class=\"cover-page\">\n");
        out.push_str(&format!("<h1>{title}</h1>\n"));
        out.push_str(&format!("<p class=\"source\">Source: {source}</p>\n"));
        out.push_str(&format!(
            "<p class=\"date\">Generated on {}</p>\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "<p class=\"stats\">Total pages: {}</p>\n</div>\n",
            self.sections.len()
        ));

        // Table of contents
        out.push_str("<div class=\"table-of-contents\">\n<h1>Table of Contents</h1>\n");
        for entry in &self.toc {
            out.push_str(&format!(
                "<div class=\"toc-item toc-level-{}\"><a href=\"#{}\">{}</a></div>\n",
                entry.depth,
                entry.anchor,
                html_escape::encode_text(&entry.title)
            ));
        }
        out.push_str("</div>\n");

        // Sections
        for section in &self.sections {
            out.push_str(&format!(
                "<div class=\"page-section\" id=\"{}\">\n<h1 class=\"page-title\">{}</h1>\n<p class=\"page-url\">{}</p>\n<div class=\"page-content\">\n",
                section.anchor,
                html_escape::encode_text(&section.title),
                html_escape::encode_text(&section.source_url)
            ));
            out.push_str(&section.body_html);
            out.push_str("\n</div>\n</div>\n");
        }

        out.push_str("</body>\n</html>\n");
        out
    }

    /// Minimal fallback markup: page titles and plain text, no images.
    pub fn to_fallback_markup(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!(
            "<title>{} (fallback)</title>\n</head>\n<body>\n",
            html_escape::encode_text(&self.site_title)
        ));
        out.push_str(&format!(
            "<h1>{}</h1>\n<p>Source: {}</p>\n",
            html_escape::encode_text(&self.site_title),
            html_escape::encode_text(&self.source_url)
        ));

        for section in &self.sections {
            out.push_str(&format!(
                "<h2>{}</h2>\n<p class=\"page-url\">{}</p>\n<p>{}</p>\n",
                html_escape::encode_text(&section.title),
                html_escape::encode_text(&section.source_url),
                html_escape::encode_text(&section.plain_text)
            ));
        }

        out.push_str("</body>\n</html>\n");
        out
    }
}

/// Print-oriented styles for the assembled document.
const DOCUMENT_CSS: &str = "\
body { font-family: sans-serif; color: #2c3e50; line-height: 1.6; }
.cover-page { text-align: center; page-break-after: always; }
.cover-page .source, .cover-page .date, .cover-page .stats { color: #7f8c8d; }
.table-of-contents { page-break-after: always; }
.toc-item a { color: #2980b9; text-decoration: none; }
.toc-level-1 { margin-left: 1em; }
.toc-level-2 { margin-left: 2em; }
.toc-level-3 { margin-left: 3em; }
.page-section { page-break-before: always; }
.page-title { border-bottom: 1px solid #bdc3c7; }
.page-url { color: #7f8c8d; font-family: monospace; font-size: 0.8em; }
.missing-image { color: #7f8c8d; font-style: italic; }
.video-link { background: #fff3cd; padding: 0.5em; }
img { max-width: 100%; height: auto; display: block; margin: 1em auto; }
pre, code { font-family: monospace; background: #f8f9fa; }
";
