//! Content extraction: raw markup → clean typed content tree.
//!
//! `extract` strips page chrome, isolates the main content region, rewrites
//! images to placeholders, replaces video embeds with links, and collects
//! discovered links under the shared admission policy. It never fails: on a
//! structurally unusable document it degrades to a raw-text record.

pub mod rules;

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use docbinder_shared::{
    ContentNode, ExtractedPage, ImageRef, UrlPolicy, is_fragment_only,
};

pub use rules::{DROP_TAGS, ExtractRules, SelectorRule};

/// Hosts whose iframe embeds are treated as videos.
const VIDEO_EMBED_MARKERS: &[&str] = &[
    "youtube.com/embed/",
    "youtube-nocookie.com/embed/",
    "youtu.be/",
    "player.vimeo.com/video/",
];

/// Extract a page from raw markup.
///
/// `url` is the page's canonical URL (post-redirect), used to resolve
/// relative references. Never panics and never errors: parse failures
/// produce a degraded record with `degraded = true`.
#[instrument(skip(raw_markup, rules, policy), fields(url = %url, bytes = raw_markup.len()))]
pub fn extract(
    raw_markup: &str,
    url: &Url,
    rules: &ExtractRules,
    policy: &UrlPolicy,
) -> ExtractedPage {
    let doc = Html::parse_document(raw_markup);

    let body_sel = Selector::parse("body").unwrap();
    let Some(body) = doc.select(&body_sel).next() else {
        warn!(%url, "document has no body, degrading to raw text");
        return degraded_page(raw_markup, url);
    };

    if body_is_empty(body) && !raw_markup.trim().is_empty() {
        warn!(%url, "parse produced an empty tree, degrading to raw text");
        return degraded_page(raw_markup, url);
    }

    let content_root = find_content_root(body, rules);
    if content_root.is_none() {
        debug!(%url, "no content selector matched, falling back to body");
    }
    let content_root = content_root.unwrap_or(body);

    let mut walker = Walker {
        base: url,
        policy,
        rules,
        image_refs: Vec::new(),
        links: Vec::new(),
        seen_links: HashSet::new(),
    };
    let content = walker.walk_children(content_root);

    let title = first_heading(content_root)
        .or_else(|| document_title(&doc))
        .unwrap_or_else(|| title_from_url(url));

    debug!(
        %url,
        nodes = content.len(),
        links = walker.links.len(),
        images = walker.image_refs.len(),
        "extraction complete"
    );

    ExtractedPage {
        url: url.clone(),
        title,
        content,
        discovered_links: walker.links,
        image_refs: walker.image_refs,
        degraded: false,
    }
}

// ---------------------------------------------------------------------------
// Content-region selection
// ---------------------------------------------------------------------------

/// Find the main content element: first match of the highest-priority
/// content selector, searching the body depth-first.
fn find_content_root<'a>(body: ElementRef<'a>, rules: &ExtractRules) -> Option<ElementRef<'a>> {
    rules
        .content
        .iter()
        .find_map(|rule| find_first_match(body, rule))
}

fn find_first_match<'a>(el: ElementRef<'a>, rule: &SelectorRule) -> Option<ElementRef<'a>> {
    let elem = el.value();
    let classes: Vec<&str> = elem.classes().collect();
    if rule.matches(elem.name(), elem.id(), &classes) {
        return Some(el);
    }
    el.children()
        .filter_map(ElementRef::wrap)
        .find_map(|child| find_first_match(child, rule))
}

/// True when the body has neither element children nor any text.
fn body_is_empty(body: ElementRef<'_>) -> bool {
    let has_elements = body.children().any(|c| ElementRef::wrap(c).is_some());
    let has_text = body.text().any(|t| !t.trim().is_empty());
    !has_elements && !has_text
}

// ---------------------------------------------------------------------------
// Tree walker
// ---------------------------------------------------------------------------

struct Walker<'a> {
    base: &'a Url,
    policy: &'a UrlPolicy,
    rules: &'a ExtractRules,
    image_refs: Vec<ImageRef>,
    links: Vec<Url>,
    seen_links: HashSet<String>,
}

impl Walker<'_> {
    fn walk_children(&mut self, el: ElementRef<'_>) -> Vec<ContentNode> {
        let mut out = Vec::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let collapsed = collapse_whitespace(text);
                    if !collapsed.is_empty() {
                        out.push(ContentNode::Text(collapsed));
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        if let Some(node) = self.walk_element(child_el) {
                            out.push(node);
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn walk_element(&mut self, el: ElementRef<'_>) -> Option<ContentNode> {
        let elem = el.value();
        let tag = elem.name();

        if DROP_TAGS.contains(&tag) {
            return None;
        }

        let classes: Vec<&str> = elem.classes().collect();
        if self.rules.is_excluded(tag, elem.id(), &classes) {
            return None;
        }

        match tag {
            "img" => self.image_node(el),
            "a" => Some(self.link_node(el)),
            "iframe" => self.video_node(el),
            _ => {
                let children = self.walk_children(el);
                Some(ContentNode::Element {
                    tag: tag.to_string(),
                    classes: classes.into_iter().map(String::from).collect(),
                    id: elem.id().map(String::from),
                    children,
                })
            }
        }
    }

    /// Record an image reference and leave a placeholder in the tree.
    /// UI icons and inline `data:` sources are dropped entirely.
    fn image_node(&mut self, el: ElementRef<'_>) -> Option<ContentNode> {
        let src = el.value().attr("src").unwrap_or("").trim();
        if src.is_empty() || is_icon_image(el, src) {
            return None;
        }

        let source = self.base.join(src).ok()?;
        let alt = el.value().attr("alt").unwrap_or("").trim().to_string();

        let index = self.image_refs.len();
        self.image_refs.push(ImageRef { source, alt });
        Some(ContentNode::Image { index })
    }

    /// Resolve an anchor; feed admitted targets into `discovered_links`.
    fn link_node(&mut self, el: ElementRef<'_>) -> ContentNode {
        let href = el.value().attr("href").unwrap_or("").trim();
        let children = self.walk_children(el);

        let resolved = (!href.is_empty() && !is_fragment_only(href))
            .then(|| self.policy.resolve(href, self.base))
            .flatten();

        if let Some(url) = &resolved {
            if self.policy.admit(url).is_admitted()
                && self.seen_links.insert(url.as_str().to_string())
            {
                self.links.push(url.clone());
            }
        }

        let href_out = resolved
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());
        ContentNode::Link {
            href: href_out,
            children,
        }
    }

    /// Replace a video embed with a text+link node; drop other iframes.
    fn video_node(&mut self, el: ElementRef<'_>) -> Option<ContentNode> {
        let src = el.value().attr("src").unwrap_or("").trim();
        let watch_url = canonical_video_url(src)?;

        let label = el
            .value()
            .attr("title")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| watch_url.clone());

        Some(ContentNode::VideoLink {
            label,
            url: watch_url,
        })
    }
}

/// Heuristic for UI icons that should not survive into the document.
fn is_icon_image(el: ElementRef<'_>, src: &str) -> bool {
    let src_lower = src.to_ascii_lowercase();
    if src_lower.starts_with("data:") {
        return true;
    }
    if src_lower.contains("favicon") || src_lower.contains("/icons/") {
        return true;
    }

    let classes: Vec<&str> = el.value().classes().collect();
    if classes
        .iter()
        .any(|c| c.to_ascii_lowercase().contains("icon"))
    {
        return true;
    }

    matches!(
        el.value().attr("alt").map(str::trim),
        Some("icon") | Some("favicon")
    )
}

/// Rewrite a video embed src to its canonical watch URL.
fn canonical_video_url(src: &str) -> Option<String> {
    if !VIDEO_EMBED_MARKERS.iter().any(|m| src.contains(m)) {
        return None;
    }

    if let Some(rest) = src
        .split_once("youtube.com/embed/")
        .or_else(|| src.split_once("youtube-nocookie.com/embed/"))
        .map(|(_, rest)| rest)
    {
        let id = rest.split(['?', '&', '/']).next().unwrap_or("");
        if !id.is_empty() {
            return Some(format!("https://www.youtube.com/watch?v={id}"));
        }
    }

    if let Some((_, rest)) = src.split_once("youtu.be/") {
        let id = rest.split(['?', '&', '/']).next().unwrap_or("");
        if !id.is_empty() {
            return Some(format!("https://www.youtube.com/watch?v={id}"));
        }
    }

    if let Some((_, rest)) = src.split_once("player.vimeo.com/video/") {
        let id = rest.split(['?', '&', '/']).next().unwrap_or("");
        if !id.is_empty() {
            return Some(format!("https://vimeo.com/{id}"));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Title derivation
// ---------------------------------------------------------------------------

/// First h1 (then h2) text within the content region.
fn first_heading(root: ElementRef<'_>) -> Option<String> {
    for tag in ["h1", "h2"] {
        if let Some(text) = find_first_match(root, &SelectorRule::Tag(tag.into()))
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
        {
            return Some(text);
        }
    }
    None
}

/// The `<title>` element text, if any.
fn document_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").unwrap();
    doc.select(&sel)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Prettify the last URL path segment into a title; `Home` for the root.
fn title_from_url(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "Home".to_string();
    }

    let segment = path.rsplit('/').next().unwrap_or(path);
    let words: Vec<String> = segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        url.as_str().to_string()
    } else {
        words.join(" ")
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Degraded fallback
// ---------------------------------------------------------------------------

/// Minimal record for structurally unusable input: raw text with control
/// bytes stripped, no images, no links.
fn degraded_page(raw_markup: &str, url: &Url) -> ExtractedPage {
    let text: String = raw_markup
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    ExtractedPage {
        url: url.clone(),
        title: title_from_url(url),
        content: vec![ContentNode::Text(text.trim().to_string())],
        discovered_links: Vec::new(),
        image_refs: Vec::new(),
        degraded: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ExtractRules, UrlPolicy, Url) {
        let base = Url::parse("https://docs.example.com/guide").unwrap();
        let policy = UrlPolicy::new(&base, &[]);
        (ExtractRules::default(), policy, base)
    }

    fn find_images(nodes: &[ContentNode]) -> usize {
        nodes
            .iter()
            .map(|n| match n {
                ContentNode::Image { .. } => 1,
                ContentNode::Element { children, .. } | ContentNode::Link { children, .. } => {
                    find_images(children)
                }
                _ => 0,
            })
            .sum()
    }

    fn find_video(nodes: &[ContentNode]) -> Option<(String, String)> {
        nodes.iter().find_map(|n| match n {
            ContentNode::VideoLink { label, url } => Some((label.clone(), url.clone())),
            ContentNode::Element { children, .. } | ContentNode::Link { children, .. } => {
                find_video(children)
            }
            _ => None,
        })
    }

    #[test]
    fn extracts_main_content_and_strips_chrome() {
        let (rules, policy, url) = setup();
        let html = r#"<html><body>
            <nav><a href="/everywhere">Nav link</a></nav>
            <div class="sidebar">Menu</div>
            <main>
                <h1>Installation</h1>
                <p>Run the installer.</p>
            </main>
            <footer>Footer text</footer>
        </body></html>"#;

        let page = extract(html, &url, &rules, &policy);

        assert_eq!(page.title, "Installation");
        assert!(!page.degraded);
        let text: String = page
            .content
            .iter()
            .map(|n| n.plain_text())
            .collect::<Vec<_>>()
            .join(" ");
        assert!(text.contains("Run the installer."));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("Footer text"));
        // Nav link was outside the content region.
        assert!(page.discovered_links.is_empty());
    }

    #[test]
    fn records_images_as_placeholders() {
        let (rules, policy, url) = setup();
        let html = r#"<html><body><main>
            <h1>Shots</h1>
            <img src="/images/editor.png" alt="Editor window">
            <img src="icon.svg" class="nav-icon" alt="icon">
            <img src="">
        </main></body></html>"#;

        let page = extract(html, &url, &rules, &policy);

        assert_eq!(page.image_refs.len(), 1);
        assert_eq!(
            page.image_refs[0].source.as_str(),
            "https://docs.example.com/images/editor.png"
        );
        assert_eq!(page.image_refs[0].alt, "Editor window");
        assert_eq!(find_images(&page.content), 1);
    }

    #[test]
    fn replaces_video_embeds_with_links() {
        let (rules, policy, url) = setup();
        let html = r#"<html><body><main>
            <iframe src="https://www.youtube.com/embed/abc123?rel=0" title="Intro tour"></iframe>
            <iframe src="https://widgets.example.com/chat"></iframe>
        </main></body></html>"#;

        let page = extract(html, &url, &rules, &policy);

        let (label, video_url) = find_video(&page.content).expect("video link");
        assert_eq!(label, "Intro tour");
        assert_eq!(video_url, "https://www.youtube.com/watch?v=abc123");
        // The non-video iframe is gone entirely.
        assert_eq!(
            page.content
                .iter()
                .map(|n| n.plain_text())
                .collect::<String>()
                .contains("chat"),
            false
        );
    }

    #[test]
    fn collects_admitted_links_only() {
        let (rules, policy, url) = setup();
        let html = r##"<html><body><main>
            <a href="/settings">Settings</a>
            <a href="/settings">Settings again</a>
            <a href="#section">In-page</a>
            <a href="https://external.com/page">External</a>
            <a href="/archive.zip">Download</a>
        </main></body></html>"##;

        let page = extract(html, &url, &rules, &policy);

        assert_eq!(page.discovered_links.len(), 1);
        assert_eq!(
            page.discovered_links[0].as_str(),
            "https://docs.example.com/settings"
        );
    }

    #[test]
    fn falls_back_to_body_without_content_selector() {
        let (rules, policy, url) = setup();
        let html = r#"<html><body>
            <div class="page"><h2>Only Section</h2><p>Body fallback text.</p></div>
        </body></html>"#;

        let page = extract(html, &url, &rules, &policy);

        assert_eq!(page.title, "Only Section");
        let text: String = page.content.iter().map(|n| n.plain_text()).collect();
        assert!(text.contains("Body fallback text."));
    }

    #[test]
    fn never_fails_on_malformed_input() {
        let (rules, policy, url) = setup();
        let inputs = [
            "",
            "<<<>>>",
            "<html><body><div><p>unclosed",
            "\u{0}\u{1}binary-ish\u{2}",
            "<!-- nothing but a comment -->",
        ];

        for raw in inputs {
            let page = extract(raw, &url, &rules, &policy);
            assert!(!page.title.is_empty(), "empty title for {raw:?}");
        }
    }

    #[test]
    fn comment_only_document_degrades() {
        let (rules, policy, url) = setup();
        let page = extract("<!-- only a comment -->", &url, &rules, &policy);
        assert!(page.degraded);
        assert_eq!(page.title, "Guide");
        assert!(page.discovered_links.is_empty());
        assert!(page.image_refs.is_empty());
    }

    #[test]
    fn title_falls_back_to_document_title_then_path() {
        let (rules, policy, url) = setup();

        let with_title =
            "<html><head><title>Doc Title</title></head><body><main><p>x</p></main></body></html>";
        assert_eq!(
            extract(with_title, &url, &rules, &policy).title,
            "Doc Title"
        );

        let without = "<html><body><main><p>x</p></main></body></html>";
        assert_eq!(extract(without, &url, &rules, &policy).title, "Guide");

        let root = Url::parse("https://docs.example.com/").unwrap();
        assert_eq!(extract(without, &root, &rules, &policy).title, "Home");
    }

    #[test]
    fn link_wrapped_image_keeps_both() {
        let (rules, policy, url) = setup();
        let html = r#"<html><body><main>
            <a href="/detail"><img src="/shots/detail.png" alt="Detail view"></a>
        </main></body></html>"#;

        let page = extract(html, &url, &rules, &policy);

        assert_eq!(page.image_refs.len(), 1);
        assert_eq!(page.discovered_links.len(), 1);
        assert_eq!(find_images(&page.content), 1);
    }
}
