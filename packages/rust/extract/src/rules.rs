//! Selector rules and the exclusion matcher.
//!
//! Rules are parsed from simple selector strings (`nav`, `.sidebar`,
//! `#content`) into a typed form and matched by pure functions over
//! `(tag, id, classes)`, independent of any parsing library's node types.

use tracing::debug;

/// Tags that are never content, dropped unconditionally.
pub const DROP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "form", "input", "select", "textarea",
    "button", "object", "embed", "canvas", "dialog", "link", "meta", "head",
];

/// A single parsed selector: a tag name, a class, or an element id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorRule {
    Tag(String),
    Class(String),
    Id(String),
}

impl SelectorRule {
    /// Parse `nav` / `.sidebar` / `#content` forms. Anything else (combinators,
    /// attribute selectors) is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(class) = s.strip_prefix('.') {
            return valid_name(class).then(|| Self::Class(class.to_ascii_lowercase()));
        }
        if let Some(id) = s.strip_prefix('#') {
            return valid_name(id).then(|| Self::Id(id.to_ascii_lowercase()));
        }
        valid_name(s).then(|| Self::Tag(s.to_ascii_lowercase()))
    }

    /// Match against an element's tag, id, and class list (case-insensitive).
    pub fn matches(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> bool {
        match self {
            Self::Tag(t) => tag.eq_ignore_ascii_case(t),
            Self::Class(c) => classes.iter().any(|cls| cls.eq_ignore_ascii_case(c)),
            Self::Id(i) => id.is_some_and(|el_id| el_id.eq_ignore_ascii_case(i)),
        }
    }
}

fn valid_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parsed extraction rules: what to remove, and where content lives.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    /// Elements removed wherever they appear.
    pub excluded: Vec<SelectorRule>,
    /// Main-content selectors, tried in order.
    pub content: Vec<SelectorRule>,
}

impl ExtractRules {
    /// Parse selector lists from config; unparsable entries are dropped
    /// with a debug log.
    pub fn from_lists(excluded: &[String], content: &[String]) -> Self {
        Self {
            excluded: parse_list(excluded),
            content: parse_list(content),
        }
    }

    /// True when an element matches any exclusion rule.
    pub fn is_excluded(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> bool {
        self.excluded.iter().any(|r| r.matches(tag, id, classes))
    }
}

impl Default for ExtractRules {
    fn default() -> Self {
        let defaults = docbinder_shared::ExtractConfig::default();
        Self::from_lists(&defaults.excluded_selectors, &defaults.content_selectors)
    }
}

fn parse_list(raw: &[String]) -> Vec<SelectorRule> {
    raw.iter()
        .filter_map(|s| {
            let rule = SelectorRule::parse(s);
            if rule.is_none() {
                debug!(selector = %s, "unsupported selector, ignoring");
            }
            rule
        })
        .collect()
}
