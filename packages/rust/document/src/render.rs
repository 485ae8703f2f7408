//! Renderer seam and fallback handling.
//!
//! The paginated back end is an external collaborator: anything that can
//! turn document markup into output bytes implements [`Renderer`]. When the
//! full document fails to render, the text-only fallback markup is tried
//! before giving up.

use tracing::warn;

use docbinder_shared::{BinderError, Result};

use crate::assemble::Document;

/// A back end that turns document markup into output bytes.
pub trait Renderer: Send + Sync {
    /// Render the markup, or fail with [`BinderError::Render`].
    fn render(&self, markup: &str) -> Result<Vec<u8>>;

    /// Back-end name for logs.
    fn name(&self) -> &str;
}

/// Emits the markup bytes unchanged. The default back end: the assembled
/// document is itself a readable artifact.
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&self, markup: &str) -> Result<Vec<u8>> {
        Ok(markup.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Output of [`render_document`].
#[derive(Debug)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    /// True when the text-only fallback markup was used.
    pub used_fallback: bool,
}

/// Render the full document; on failure, render the minimal text-only
/// fallback instead. Only a second failure is surfaced to the caller.
pub fn render_document(doc: &Document, renderer: &dyn Renderer) -> Result<RenderOutput> {
    match renderer.render(&doc.to_markup()) {
        Ok(bytes) => Ok(RenderOutput {
            bytes,
            used_fallback: false,
        }),
        Err(primary) => {
            warn!(
                renderer = renderer.name(),
                error = %primary,
                "full render failed, trying text-only fallback"
            );
            renderer
                .render(&doc.to_fallback_markup())
                .map(|bytes| RenderOutput {
                    bytes,
                    used_fallback: true,
                })
                .map_err(|fallback| {
                    BinderError::Render(format!(
                        "fallback rendering failed: {fallback} (full render: {primary})"
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    fn empty_doc() -> Document {
        Document {
            site_title: "Docs".into(),
            source_url: "https://docs.example.com/".into(),
            generated_at: Utc::now(),
            toc: Vec::new(),
            sections: Vec::new(),
            images_embedded: 0,
            images_failed: 0,
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyRenderer {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Renderer for FlakyRenderer {
        fn render(&self, markup: &str) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(BinderError::Render("backend exploded".into()))
            } else {
                Ok(markup.as_bytes().to_vec())
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn passthrough_emits_markup_bytes() {
        let doc = empty_doc();
        let out = render_document(&doc, &PassthroughRenderer).unwrap();
        assert!(!out.used_fallback);
        assert_eq!(out.bytes, doc.to_markup().as_bytes());
    }

    #[test]
    fn falls_back_once_on_render_failure() {
        let renderer = FlakyRenderer {
            failures: 1,
            calls: AtomicUsize::new(0),
        };
        let doc = empty_doc();
        let out = render_document(&doc, &renderer).unwrap();
        assert!(out.used_fallback);
        assert_eq!(out.bytes, doc.to_fallback_markup().as_bytes());
    }

    #[test]
    fn double_failure_is_hard_error() {
        let renderer = FlakyRenderer {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let err = render_document(&empty_doc(), &renderer).unwrap_err();
        assert!(err.to_string().contains("fallback rendering failed"));
    }
}
