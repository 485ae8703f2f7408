//! Per-run image resolution with a single-flight cache.
//!
//! Each distinct source URI is fetched at most once per run: concurrent
//! requests for the same URI collapse into one download, with every caller
//! awaiting the same outcome. Downloads run under a bounded semaphore and
//! the shared retry policy; failures become per-image fallbacks, never
//! run-level errors.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine as _;
use image::ImageFormat;
use image::imageops::FilterType;
use reqwest::Client;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::{debug, warn};
use url::Url;

use docbinder_shared::{BinderError, Result, RetryPolicy};

/// Settings for image download and processing.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Downscale when the longer edge exceeds this many pixels.
    pub max_edge_px: u32,
    /// Reject payloads larger than this many bytes.
    pub max_bytes: u64,
    /// Concurrent downloads.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy shared with page fetching.
    pub retry: RetryPolicy,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_edge_px: 800,
            max_bytes: 10 * 1024 * 1024,
            concurrency: 4,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// A fetched, size-bounded image payload ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type of `data`.
    pub media_type: &'static str,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl EncodedImage {
    /// The payload as a `data:` URI for direct embedding in markup.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Result of resolving one image source.
#[derive(Debug, Clone)]
pub enum ImageOutcome {
    /// Payload fetched (and downscaled if needed).
    Embedded(EncodedImage),
    /// Fetch/decode/size failure; the assembler substitutes alt text + link.
    Failed { reason: String },
}

impl ImageOutcome {
    /// True for the embedded case.
    pub fn is_embedded(&self) -> bool {
        matches!(self, ImageOutcome::Embedded(_))
    }
}

/// Per-run image cache keyed by source URI.
pub struct ImageCache {
    client: Client,
    opts: ImageOptions,
    semaphore: Arc<Semaphore>,
    slots: Mutex<HashMap<String, Arc<OnceCell<ImageOutcome>>>>,
    fetches: AtomicUsize,
}

impl ImageCache {
    /// Build a cache with its own HTTP client.
    pub fn new(opts: ImageOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("docbinder/", env!("CARGO_PKG_VERSION")))
            .timeout(opts.timeout)
            .build()
            .map_err(|e| BinderError::config(format!("failed to build image client: {e}")))?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(opts.concurrency.max(1))),
            opts,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    /// Resolve a source URI, fetching it at most once per run.
    pub async fn resolve(&self, source: &Url) -> ImageOutcome {
        let cell = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(source.as_str().to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| async {
            let _permit = self.semaphore.acquire().await.expect("semaphore closed");
            self.fetches.fetch_add(1, Ordering::Relaxed);

            match self.fetch_and_encode(source).await {
                Ok(encoded) => {
                    debug!(url = %source, bytes = encoded.data.len(), "image embedded");
                    ImageOutcome::Embedded(encoded)
                }
                Err(e) => {
                    warn!(url = %source, error = %e, "image failed, falling back to link");
                    ImageOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        })
        .await
        .clone()
    }

    /// Number of network fetches actually performed (dedup observable).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn fetch_and_encode(&self, source: &Url) -> Result<EncodedImage> {
        let bytes = self.download(source).await?;

        if bytes.len() as u64 > self.opts.max_bytes {
            return Err(BinderError::image(
                source.as_str(),
                format!(
                    "payload of {} bytes exceeds cap of {}",
                    bytes.len(),
                    self.opts.max_bytes
                ),
            ));
        }

        encode_bounded(&bytes, self.opts.max_edge_px)
            .map_err(|reason| BinderError::image(source.as_str(), reason))
    }

    /// Download with the same retry/backoff treatment as page fetches.
    async fn download(&self, source: &Url) -> Result<Vec<u8>> {
        let mut failures = 0u32;
        loop {
            match self.try_download(source).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    failures += 1;
                    if !self.opts.retry.should_retry(failures) {
                        return Err(e);
                    }
                    let delay = self.opts.retry.backoff(failures - 1);
                    debug!(url = %source, attempt = failures, ?delay, "image fetch retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_download(&self, source: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(source.as_str())
            .send()
            .await
            .map_err(|e| BinderError::image(source.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BinderError::image(
                source.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BinderError::image(source.as_str(), format!("body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Decode, downscale if the longer edge exceeds `max_edge`, and re-encode.
/// Payloads already within bounds pass through unmodified.
fn encode_bounded(bytes: &[u8], max_edge: u32) -> std::result::Result<EncodedImage, String> {
    let format = image::guess_format(bytes).map_err(|e| format!("unrecognized format: {e}"))?;
    let img = image::load_from_memory(bytes).map_err(|e| format!("decode failed: {e}"))?;

    if img.width().max(img.height()) <= max_edge {
        return Ok(EncodedImage {
            media_type: format.to_mime_type(),
            data: bytes.to_vec(),
        });
    }

    let resized = img.resize(max_edge, max_edge, FilterType::Lanczos3);
    let out_format = if format == ImageFormat::Jpeg {
        ImageFormat::Jpeg
    } else {
        ImageFormat::Png
    };

    let mut buf = Cursor::new(Vec::new());
    resized
        .write_to(&mut buf, out_format)
        .map_err(|e| format!("re-encode failed: {e}"))?;

    Ok(EncodedImage {
        media_type: out_format.to_mime_type(),
        data: buf.into_inner(),
    })
}
