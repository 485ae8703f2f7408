//! Application configuration for docbinder.
//!
//! User config lives at `~/.docbinder/docbinder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BinderError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docbinder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docbinder";

// ---------------------------------------------------------------------------
// Config structs (matching docbinder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Crawl policies.
    #[serde(default)]
    pub crawl: CrawlPoliciesConfig,

    /// Content extraction rules.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Image resolution settings.
    #[serde(default)]
    pub images: ImagesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output file path.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Maximum pages per run (unset = unlimited).
    #[serde(default)]
    pub page_budget: Option<usize>,

    /// Delay between page fetches, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            page_budget: None,
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_output_file() -> String {
    "site_docs.html".into()
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Total fetch attempts per URL (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in ms (exponential backoff).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Path exclusion glob patterns.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_exclude_patterns() -> Vec<String> {
    ["/api/**", "/admin/**", "/login/**", "/logout/**", "/search/**"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Selectors removed before content extraction (tag, `.class`, `#id`).
    #[serde(default = "default_excluded_selectors")]
    pub excluded_selectors: Vec<String>,

    /// Main-content selectors, in priority order.
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,

    /// Fold path segments to lowercase when building order keys.
    #[serde(default)]
    pub case_insensitive_order: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            excluded_selectors: default_excluded_selectors(),
            content_selectors: default_content_selectors(),
            case_insensitive_order: false,
        }
    }
}

fn default_excluded_selectors() -> Vec<String> {
    [
        "nav",
        "header",
        "footer",
        ".sidebar",
        ".navigation",
        ".breadcrumb",
        ".toc",
        ".advertisement",
        ".promo",
        ".banner",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_content_selectors() -> Vec<String> {
    [
        "main",
        ".content",
        "article",
        ".documentation",
        ".main-content",
        "#content",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// `[images]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Downscale when the longer edge exceeds this many pixels.
    #[serde(default = "default_max_edge_px")]
    pub max_edge_px: u32,

    /// Reject payloads larger than this many bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Concurrent image downloads.
    #[serde(default = "default_image_concurrency")]
    pub concurrency: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_edge_px: default_max_edge_px(),
            max_bytes: default_max_bytes(),
            concurrency: default_image_concurrency(),
        }
    }
}

fn default_max_edge_px() -> u32 {
    800
}
fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_image_concurrency() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Bind config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for a single bind run.
#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Root URL of the site to bind.
    pub base_url: Url,
    /// Title for the generated document (defaults to the host name).
    pub site_title: String,
    /// Output file path.
    pub output_path: PathBuf,
    /// Maximum pages per run (None = unlimited).
    pub page_budget: Option<usize>,
    /// Delay between page fetches.
    pub delay: Duration,
    /// Per-request network timeout.
    pub timeout: Duration,
    /// Retry policy for fetches and image downloads.
    pub retry: RetryPolicy,
    /// Path exclusion glob patterns.
    pub exclude_patterns: Vec<String>,
    /// Selectors removed before extraction.
    pub excluded_selectors: Vec<String>,
    /// Main-content selectors, in priority order.
    pub content_selectors: Vec<String>,
    /// Fold path segments to lowercase when ordering.
    pub case_insensitive_order: bool,
    /// Downscale threshold for the longer image edge, in pixels.
    pub image_max_edge_px: u32,
    /// Image payload size cap, in bytes.
    pub image_max_bytes: u64,
    /// Concurrent image downloads.
    pub image_concurrency: usize,
}

impl BindConfig {
    /// Merge file config with a base URL to produce runtime settings.
    pub fn from_app_config(config: &AppConfig, base_url: Url) -> Self {
        let site_title = base_url.host_str().unwrap_or("documentation").to_string();
        Self {
            base_url,
            site_title,
            output_path: PathBuf::from(&config.defaults.output_file),
            page_budget: config.defaults.page_budget,
            delay: Duration::from_millis(config.defaults.delay_ms),
            timeout: Duration::from_secs(config.defaults.timeout_secs),
            retry: RetryPolicy::new(
                config.crawl.max_attempts,
                Duration::from_millis(config.crawl.retry_base_ms),
            ),
            exclude_patterns: config.crawl.exclude_patterns.clone(),
            excluded_selectors: config.extract.excluded_selectors.clone(),
            content_selectors: config.extract.content_selectors.clone(),
            case_insensitive_order: config.extract.case_insensitive_order,
            image_max_edge_px: config.images.max_edge_px,
            image_max_bytes: config.images.max_bytes,
            image_concurrency: config.images.concurrency.max(1),
        }
    }

    /// Validate runtime settings that cannot be expressed in the type.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.host_str().is_none() {
            return Err(BinderError::validation(format!(
                "base URL has no host: {}",
                self.base_url
            )));
        }
        if let Some(0) = self.page_budget {
            return Err(BinderError::validation("page budget must be positive"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(BinderError::validation("output path cannot be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docbinder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BinderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docbinder/docbinder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BinderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BinderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BinderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BinderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BinderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_file"));
        assert!(toml_str.contains("content_selectors"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.delay_ms, 1000);
        assert_eq!(parsed.crawl.max_attempts, 3);
        assert_eq!(parsed.images.max_edge_px, 800);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
page_budget = 50
delay_ms = 250

[extract]
case_insensitive_order = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.page_budget, Some(50));
        assert_eq!(config.defaults.delay_ms, 250);
        assert_eq!(config.defaults.timeout_secs, 30);
        assert!(config.extract.case_insensitive_order);
        assert!(config.extract.content_selectors.contains(&"main".to_string()));
    }

    #[test]
    fn bind_config_from_app_config() {
        let app = AppConfig::default();
        let base = Url::parse("https://docs.example.com/").unwrap();
        let bind = BindConfig::from_app_config(&app, base);
        assert_eq!(bind.site_title, "docs.example.com");
        assert_eq!(bind.delay, Duration::from_millis(1000));
        assert_eq!(bind.retry.max_attempts, 3);
        assert!(bind.validate().is_ok());
    }

    #[test]
    fn bind_config_rejects_zero_budget() {
        let app = AppConfig::default();
        let base = Url::parse("https://docs.example.com/").unwrap();
        let mut bind = BindConfig::from_app_config(&app, base);
        bind.page_budget = Some(0);
        let err = bind.validate().unwrap_err();
        assert!(err.to_string().contains("page budget"));
    }
}
