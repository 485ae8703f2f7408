//! Shared types, error model, and configuration for docbinder.
//!
//! This crate is the foundation depended on by all other docbinder crates.
//! It provides:
//! - [`BinderError`], the unified error type
//! - Domain types ([`RawPage`], [`ExtractedPage`], [`ContentNode`], [`RunSummary`])
//! - URL normalization and the shared admission policy ([`UrlPolicy`])
//! - Retry policy ([`RetryPolicy`])
//! - Configuration ([`AppConfig`], [`BindConfig`], config loading)

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod urls;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BindConfig, CrawlPoliciesConfig, DefaultsConfig, ExtractConfig, ImagesConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BinderError, Result};
pub use retry::RetryPolicy;
pub use types::{
    ContentNode, ExtractedPage, ImageRef, RawPage, RunId, RunSummary, duration_ms,
};
pub use urls::{Admission, UrlPolicy, is_fragment_only, normalize_url};
