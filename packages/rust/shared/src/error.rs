//! Error types for docbinder.
//!
//! Library crates use [`BinderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docbinder operations.
#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Page fetch error (transport, timeout, or HTTP status).
    #[error("fetch error for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Markup parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Image download, decode, or size error.
    #[error("image error for {url}: {reason}")]
    Image { url: String, reason: String },

    /// Document rendering error.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty crawl, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BinderError>;

impl BinderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error with the URL it concerns.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create an image error with the source URI it concerns.
    pub fn image(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Image {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BinderError::config("missing base URL");
        assert_eq!(err.to_string(), "config error: missing base URL");

        let err = BinderError::fetch("https://docs.example.com/x", "HTTP 503");
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("docs.example.com/x"));

        let err = BinderError::image("https://cdn.example.com/a.png", "payload too large");
        assert!(err.to_string().contains("payload too large"));
    }
}
