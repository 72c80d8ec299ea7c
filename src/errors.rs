//! Crate-wide error taxonomy.
//!
//! Every pipeline stage reports through [`RagError`]. The variants mirror the
//! failure classes callers have to distinguish:
//!
//! - [`RagError::NotFound`] / [`RagError::UnsupportedType`] — loader-level,
//!   surfaced before any embedding work starts.
//! - [`RagError::Provider`] — an embedding or completion call failed. Whether
//!   the failure is a transient throttle is decided by message signature via
//!   [`RagError::is_throttle`], because providers report rate limits as
//!   opaque HTTP error text.
//! - [`RagError::RateLimited`] — throttling that outlived the recovery budget.
//! - [`RagError::InvalidState`] — an operation was called before its
//!   precondition held (e.g. `add` before `load`).
//! - [`RagError::CachePersist`] — non-fatal; the freshly built index is still
//!   returned to the caller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A required local document path does not exist on disk.
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    /// An explicit document type could not be resolved to a known loader.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    /// Throttling persisted past the per-batch retry budget.
    #[error("rate limited by embedding provider after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },

    /// Any non-throttling provider failure. Fatal for the current run.
    #[error("provider error: {0}")]
    Provider(String),

    /// Operation requires a live index that has not been installed yet.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Persisting a built index to the cache failed. Non-fatal.
    #[error("failed to persist cache entry {key}: {message}")]
    CachePersist { key: String, message: String },

    /// Text extraction from a binary document failed.
    #[error("extraction failed: {0}")]
    Extract(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl RagError {
    /// True when the error carries a rate-limit signature.
    ///
    /// Providers surface throttling as HTTP error text rather than a typed
    /// condition, so the batch engine matches on the two signatures the
    /// OpenAI-compatible APIs emit.
    pub fn is_throttle(&self) -> bool {
        let message = match self {
            RagError::Provider(m) => m.as_str(),
            RagError::Http(e) => return e.status().map(|s| s.as_u16() == 429).unwrap_or(false),
            _ => return false,
        };
        message.contains("429") || message.contains("Too Many Requests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_signature_429() {
        let err = RagError::Provider("API error 429: slow down".to_string());
        assert!(err.is_throttle());
    }

    #[test]
    fn throttle_signature_text() {
        let err = RagError::Provider("Too Many Requests".to_string());
        assert!(err.is_throttle());
    }

    #[test]
    fn non_throttle_provider_error() {
        let err = RagError::Provider("API error 500: internal".to_string());
        assert!(!err.is_throttle());
    }

    #[test]
    fn not_found_is_not_throttle() {
        let err = RagError::NotFound(PathBuf::from("/missing.pdf"));
        assert!(!err.is_throttle());
    }
}
