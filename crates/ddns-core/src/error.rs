//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants fall into three families:
//! - **Probe**: no local address is available for the requested family
//! - **Provider**: any failure of a remote DNS provider call
//!   (`Provider`, `Authentication`, `RateLimited`, `Http`, `Timeout`)
//! - **Config**: malformed or invalid settings, fatal at startup

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Local address probe errors
    #[error("Address probe error: {0}")]
    Probe(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// HTTP transport errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// A remote call did not complete within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation was abandoned because shutdown was requested
    #[error("Cancelled: shutdown requested")]
    Cancelled,
}

impl Error {
    /// Create an address probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from a remote provider call
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::Authentication(_)
                | Self::RateLimited(_)
                | Self::Http(_)
                | Self::Timeout(_)
                | Self::Json(_)
        )
    }
}
