//! Classified errors for the content-generation interface
//!
//! The agent core's retry/fallback controller keys off this classification:
//! transient transport failures are retried, quota exhaustion triggers a
//! model-tier fallback, and everything else propagates immediately.

use thiserror::Error;

/// Result alias for generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a content generator
#[derive(Debug, Error)]
pub enum Error {
    /// Transient transport failure (connection reset, timeout, 5xx)
    #[error("transport error: {0}")]
    Transport(String),

    /// Mid-stream failure that may succeed on a fresh stream
    #[error("stream error: {0}")]
    Stream(String),

    /// Rate limit or quota exhaustion on the current model tier
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Authentication/authorization failure; terminal for the session
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The request itself was malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider-reported failure that is not transient
    #[error("provider error: {0}")]
    Provider(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a stream error
    pub fn stream_error(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create a provider error
    pub fn provider_error(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Whether retrying the same tier may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Stream(_))
    }

    /// Whether this is a quota/rate-limit failure (fallback-eligible)
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
    }
}
