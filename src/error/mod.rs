//! Error classification for retry and failover decisions.
//!
//! Errors self-describe their characteristics so that generic retry logic
//! (and the routing engine's single bounded failover) can decide how to react
//! without matching on concrete error variants.

use std::time::Duration;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve on retry (network issues, timeouts)
    Transient,
    /// Permanent errors that won't resolve on retry (invalid input, rejected order)
    Permanent,
    /// Resource exhaustion errors (rate limits)
    ResourceExhausted,
    /// Configuration errors (missing credentials, invalid settings)
    Configuration,
    /// Internal errors (bugs, unexpected state)
    Internal,
}

/// Trait for errors that can classify themselves for retry logic.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }

    /// Suggests a delay before retrying, if applicable
    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self.category() {
            ErrorCategory::Transient => Some(Duration::from_millis(100)),
            ErrorCategory::ResourceExhausted => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}
