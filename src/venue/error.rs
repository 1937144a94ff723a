//! Venue error taxonomy with classification for failover decisions.
//!
//! One unified error type covers every venue operation. Each variant maps to
//! an [`ErrorCategory`]; the routing engine fails over only on transient
//! categories and surfaces everything else immediately.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorCategory, ErrorClassification};

/// Result type for venue operations.
pub type VenueResult<T> = Result<T, VenueError>;

/// Errors that can occur during venue operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VenueError {
    /// Bad order parameters (never retried)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Asset not tradeable on the venue
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// Order notional outside the venue's configured limits
    #[error("Order size {notional} outside venue bounds [{min}, {max}]")]
    SizeOutOfBounds {
        /// Requested notional
        notional: Decimal,
        /// Venue minimum
        min: Decimal,
        /// Venue maximum
        max: Decimal,
    },

    /// Not enough collateral for the operation
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needs
        required: Decimal,
        /// Amount actually available
        available: Decimal,
    },

    /// Network failure reaching the venue
    #[error("Connection error: {0}")]
    Connection(String),

    /// Venue call timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Venue accepted the call but rejected the order
    #[error("Execution rejected: {0}")]
    Execution(String),

    /// Venue-side failure with venue-supplied detail
    #[error("Provider error: {0}")]
    Provider(String),

    /// Operation not supported by this venue
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Outbound rate budget exhausted
    #[error("Rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying, in milliseconds
        retry_after_ms: u64,
    },

    /// Wallet-signer collaborator failed to produce a signature
    #[error("Signing error: {0}")]
    Signing(String),

    /// Failed to parse a venue response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or invalid adapter configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Order id unknown to the venue
    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

impl ErrorClassification for VenueError {
    fn category(&self) -> ErrorCategory {
        match self {
            VenueError::Validation(_) => ErrorCategory::Permanent,
            VenueError::UnsupportedAsset(_) => ErrorCategory::Permanent,
            VenueError::SizeOutOfBounds { .. } => ErrorCategory::Permanent,
            VenueError::InsufficientBalance { .. } => ErrorCategory::Permanent,
            VenueError::Connection(_) => ErrorCategory::Transient,
            VenueError::Timeout(_) => ErrorCategory::Transient,
            VenueError::Execution(_) => ErrorCategory::Permanent,
            VenueError::Provider(_) => ErrorCategory::Permanent,
            VenueError::Unsupported(_) => ErrorCategory::Permanent,
            VenueError::RateLimited { .. } => ErrorCategory::ResourceExhausted,
            VenueError::Signing(_) => ErrorCategory::Permanent,
            VenueError::Parse(_) => ErrorCategory::Permanent,
            VenueError::Configuration(_) => ErrorCategory::Configuration,
            VenueError::OrderNotFound(_) => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<std::time::Duration> {
        match self {
            VenueError::RateLimited { retry_after_ms } => {
                Some(std::time::Duration::from_millis(*retry_after_ms))
            }
            VenueError::Connection(_) => Some(std::time::Duration::from_secs(1)),
            VenueError::Timeout(_) => Some(std::time::Duration::from_millis(500)),
            _ => None,
        }
    }
}

impl VenueError {
    /// Validation error for a notional outside venue limits.
    pub fn size_out_of_bounds(notional: Decimal, min: Decimal, max: Decimal) -> Self {
        Self::SizeOutOfBounds { notional, min, max }
    }

    /// Insufficient balance carrying required vs. available amounts.
    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance {
            required,
            available,
        }
    }

    /// Rate limit with a suggested retry delay.
    pub fn rate_limited(retry_after: std::time::Duration) -> Self {
        Self::RateLimited {
            retry_after_ms: retry_after.as_millis() as u64,
        }
    }

    /// Returns true when the routing engine may fail over on this error.
    pub fn is_failover_eligible(&self) -> bool {
        self.is_transient()
    }

    /// Short machine-readable kind tag, used when tagging errors with the
    /// originating venue.
    pub fn kind(&self) -> &'static str {
        match self {
            VenueError::Validation(_) => "validation",
            VenueError::UnsupportedAsset(_) => "unsupported_asset",
            VenueError::SizeOutOfBounds { .. } => "size_out_of_bounds",
            VenueError::InsufficientBalance { .. } => "insufficient_balance",
            VenueError::Connection(_) => "connection",
            VenueError::Timeout(_) => "timeout",
            VenueError::Execution(_) => "execution",
            VenueError::Provider(_) => "provider",
            VenueError::Unsupported(_) => "unsupported",
            VenueError::RateLimited { .. } => "rate_limited",
            VenueError::Signing(_) => "signing",
            VenueError::Parse(_) => "parse",
            VenueError::Configuration(_) => "configuration",
            VenueError::OrderNotFound(_) => "order_not_found",
        }
    }
}

/// Map a reqwest transport failure to the venue error taxonomy.
impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VenueError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            VenueError::Connection(err.to_string())
        } else if err.is_decode() {
            VenueError::Parse(err.to_string())
        } else {
            VenueError::Provider(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(err: serde_json::Error) -> Self {
        VenueError::Parse(err.to_string())
    }
}
