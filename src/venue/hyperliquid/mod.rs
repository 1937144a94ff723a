//! Hyperliquid venue adapter (EVM perpetuals).
//!
//! Mutating calls are message-signed actions produced with the
//! wallet-signing collaborator; asset metadata is cached with a TTL.

mod types;
mod venue;

pub use venue::HyperliquidVenue;
