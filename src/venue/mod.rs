//! Venue abstraction: the capability contract, shared domain types, and the
//! concrete venue adapters.

pub mod error;
pub mod hyperliquid;
pub mod metrics;
pub mod rate_limit;
pub mod signing;
pub mod strike;
pub mod traits;
pub mod types;

pub use error::{VenueError, VenueResult};
pub use signing::{Signature, SigningError, SigningPayload, WalletSigner};
pub use traits::{
    AccountAccess, MarketData, OrderExecution, TradingVenue, VenueIdentity, VenueProbe,
};
pub use types::{
    AccountState, BookLevel, ChainKind, FeeSchedule, OrderBookSnapshot, OrderIntent, OrderKind,
    OrderLifecycle, OrderResult, OrderSide, Position, PositionSide, VenueConfig, VenueMetrics,
};
