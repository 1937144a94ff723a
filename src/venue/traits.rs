//! Venue capability contract.
//!
//! The contract is split into focused traits so callers can depend on only
//! the capabilities they use:
//!
//! - [`VenueIdentity`]: name, chain kind, asset support
//! - [`OrderExecution`]: place / cancel / query orders
//! - [`AccountAccess`]: positions, margin state, collateral transfers
//! - [`MarketData`]: order book, mid price, funding rate
//! - [`VenueProbe`]: health probe and rolling metrics
//! - [`TradingVenue`]: blanket-combined trait for full-featured venues
//!
//! Every operation reports failures as a tagged [`VenueError`], never a
//! panic or a silent no-op.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::VenueResult;
use super::types::{
    AccountState, ChainKind, OrderBookSnapshot, OrderIntent, OrderLifecycle, OrderResult,
    Position, VenueConfig, VenueMetrics,
};

/// Identity and static capability information for one venue.
pub trait VenueIdentity: Send + Sync {
    /// The venue's immutable configuration.
    fn config(&self) -> &VenueConfig;

    /// Unique venue name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Chain family the venue settles on.
    fn chain_kind(&self) -> ChainKind {
        self.config().chain
    }

    /// Whether this venue can trade the given asset.
    fn supports_asset(&self, asset: &str) -> bool {
        self.config().supports_asset(asset)
    }

    /// All assets this venue can trade.
    fn supported_assets(&self) -> Vec<String> {
        self.config().supported_assets.clone()
    }
}

/// Order lifecycle operations.
#[async_trait]
pub trait OrderExecution: VenueIdentity {
    /// Place an order.
    ///
    /// The returned [`OrderResult`] carries the venue-assigned order id and
    /// the lifecycle status at acknowledgement time. Adapters whose
    /// execution model settles immediately may return `Filled` directly;
    /// that collapse is documented per adapter.
    async fn place_order(&self, intent: &OrderIntent) -> VenueResult<OrderResult>;

    /// Cancel an order by venue-assigned id.
    ///
    /// Cancellation is best-effort: the venue may have already committed
    /// the order by the time the cancel arrives. Venues that cannot cancel
    /// post-settlement must return
    /// [`VenueError::Unsupported`](super::error::VenueError::Unsupported)
    /// rather than silently succeeding.
    async fn cancel_order(&self, order_id: &str) -> VenueResult<()>;

    /// Query an order's lifecycle status by venue-assigned id.
    async fn order_status(&self, order_id: &str) -> VenueResult<OrderLifecycle>;
}

/// Position and collateral queries.
#[async_trait]
pub trait AccountAccess: VenueIdentity {
    /// The open position for one asset, if any.
    async fn position(&self, asset: &str) -> VenueResult<Option<Position>>;

    /// All open positions on this venue.
    async fn positions(&self) -> VenueResult<Vec<Position>>;

    /// Account-level margin and collateral state.
    async fn account_state(&self) -> VenueResult<AccountState>;

    /// Move collateral onto the venue.
    async fn deposit_collateral(&self, amount: Decimal) -> VenueResult<()>;

    /// Move collateral off the venue.
    async fn withdraw_collateral(&self, amount: Decimal) -> VenueResult<()>;
}

/// Market data queries used by the cost estimator and shadow comparator.
#[async_trait]
pub trait MarketData: VenueIdentity {
    /// Order book snapshot with up to `depth` levels per side.
    async fn order_book(&self, asset: &str, depth: usize) -> VenueResult<OrderBookSnapshot>;

    /// Mid price for one asset.
    async fn mid_price(&self, asset: &str) -> VenueResult<Decimal>;

    /// Current funding rate for one asset, when the venue reports one.
    ///
    /// Venues without funding (spot-like settlement) return `Ok(None)`.
    async fn funding_rate(&self, asset: &str) -> VenueResult<Option<Decimal>>;
}

/// Health probing and rolling performance counters.
#[async_trait]
pub trait VenueProbe: VenueIdentity {
    /// Lightweight liveness probe; returns observed round-trip latency.
    async fn health_probe(&self) -> VenueResult<Duration>;

    /// Rolling performance counters for this adapter.
    fn metrics(&self) -> VenueMetrics;
}

/// Combined trait for full-featured trading venues.
///
/// Venues implementing all capability traits can be used interchangeably
/// through `Arc<dyn TradingVenue>`.
pub trait TradingVenue:
    OrderExecution + AccountAccess + MarketData + VenueProbe
{
}

impl<T> TradingVenue for T where T: OrderExecution + AccountAccess + MarketData + VenueProbe {}
