//! Venue-agnostic domain types.
//!
//! These types provide a common vocabulary for all trading venues,
//! abstracting away venue-specific details:
//! - `VenueConfig` - immutable identity and operating limits for one venue
//! - `OrderIntent` - a venue-agnostic order request
//! - `OrderResult` / `OrderLifecycle` - execution outcome and state machine
//! - `Position` / `AccountState` - per-venue exposure and margin
//! - `OrderBookSnapshot` - depth snapshot used by the cost estimator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain family a venue settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainKind {
    /// Cardano (eUTxO settlement, wallet-signed transactions)
    Cardano,
    /// EVM-compatible chain (message-signed actions)
    Evm,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Cardano => write!(f, "CARDANO"),
            ChainKind::Evm => write!(f, "EVM"),
        }
    }
}

/// Fee schedule for one venue.
///
/// Rates are fractions of notional (0.001 = 0.1%), not basis points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee rate for liquidity-providing (resting) orders
    pub maker_rate: Decimal,
    /// Fee rate for liquidity-consuming (immediate) orders
    pub taker_rate: Decimal,
    /// Fixed network/settlement fee per order in quote currency, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_fee: Option<Decimal>,
}

impl FeeSchedule {
    /// Create a schedule with identical maker and taker rates.
    pub fn flat(rate: Decimal) -> Self {
        Self {
            maker_rate: rate,
            taker_rate: rate,
            network_fee: None,
        }
    }

    /// Attach a fixed per-order network fee.
    pub fn with_network_fee(mut self, fee: Decimal) -> Self {
        self.network_fee = Some(fee);
        self
    }

    /// Rate applied to an order of the given kind.
    pub fn rate_for(&self, kind: OrderKind) -> Decimal {
        match kind {
            OrderKind::Market => self.taker_rate,
            OrderKind::Limit => self.maker_rate,
        }
    }
}

/// Immutable identity and operating limits for one venue.
///
/// Created at startup from static configuration and never mutated after
/// load. Mutable state (health, rolling metrics) lives in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Unique venue name (e.g. "strike", "hyperliquid")
    pub name: String,
    /// Chain family the venue settles on
    pub chain: ChainKind,
    /// Base API endpoint
    pub endpoint: String,
    /// Assets this venue can trade
    pub supported_assets: Vec<String>,
    /// Minimum order notional in USD
    pub min_order_usd: Decimal,
    /// Maximum order notional in USD
    pub max_order_usd: Decimal,
    /// Fee schedule
    pub fees: FeeSchedule,
    /// Maximum leverage offered
    pub max_leverage: u32,
    /// Whether resting orders can be cancelled post-submission
    pub supports_cancel: bool,
    /// Whether the venue accepts limit orders
    pub supports_limit_orders: bool,
    /// Operator-forced maintenance flag; excludes the venue from routing
    #[serde(default)]
    pub maintenance: bool,
    /// Outbound request budget, requests per second
    pub rate_limit_per_sec: u32,
}

impl VenueConfig {
    /// Check whether an asset is tradeable on this venue.
    pub fn supports_asset(&self, asset: &str) -> bool {
        self.supported_assets.iter().any(|a| a == asset)
    }

    /// Check whether a notional value falls within this venue's size limits.
    pub fn accepts_notional(&self, notional_usd: Decimal) -> bool {
        notional_usd >= self.min_order_usd && notional_usd <= self.max_order_usd
    }
}

/// Order side indicating buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy / long
    Buy,
    /// Sell / short
    Sell,
}

impl OrderSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Sign convention used for net exposure: buy +1, sell -1
    pub fn sign(&self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => -Decimal::ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind determining execution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Execute immediately at best available price
    Market,
    /// Execute at the specified price or better
    Limit,
}

impl OrderKind {
    /// Returns true if this kind requires a limit price
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderKind::Limit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

/// A venue-agnostic order request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Asset identifier (e.g. "ADA", "SOL")
    pub asset: String,
    /// Buy or sell
    pub side: OrderSide,
    /// Market or limit
    pub kind: OrderKind,
    /// Order size in native units of the asset
    pub size: Decimal,
    /// Limit price, required for limit orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Optional stop-loss trigger price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// Optional take-profit trigger price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// Client-assigned idempotency token; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl OrderIntent {
    /// Create a market order intent.
    pub fn market(asset: impl Into<String>, side: OrderSide, size: Decimal) -> Self {
        Self {
            asset: asset.into(),
            side,
            kind: OrderKind::Market,
            size,
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            client_order_id: None,
        }
    }

    /// Create a limit order intent.
    pub fn limit(
        asset: impl Into<String>,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            asset: asset.into(),
            side,
            kind: OrderKind::Limit,
            size,
            limit_price: Some(price),
            stop_loss: None,
            take_profit: None,
            client_order_id: None,
        }
    }

    /// Attach a client-assigned idempotency token.
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Attach a stop-loss trigger.
    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// Attach a take-profit trigger.
    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// Notional value at the given reference price.
    pub fn notional_at(&self, price: Decimal) -> Decimal {
        self.size * price
    }
}

/// Order lifecycle state.
///
/// State transitions:
/// ```text
/// Pending ─┬→ Open ─┬→ Filled
///          │        ├→ PartiallyFilled ─┬→ Filled
///          │        │                   ├→ Cancelled
///          │        │                   └→ Expired
///          │        ├→ Cancelled
///          │        └→ Expired
///          └→ Rejected
/// ```
///
/// `Filled`, `Cancelled`, `Rejected` and `Expired` are terminal. A venue
/// whose execution model opens positions immediately on settlement (no
/// resting order book) collapses `Pending → Filled` in one hop; that
/// collapse is documented on the adapter, never assumed generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderLifecycle {
    /// Submitted, not yet acknowledged by the venue
    Pending,
    /// Resting on the venue's book
    Open,
    /// Rejected by the venue (terminal)
    Rejected,
    /// Partially filled, remainder still working
    PartiallyFilled,
    /// Completely filled (terminal)
    Filled,
    /// Cancelled (terminal)
    Cancelled,
    /// Expired unfilled (terminal)
    Expired,
}

impl OrderLifecycle {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderLifecycle::Filled
                | OrderLifecycle::Cancelled
                | OrderLifecycle::Rejected
                | OrderLifecycle::Expired
        )
    }

    /// Returns true if the order is still working
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderLifecycle::Pending | OrderLifecycle::Open | OrderLifecycle::PartiallyFilled
        )
    }

    /// Check if a transition from this status to `target` is valid.
    pub fn can_transition_to(&self, target: OrderLifecycle) -> bool {
        match self {
            OrderLifecycle::Pending => matches!(
                target,
                OrderLifecycle::Open | OrderLifecycle::Rejected | OrderLifecycle::Filled
            ),
            OrderLifecycle::Open => matches!(
                target,
                OrderLifecycle::Filled
                    | OrderLifecycle::PartiallyFilled
                    | OrderLifecycle::Cancelled
                    | OrderLifecycle::Expired
            ),
            OrderLifecycle::PartiallyFilled => matches!(
                target,
                OrderLifecycle::Filled | OrderLifecycle::Cancelled | OrderLifecycle::Expired
            ),
            OrderLifecycle::Filled
            | OrderLifecycle::Cancelled
            | OrderLifecycle::Rejected
            | OrderLifecycle::Expired => false,
        }
    }
}

impl fmt::Display for OrderLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderLifecycle::Pending => write!(f, "PENDING"),
            OrderLifecycle::Open => write!(f, "OPEN"),
            OrderLifecycle::Rejected => write!(f, "REJECTED"),
            OrderLifecycle::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderLifecycle::Filled => write!(f, "FILLED"),
            OrderLifecycle::Cancelled => write!(f, "CANCELLED"),
            OrderLifecycle::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Outcome of a real order execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// Whether the order reached the venue and was accepted
    pub success: bool,
    /// Venue the order was executed against
    pub venue: String,
    /// Venue-assigned order id, when one was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Lifecycle status at the time the result was produced
    pub status: OrderLifecycle,
    /// Filled size in native units
    pub filled_size: Decimal,
    /// Average fill price across all fills
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_fill_price: Option<Decimal>,
    /// Tagged error when unsuccessful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<super::error::VenueError>,
    /// When the result was produced
    pub executed_at: DateTime<Utc>,
}

impl OrderResult {
    /// Build a fill result.
    pub fn filled(
        venue: impl Into<String>,
        order_id: impl Into<String>,
        size: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            success: true,
            venue: venue.into(),
            order_id: Some(order_id.into()),
            status: OrderLifecycle::Filled,
            filled_size: size,
            avg_fill_price: Some(price),
            error: None,
            executed_at: Utc::now(),
        }
    }

    /// Build a rejection result carrying the venue's error.
    pub fn rejected(venue: impl Into<String>, error: super::error::VenueError) -> Self {
        Self {
            success: false,
            venue: venue.into(),
            order_id: None,
            status: OrderLifecycle::Rejected,
            filled_size: Decimal::ZERO,
            avg_fill_price: None,
            error: Some(error),
            executed_at: Utc::now(),
        }
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    /// Long exposure
    Long,
    /// Short exposure
    Short,
}

impl PositionSide {
    /// Sign convention for net exposure: long +1, short -1
    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => -Decimal::ONE,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// One open position on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Venue holding the position
    pub venue: String,
    /// Asset identifier
    pub asset: String,
    /// Long or short
    pub side: PositionSide,
    /// Position size in native units (always positive; direction in `side`)
    pub size: Decimal,
    /// Average entry price
    pub entry_price: Decimal,
    /// Current mark price
    pub mark_price: Decimal,
    /// Price at which the position is forcibly closed, if the venue reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<Decimal>,
    /// Unrealized P&L in quote currency
    pub unrealized_pnl: Decimal,
    /// Realized P&L in quote currency
    pub realized_pnl: Decimal,
    /// Margin allocated to this position
    pub margin_used: Decimal,
    /// Effective leverage (notional / margin)
    pub leverage: Decimal,
    /// When the position was opened
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Signed size: positive for long, negative for short.
    pub fn signed_size(&self) -> Decimal {
        self.size * self.side.sign()
    }

    /// Notional value at the current mark price.
    pub fn notional(&self) -> Decimal {
        self.size * self.mark_price
    }

    /// Distance to liquidation as a fraction of mark price, when known.
    ///
    /// `(mark - liquidation).abs() / mark`; smaller means closer to
    /// forced closure.
    pub fn liquidation_distance(&self) -> Option<Decimal> {
        let liq = self.liquidation_price?;
        if self.mark_price.is_zero() {
            return None;
        }
        Some(((self.mark_price - liq).abs()) / self.mark_price)
    }
}

/// Account-level margin and collateral state on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    /// Venue reporting the state
    pub venue: String,
    /// Total account collateral value in quote currency
    pub total_collateral: Decimal,
    /// Collateral not committed to open positions
    pub available_collateral: Decimal,
    /// Margin committed to open positions
    pub margin_used: Decimal,
    /// Unrealized P&L across all positions
    pub unrealized_pnl: Decimal,
}

/// A single price level in an order book snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available at this level
    pub size: Decimal,
}

impl BookLevel {
    /// Create a new book level.
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Notional value at this level.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Point-in-time order book snapshot for one asset on one venue.
///
/// Bids are sorted descending by price, asks ascending; the cost estimator
/// walks them in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Asset the book is for
    pub asset: String,
    /// Venue the book came from
    pub venue: String,
    /// Bid levels, best (highest) first
    pub bids: Vec<BookLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<BookLevel>,
    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    /// Best bid price, if any depth exists.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price, if any depth exists.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price between best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Levels consumed by an order of the given side (buys walk asks).
    pub fn levels_for(&self, side: OrderSide) -> &[BookLevel] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    /// Age of the snapshot relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }
}

/// Rolling performance counters reported by a venue adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueMetrics {
    /// Venue the metrics describe
    pub venue: String,
    /// Total calls observed
    pub total_calls: u64,
    /// Calls that failed
    pub failed_calls: u64,
    /// Exponentially weighted average call latency in milliseconds
    pub avg_latency_ms: f64,
    /// Timestamp of the most recent successful call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
}

impl VenueMetrics {
    /// Fresh counters for a venue.
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            total_calls: 0,
            failed_calls: 0,
            avg_latency_ms: 0.0,
            last_success: None,
        }
    }

    /// Fraction of calls that succeeded; 1.0 when no calls were observed.
    pub fn success_ratio(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        (self.total_calls - self.failed_calls) as f64 / self.total_calls as f64
    }
}
