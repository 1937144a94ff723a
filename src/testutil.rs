//! Mock venue used by unit tests across modules.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::venue::{
    AccountState, BookLevel, ChainKind, FeeSchedule, OrderBookSnapshot, OrderIntent,
    OrderLifecycle, OrderResult, Position, VenueConfig, VenueError, VenueMetrics, VenueResult,
};
use crate::venue::traits::{
    AccountAccess, MarketData, OrderExecution, VenueIdentity, VenueProbe,
};

/// Scriptable in-memory venue.
///
/// Defaults: orders fill at the book mid, probes succeed in 10ms. Queue
/// explicit results to script failures.
pub struct MockVenue {
    config: VenueConfig,
    books: Mutex<HashMap<String, (Vec<BookLevel>, Vec<BookLevel>)>>,
    funding: Mutex<HashMap<String, Decimal>>,
    positions: Mutex<Vec<Position>>,
    place_results: Mutex<VecDeque<VenueResult<OrderResult>>>,
    probe_results: Mutex<VecDeque<VenueResult<Duration>>>,
    placed: Mutex<Vec<OrderIntent>>,
}

impl MockVenue {
    pub fn new(name: &str, assets: &[&str]) -> Self {
        let config = VenueConfig {
            name: name.to_string(),
            chain: ChainKind::Evm,
            endpoint: format!("https://{name}.example"),
            supported_assets: assets.iter().map(|a| a.to_string()).collect(),
            min_order_usd: Decimal::ONE,
            max_order_usd: Decimal::from(1_000_000),
            fees: FeeSchedule::flat(Decimal::new(5, 4)),
            max_leverage: 20,
            supports_cancel: true,
            supports_limit_orders: true,
            maintenance: false,
            rate_limit_per_sec: 0,
        };
        Self {
            config,
            books: Mutex::new(HashMap::new()),
            funding: Mutex::new(HashMap::new()),
            positions: Mutex::new(Vec::new()),
            place_results: Mutex::new(VecDeque::new()),
            probe_results: Mutex::new(VecDeque::new()),
            placed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.config.fees = fees;
        self
    }

    pub fn with_maintenance(mut self) -> Self {
        self.config.maintenance = true;
        self
    }

    pub fn with_size_limits(mut self, min: Decimal, max: Decimal) -> Self {
        self.config.min_order_usd = min;
        self.config.max_order_usd = max;
        self
    }

    pub fn with_book(
        self,
        asset: &str,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    ) -> Self {
        let to_levels =
            |side: Vec<(Decimal, Decimal)>| side.into_iter().map(|(p, s)| BookLevel::new(p, s)).collect();
        self.books
            .lock()
            .insert(asset.to_string(), (to_levels(bids), to_levels(asks)));
        self
    }

    pub fn with_funding(self, asset: &str, rate: Decimal) -> Self {
        self.funding.lock().insert(asset.to_string(), rate);
        self
    }

    pub fn with_position(self, position: Position) -> Self {
        self.positions.lock().push(position);
        self
    }

    pub fn queue_place_result(&self, result: VenueResult<OrderResult>) {
        self.place_results.lock().push_back(result);
    }

    pub fn queue_probe_result(&self, result: VenueResult<Duration>) {
        self.probe_results.lock().push_back(result);
    }

    pub fn placed_orders(&self) -> Vec<OrderIntent> {
        self.placed.lock().clone()
    }
}

impl VenueIdentity for MockVenue {
    fn config(&self) -> &VenueConfig {
        &self.config
    }
}

#[async_trait]
impl OrderExecution for MockVenue {
    async fn place_order(&self, intent: &OrderIntent) -> VenueResult<OrderResult> {
        self.placed.lock().push(intent.clone());
        if let Some(result) = self.place_results.lock().pop_front() {
            return result;
        }
        let mid = self.mid_price(&intent.asset).await?;
        Ok(OrderResult::filled(
            &self.config.name,
            format!("{}-{}", self.config.name, self.placed.lock().len()),
            intent.size,
            mid,
        ))
    }

    async fn cancel_order(&self, _order_id: &str) -> VenueResult<()> {
        Ok(())
    }

    async fn order_status(&self, _order_id: &str) -> VenueResult<OrderLifecycle> {
        Ok(OrderLifecycle::Filled)
    }
}

#[async_trait]
impl AccountAccess for MockVenue {
    async fn position(&self, asset: &str) -> VenueResult<Option<Position>> {
        Ok(self
            .positions
            .lock()
            .iter()
            .find(|p| p.asset == asset)
            .cloned())
    }

    async fn positions(&self) -> VenueResult<Vec<Position>> {
        Ok(self.positions.lock().clone())
    }

    async fn account_state(&self) -> VenueResult<AccountState> {
        Ok(AccountState {
            venue: self.config.name.clone(),
            total_collateral: Decimal::from(10_000),
            available_collateral: Decimal::from(8_000),
            margin_used: Decimal::from(2_000),
            unrealized_pnl: Decimal::ZERO,
        })
    }

    async fn deposit_collateral(&self, _amount: Decimal) -> VenueResult<()> {
        Ok(())
    }

    async fn withdraw_collateral(&self, _amount: Decimal) -> VenueResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MarketData for MockVenue {
    async fn order_book(&self, asset: &str, depth: usize) -> VenueResult<OrderBookSnapshot> {
        let books = self.books.lock();
        let (bids, asks) = books
            .get(asset)
            .ok_or_else(|| VenueError::UnsupportedAsset(asset.to_string()))?;
        Ok(OrderBookSnapshot {
            asset: asset.to_string(),
            venue: self.config.name.clone(),
            bids: bids.iter().take(depth).cloned().collect(),
            asks: asks.iter().take(depth).cloned().collect(),
            captured_at: Utc::now(),
        })
    }

    async fn mid_price(&self, asset: &str) -> VenueResult<Decimal> {
        let book = self.order_book(asset, 1).await?;
        book.mid_price()
            .ok_or_else(|| VenueError::Validation(format!("no book depth for {asset}")))
    }

    async fn funding_rate(&self, asset: &str) -> VenueResult<Option<Decimal>> {
        Ok(self.funding.lock().get(asset).copied())
    }
}

#[async_trait]
impl VenueProbe for MockVenue {
    async fn health_probe(&self) -> VenueResult<Duration> {
        if let Some(result) = self.probe_results.lock().pop_front() {
            return result;
        }
        Ok(Duration::from_millis(10))
    }

    fn metrics(&self) -> VenueMetrics {
        VenueMetrics::new(&self.config.name)
    }
}
