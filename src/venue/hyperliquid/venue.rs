//! Hyperliquid execution venue implementation (EVM perpetuals).
//!
//! Every mutating call is a signed action: the adapter builds a canonical
//! JSON action body, the wallet-signing collaborator signs it, and the
//! signed envelope goes to `/exchange`. Cancels are signed the same way.
//!
//! Asset metadata (size decimals, max leverage) is cached with a TTL —
//! the venue's universe changes infrequently and the metadata gates every
//! order, so refetching per order would burn the rate budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::venue::error::{VenueError, VenueResult};
use crate::venue::metrics::CallRecorder;
use crate::venue::rate_limit::RateLimiter;
use crate::venue::signing::{SigningPayload, WalletSigner};
use crate::venue::traits::{
    AccountAccess, MarketData, OrderExecution, VenueIdentity, VenueProbe,
};
use crate::venue::types::{
    AccountState, BookLevel, OrderBookSnapshot, OrderIntent, OrderKind, OrderLifecycle,
    OrderResult, OrderSide, Position, PositionSide, VenueConfig, VenueMetrics,
};

use super::types::{
    AllMids, AssetCtx, ClearinghouseState, ExchangeRequest, ExchangeResponse, InfoRequest,
    L2Book, Meta, OrderStatusEntry, OrderStatusResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long cached asset metadata stays valid.
const META_CACHE_TTL: Duration = Duration::from_secs(300);

/// Price band applied to market orders submitted as IOC limits: 1%.
fn market_order_band() -> Decimal {
    Decimal::new(1, 2)
}

struct CachedMeta {
    fetched_at: Instant,
    meta: Meta,
}

/// Hyperliquid perpetuals venue (EVM chain).
pub struct HyperliquidVenue {
    config: VenueConfig,
    http: reqwest::Client,
    signer: Arc<dyn WalletSigner>,
    limiter: RateLimiter,
    recorder: CallRecorder,
    meta_cache: Mutex<Option<CachedMeta>>,
    /// Venue order id -> coin, needed because cancels are per-asset
    order_coins: Mutex<HashMap<u64, String>>,
}

impl HyperliquidVenue {
    /// Create a Hyperliquid adapter from configuration and a wallet signer.
    pub fn new(config: VenueConfig, signer: Arc<dyn WalletSigner>) -> VenueResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VenueError::Configuration(format!("HTTP client: {e}")))?;

        let limiter = RateLimiter::per_second(config.rate_limit_per_sec);
        let recorder = CallRecorder::new(&config.name);

        Ok(Self {
            config,
            http,
            signer,
            limiter,
            recorder,
            meta_cache: Mutex::new(None),
            order_coins: Mutex::new(HashMap::new()),
        })
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> VenueResult<T> {
        self.limiter.acquire().await;
        let started = Instant::now();
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        let result: VenueResult<T> = async {
            let resp = self
                .http
                .post(url)
                .json(body)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| VenueError::Provider(e.to_string()))?;
            Ok(resp.json::<T>().await?)
        }
        .await;
        self.recorder.observe(result.is_ok(), started.elapsed());
        result
    }

    async fn info<T: DeserializeOwned>(&self, request: &InfoRequest) -> VenueResult<T> {
        self.post_json("/info", request).await
    }

    /// Asset metadata, served from the TTL cache when fresh.
    async fn meta(&self) -> VenueResult<Meta> {
        if let Some(cached) = self.meta_cache.lock().as_ref() {
            if cached.fetched_at.elapsed() < META_CACHE_TTL {
                return Ok(cached.meta.clone());
            }
        }

        let meta: Meta = self.info(&InfoRequest::of("meta")).await?;
        *self.meta_cache.lock() = Some(CachedMeta {
            fetched_at: Instant::now(),
            meta: meta.clone(),
        });
        debug!(venue = %self.config.name, assets = meta.universe.len(), "asset metadata refreshed");
        Ok(meta)
    }

    /// Universe index and size decimals for one coin.
    async fn asset_meta(&self, coin: &str) -> VenueResult<(usize, u32)> {
        let meta = self.meta().await?;
        meta.universe
            .iter()
            .position(|a| a.name == coin)
            .map(|idx| (idx, meta.universe[idx].sz_decimals))
            .ok_or_else(|| VenueError::UnsupportedAsset(coin.to_string()))
    }

    /// Sign an action and submit it to `/exchange`.
    async fn submit_action(&self, action: serde_json::Value) -> VenueResult<ExchangeResponse> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let payload = SigningPayload::EvmAction {
            action: action.clone(),
            nonce,
        };
        let signature = self.signer.sign(&payload).await?;

        let response: ExchangeResponse = self
            .post_json(
                "/exchange",
                &ExchangeRequest {
                    action,
                    nonce,
                    signature: signature.signature,
                },
            )
            .await?;

        if response.status != "ok" {
            return Err(VenueError::Provider(format!(
                "exchange call returned status {}",
                response.status
            )));
        }
        Ok(response)
    }

    fn validate_intent(&self, intent: &OrderIntent) -> VenueResult<()> {
        if !self.config.supports_asset(&intent.asset) {
            return Err(VenueError::UnsupportedAsset(intent.asset.clone()));
        }
        if intent.size <= Decimal::ZERO {
            return Err(VenueError::Validation("order size must be positive".to_string()));
        }
        if intent.kind.requires_price() && intent.limit_price.is_none() {
            return Err(VenueError::Validation("limit order requires a price".to_string()));
        }
        Ok(())
    }

    fn normalize_position(&self, raw: &super::types::RawPosition) -> Position {
        let side = if raw.szi >= Decimal::ZERO {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let size = raw.szi.abs();
        let entry = raw.entry_px.unwrap_or_default();
        // The venue does not report open time; stamped at observation.
        Position {
            venue: self.config.name.clone(),
            asset: raw.coin.clone(),
            side,
            size,
            entry_price: entry,
            mark_price: entry,
            liquidation_price: raw.liquidation_px,
            unrealized_pnl: raw.unrealized_pnl,
            realized_pnl: Decimal::ZERO,
            margin_used: raw.margin_used,
            leverage: raw.leverage.value,
            opened_at: Utc::now(),
        }
    }
}

impl VenueIdentity for HyperliquidVenue {
    fn config(&self) -> &VenueConfig {
        &self.config
    }
}

#[async_trait]
impl OrderExecution for HyperliquidVenue {
    async fn place_order(&self, intent: &OrderIntent) -> VenueResult<OrderResult> {
        self.validate_intent(intent)?;

        let (asset_index, sz_decimals) = self.asset_meta(&intent.asset).await?;
        let mid = self.mid_price(&intent.asset).await?;

        let notional = intent.notional_at(mid);
        if !self.config.accepts_notional(notional) {
            return Err(VenueError::size_out_of_bounds(
                notional,
                self.config.min_order_usd,
                self.config.max_order_usd,
            ));
        }

        // Sizes must honor the venue's per-asset decimal precision.
        let size = intent.size.round_dp(sz_decimals);
        if size.is_zero() {
            return Err(VenueError::Validation(format!(
                "size {} rounds to zero at {} decimals",
                intent.size, sz_decimals
            )));
        }

        // Market orders go out as IOC limits banded around the mid price.
        let band = market_order_band();
        let (price, tif) = match intent.kind {
            OrderKind::Market => {
                let banded = match intent.side {
                    OrderSide::Buy => mid * (Decimal::ONE + band),
                    OrderSide::Sell => mid * (Decimal::ONE - band),
                };
                (banded.round_dp(6), "Ioc")
            }
            OrderKind::Limit => (
                intent
                    .limit_price
                    .ok_or_else(|| VenueError::Validation("limit order requires a price".to_string()))?,
                "Gtc",
            ),
        };

        let action = json!({
            "type": "order",
            "orders": [{
                "a": asset_index,
                "b": intent.side == OrderSide::Buy,
                "p": price.to_string(),
                "s": size.to_string(),
                "r": false,
                "t": { "limit": { "tif": tif } },
            }],
            "grouping": "na",
        });

        let response = self.submit_action(action).await?;
        let status = response
            .response
            .and_then(|r| r.data)
            .and_then(|d| d.statuses.into_iter().next())
            .ok_or_else(|| VenueError::Parse("no order status in exchange response".to_string()))?;

        match status {
            OrderStatusEntry::Filled(fill) => {
                self.order_coins.lock().insert(fill.oid, intent.asset.clone());
                info!(
                    venue = %self.config.name,
                    asset = %intent.asset,
                    oid = fill.oid,
                    "order filled"
                );
                Ok(OrderResult {
                    success: true,
                    venue: self.config.name.clone(),
                    order_id: Some(fill.oid.to_string()),
                    status: OrderLifecycle::Filled,
                    filled_size: fill.total_sz,
                    avg_fill_price: Some(fill.avg_px),
                    error: None,
                    executed_at: Utc::now(),
                })
            }
            OrderStatusEntry::Resting(resting) => {
                self.order_coins.lock().insert(resting.oid, intent.asset.clone());
                Ok(OrderResult {
                    success: true,
                    venue: self.config.name.clone(),
                    order_id: Some(resting.oid.to_string()),
                    status: OrderLifecycle::Open,
                    filled_size: Decimal::ZERO,
                    avg_fill_price: None,
                    error: None,
                    executed_at: Utc::now(),
                })
            }
            OrderStatusEntry::Error(reason) => Err(VenueError::Execution(reason)),
        }
    }

    async fn cancel_order(&self, order_id: &str) -> VenueResult<()> {
        let oid: u64 = order_id
            .parse()
            .map_err(|_| VenueError::Validation(format!("invalid order id: {order_id}")))?;

        let coin = self
            .order_coins
            .lock()
            .get(&oid)
            .cloned()
            .ok_or_else(|| VenueError::OrderNotFound(order_id.to_string()))?;

        let (asset_index, _) = self.asset_meta(&coin).await?;

        let action = json!({
            "type": "cancel",
            "cancels": [{ "a": asset_index, "o": oid }],
        });

        self.submit_action(action).await?;
        self.order_coins.lock().remove(&oid);
        info!(venue = %self.config.name, oid, "order cancelled");
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> VenueResult<OrderLifecycle> {
        let oid: u64 = order_id
            .parse()
            .map_err(|_| VenueError::Validation(format!("invalid order id: {order_id}")))?;

        let response: OrderStatusResponse = self
            .info(
                &InfoRequest::of("orderStatus")
                    .with_user(self.signer.address())
                    .with_oid(oid),
            )
            .await?;

        let detail = response
            .order
            .ok_or_else(|| VenueError::OrderNotFound(order_id.to_string()))?;

        match detail.status.as_str() {
            "open" => Ok(OrderLifecycle::Open),
            "filled" => Ok(OrderLifecycle::Filled),
            "canceled" | "marginCanceled" => Ok(OrderLifecycle::Cancelled),
            "rejected" => Ok(OrderLifecycle::Rejected),
            "expired" => Ok(OrderLifecycle::Expired),
            other => Err(VenueError::Parse(format!("unknown order status: {other}"))),
        }
    }
}

#[async_trait]
impl AccountAccess for HyperliquidVenue {
    async fn position(&self, asset: &str) -> VenueResult<Option<Position>> {
        let positions = self.positions().await?;
        Ok(positions.into_iter().find(|p| p.asset == asset))
    }

    async fn positions(&self) -> VenueResult<Vec<Position>> {
        let state: ClearinghouseState = self
            .info(&InfoRequest::of("clearinghouseState").with_user(self.signer.address()))
            .await?;

        let mut positions: Vec<Position> = state
            .asset_positions
            .iter()
            .filter(|p| !p.position.szi.is_zero())
            .map(|p| self.normalize_position(&p.position))
            .collect();

        // Enrich mark prices from the mids map in one call.
        if !positions.is_empty() {
            let mids: AllMids = self.info(&InfoRequest::of("allMids")).await?;
            for position in &mut positions {
                if let Some(mark) = mids.get(&position.asset) {
                    position.mark_price = *mark;
                }
            }
        }

        Ok(positions)
    }

    async fn account_state(&self) -> VenueResult<AccountState> {
        let state: ClearinghouseState = self
            .info(&InfoRequest::of("clearinghouseState").with_user(self.signer.address()))
            .await?;

        let unrealized_pnl: Decimal = state
            .asset_positions
            .iter()
            .map(|p| p.position.unrealized_pnl)
            .sum();

        Ok(AccountState {
            venue: self.config.name.clone(),
            total_collateral: state.margin_summary.account_value,
            available_collateral: state.withdrawable,
            margin_used: state.margin_summary.total_margin_used,
            unrealized_pnl,
        })
    }

    async fn deposit_collateral(&self, _amount: Decimal) -> VenueResult<()> {
        // Deposits enter through the chain bridge contract, outside the
        // venue API surface.
        Err(VenueError::Unsupported(
            "deposits are made via the chain bridge, not the venue API".to_string(),
        ))
    }

    async fn withdraw_collateral(&self, amount: Decimal) -> VenueResult<()> {
        if amount <= Decimal::ZERO {
            return Err(VenueError::Validation("transfer amount must be positive".to_string()));
        }

        let state = self.account_state().await?;
        if amount > state.available_collateral {
            return Err(VenueError::insufficient_balance(
                amount,
                state.available_collateral,
            ));
        }

        let action = json!({
            "type": "withdraw3",
            "destination": self.signer.address(),
            "amount": amount.to_string(),
        });
        self.submit_action(action).await?;
        info!(venue = %self.config.name, %amount, "withdrawal submitted");
        Ok(())
    }
}

#[async_trait]
impl MarketData for HyperliquidVenue {
    async fn order_book(&self, asset: &str, depth: usize) -> VenueResult<OrderBookSnapshot> {
        if !self.config.supports_asset(asset) {
            return Err(VenueError::UnsupportedAsset(asset.to_string()));
        }

        let book: L2Book = self.info(&InfoRequest::of("l2Book").with_coin(asset)).await?;

        let mut sides = book.levels.into_iter();
        let bids = sides.next().unwrap_or_default();
        let asks = sides.next().unwrap_or_default();

        let to_levels = |levels: Vec<super::types::L2Level>| {
            levels
                .into_iter()
                .take(depth)
                .map(|l| BookLevel::new(l.px, l.sz))
                .collect::<Vec<_>>()
        };

        Ok(OrderBookSnapshot {
            asset: book.coin,
            venue: self.config.name.clone(),
            bids: to_levels(bids),
            asks: to_levels(asks),
            captured_at: Utc::now(),
        })
    }

    async fn mid_price(&self, asset: &str) -> VenueResult<Decimal> {
        let mids: AllMids = self.info(&InfoRequest::of("allMids")).await?;
        mids.get(asset)
            .copied()
            .ok_or_else(|| VenueError::UnsupportedAsset(asset.to_string()))
    }

    async fn funding_rate(&self, asset: &str) -> VenueResult<Option<Decimal>> {
        // metaAndAssetCtxs pairs the universe with per-asset contexts by index.
        let (meta, ctxs): (Meta, Vec<AssetCtx>) =
            self.info(&InfoRequest::of("metaAndAssetCtxs")).await?;

        let index = meta
            .universe
            .iter()
            .position(|a| a.name == asset)
            .ok_or_else(|| VenueError::UnsupportedAsset(asset.to_string()))?;

        Ok(ctxs.get(index).and_then(|c| c.funding))
    }
}

#[async_trait]
impl VenueProbe for HyperliquidVenue {
    async fn health_probe(&self) -> VenueResult<Duration> {
        let started = Instant::now();
        let _: AllMids = self.info(&InfoRequest::of("allMids")).await?;
        Ok(started.elapsed())
    }

    fn metrics(&self) -> VenueMetrics {
        self.recorder.snapshot()
    }
}
