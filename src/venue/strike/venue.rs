//! Strike execution venue implementation (Cardano perpetuals).
//!
//! Strike settles every action as an on-chain Cardano transaction: the
//! adapter asks the venue for an unsigned transaction body, hands it to the
//! wallet-signing collaborator, and submits the witnessed result.
//!
//! # Lifecycle collapse
//!
//! Strike has no resting order book. A position opens the moment the
//! settlement transaction confirms, so accepted orders report
//! `Pending → Filled` in one hop. `cancel_order` is not meaningful after
//! settlement and always reports `Unsupported` — never a silent no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

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
    CollateralRequest, OpenPositionRequest, StrikeAccountInfo, StrikeDepthResponse,
    StrikeMarketInfo, StrikePosition, SubmitTxRequest, SubmitTxResponse, TxStatusResponse,
    UnsignedTxResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Strike perpetuals venue (Cardano chain).
pub struct StrikeVenue {
    config: VenueConfig,
    http: reqwest::Client,
    signer: Arc<dyn WalletSigner>,
    limiter: RateLimiter,
    recorder: CallRecorder,
}

impl StrikeVenue {
    /// Create a Strike adapter from configuration and a wallet signer.
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
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> VenueResult<T> {
        self.limiter.acquire().await;
        let started = Instant::now();
        let result: VenueResult<T> = async {
            let resp = self
                .http
                .get(self.url(path))
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

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> VenueResult<T> {
        self.limiter.acquire().await;
        let started = Instant::now();
        let result: VenueResult<T> = async {
            let resp = self
                .http
                .post(self.url(path))
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

    fn validate_intent(&self, intent: &OrderIntent) -> VenueResult<()> {
        if !self.config.supports_asset(&intent.asset) {
            return Err(VenueError::UnsupportedAsset(intent.asset.clone()));
        }
        if intent.size <= Decimal::ZERO {
            return Err(VenueError::Validation("order size must be positive".to_string()));
        }
        if intent.kind == OrderKind::Limit && !self.config.supports_limit_orders {
            return Err(VenueError::Unsupported(
                "limit orders are not supported on this venue".to_string(),
            ));
        }
        if intent.kind.requires_price() && intent.limit_price.is_none() {
            return Err(VenueError::Validation("limit order requires a price".to_string()));
        }
        Ok(())
    }

    fn check_size_bounds(&self, notional_usd: Decimal) -> VenueResult<()> {
        if !self.config.accepts_notional(notional_usd) {
            return Err(VenueError::size_out_of_bounds(
                notional_usd,
                self.config.min_order_usd,
                self.config.max_order_usd,
            ));
        }
        Ok(())
    }

    /// Build, sign and submit one settlement transaction.
    async fn sign_and_submit(&self, cbor_hex: String) -> VenueResult<SubmitTxResponse> {
        let payload = SigningPayload::CardanoTransaction { cbor_hex };
        let signature = self.signer.sign(&payload).await?;
        self.post_json(
            "/api/perpetuals/submit",
            &SubmitTxRequest {
                signed_tx: signature.signature,
            },
        )
        .await
    }

    fn normalize_position(&self, p: &StrikePosition) -> Position {
        let side = if p.position.eq_ignore_ascii_case("long") {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        Position {
            venue: self.config.name.clone(),
            asset: p.asset.clone(),
            side,
            size: p.position_size,
            entry_price: p.entry_price,
            mark_price: p.mark_price,
            liquidation_price: p.liquidation_price,
            unrealized_pnl: p.unrealized_pnl,
            realized_pnl: p.realized_pnl,
            margin_used: p.collateral_amount,
            leverage: p.leverage,
            opened_at: p.opened_at,
        }
    }
}

impl VenueIdentity for StrikeVenue {
    fn config(&self) -> &VenueConfig {
        &self.config
    }
}

#[async_trait]
impl OrderExecution for StrikeVenue {
    async fn place_order(&self, intent: &OrderIntent) -> VenueResult<OrderResult> {
        self.validate_intent(intent)?;

        let mark = self.mid_price(&intent.asset).await?;
        self.check_size_bounds(intent.notional_at(mark))?;

        let client_request_id = intent
            .client_order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let request = OpenPositionRequest {
            address: self.signer.address().to_string(),
            asset: intent.asset.clone(),
            position: match intent.side {
                OrderSide::Buy => "Long".to_string(),
                OrderSide::Sell => "Short".to_string(),
            },
            collateral_amount: intent.size,
            leverage: 1,
            stop_loss_price: intent.stop_loss,
            take_profit_price: intent.take_profit,
            client_request_id,
        };

        let unsigned: UnsignedTxResponse = self
            .post_json("/api/perpetuals/open-position", &request)
            .await?;

        let submitted = self.sign_and_submit(unsigned.cbor_hex).await?;

        info!(
            venue = %self.config.name,
            asset = %intent.asset,
            tx = %submitted.tx_hash,
            "position opened on settlement"
        );

        // Settlement opens the position directly: pending collapses to filled.
        Ok(OrderResult {
            success: true,
            venue: self.config.name.clone(),
            order_id: Some(submitted.tx_hash),
            status: OrderLifecycle::Filled,
            filled_size: intent.size,
            avg_fill_price: Some(submitted.executed_price.unwrap_or(mark)),
            error: None,
            executed_at: Utc::now(),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> VenueResult<()> {
        debug!(venue = %self.config.name, order_id, "cancel requested on settlement venue");
        Err(VenueError::Unsupported(
            "orders settle on-chain and cannot be cancelled post-settlement".to_string(),
        ))
    }

    async fn order_status(&self, order_id: &str) -> VenueResult<OrderLifecycle> {
        let status: TxStatusResponse = self
            .get_json(&format!("/api/perpetuals/transaction/{order_id}"))
            .await?;

        match status.status.as_str() {
            "confirmed" => Ok(OrderLifecycle::Filled),
            "pending" => Ok(OrderLifecycle::Pending),
            "failed" => Ok(OrderLifecycle::Rejected),
            other => Err(VenueError::Parse(format!("unknown tx status: {other}"))),
        }
    }
}

#[async_trait]
impl AccountAccess for StrikeVenue {
    async fn position(&self, asset: &str) -> VenueResult<Option<Position>> {
        let positions = self.positions().await?;
        Ok(positions.into_iter().find(|p| p.asset == asset))
    }

    async fn positions(&self) -> VenueResult<Vec<Position>> {
        let raw: Vec<StrikePosition> = self
            .get_json(&format!(
                "/api/perpetuals/positions?address={}",
                self.signer.address()
            ))
            .await?;
        Ok(raw.iter().map(|p| self.normalize_position(p)).collect())
    }

    async fn account_state(&self) -> VenueResult<AccountState> {
        let info: StrikeAccountInfo = self
            .get_json(&format!(
                "/api/perpetuals/account?address={}",
                self.signer.address()
            ))
            .await?;
        Ok(AccountState {
            venue: self.config.name.clone(),
            total_collateral: info.total_collateral,
            available_collateral: info.available_collateral,
            margin_used: info.margin_used,
            unrealized_pnl: info.unrealized_pnl,
        })
    }

    async fn deposit_collateral(&self, amount: Decimal) -> VenueResult<()> {
        self.transfer_collateral(amount, "deposit").await
    }

    async fn withdraw_collateral(&self, amount: Decimal) -> VenueResult<()> {
        self.transfer_collateral(amount, "withdraw").await
    }
}

impl StrikeVenue {
    async fn transfer_collateral(&self, amount: Decimal, direction: &str) -> VenueResult<()> {
        if amount <= Decimal::ZERO {
            return Err(VenueError::Validation("transfer amount must be positive".to_string()));
        }
        let request = CollateralRequest {
            address: self.signer.address().to_string(),
            amount,
            direction: direction.to_string(),
        };
        let unsigned: UnsignedTxResponse = self
            .post_json("/api/perpetuals/collateral", &request)
            .await?;
        let submitted = self.sign_and_submit(unsigned.cbor_hex).await?;
        info!(
            venue = %self.config.name,
            tx = %submitted.tx_hash,
            %direction,
            "collateral transfer settled"
        );
        Ok(())
    }
}

#[async_trait]
impl MarketData for StrikeVenue {
    async fn order_book(&self, asset: &str, depth: usize) -> VenueResult<OrderBookSnapshot> {
        if !self.config.supports_asset(asset) {
            return Err(VenueError::UnsupportedAsset(asset.to_string()));
        }
        let raw: StrikeDepthResponse = self
            .get_json(&format!("/api/perpetuals/market/{asset}/depth"))
            .await?;

        let to_levels = |levels: &[(Decimal, Decimal)]| {
            levels
                .iter()
                .take(depth)
                .map(|(price, size)| BookLevel::new(*price, *size))
                .collect::<Vec<_>>()
        };

        Ok(OrderBookSnapshot {
            asset: raw.asset,
            venue: self.config.name.clone(),
            bids: to_levels(&raw.bids),
            asks: to_levels(&raw.asks),
            captured_at: Utc::now(),
        })
    }

    async fn mid_price(&self, asset: &str) -> VenueResult<Decimal> {
        let info: StrikeMarketInfo = self
            .get_json(&format!("/api/perpetuals/market/{asset}"))
            .await?;
        Ok(info.mark_price)
    }

    async fn funding_rate(&self, asset: &str) -> VenueResult<Option<Decimal>> {
        let info: StrikeMarketInfo = self
            .get_json(&format!("/api/perpetuals/market/{asset}"))
            .await?;
        Ok(info.funding_rate)
    }
}

#[async_trait]
impl VenueProbe for StrikeVenue {
    async fn health_probe(&self) -> VenueResult<Duration> {
        let started = Instant::now();
        let _: Vec<StrikeMarketInfo> = self.get_json("/api/perpetuals/markets").await?;
        Ok(started.elapsed())
    }

    fn metrics(&self) -> VenueMetrics {
        self.recorder.snapshot()
    }
}
