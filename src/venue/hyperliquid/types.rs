//! Hyperliquid API payload types.
//!
//! The venue exposes two endpoints: `/info` for unauthenticated queries and
//! `/exchange` for signed actions. Numeric fields arrive as JSON strings;
//! `Decimal`'s serde impl accepts both forms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body for `/info` queries.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<u64>,
}

impl InfoRequest {
    pub fn of(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            coin: None,
            user: None,
            oid: None,
        }
    }

    pub fn with_coin(mut self, coin: &str) -> Self {
        self.coin = Some(coin.to_string());
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_oid(mut self, oid: u64) -> Self {
        self.oid = Some(oid);
        self
    }
}

/// All mid prices keyed by coin.
pub type AllMids = HashMap<String, Decimal>;

/// One tradeable asset in the venue's universe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseAsset {
    pub name: String,
    /// Number of decimal places sizes must be rounded to
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: Option<u32>,
}

/// Venue asset metadata (the "universe").
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<UniverseAsset>,
}

/// Per-asset market context paired with the universe in `metaAndAssetCtxs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    #[serde(default)]
    pub funding: Option<Decimal>,
    #[serde(default)]
    pub mark_px: Option<Decimal>,
}

/// One level in the L2 book: price, size, order count.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Level {
    pub px: Decimal,
    pub sz: Decimal,
    #[serde(default)]
    pub n: u32,
}

/// L2 book response: `levels[0]` bids, `levels[1]` asks.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Book {
    pub coin: String,
    pub levels: Vec<Vec<L2Level>>,
}

/// Margin summary inside the clearinghouse state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
    pub total_margin_used: Decimal,
    #[serde(default)]
    pub total_ntl_pos: Option<Decimal>,
}

/// Leverage detail on a position.
#[derive(Debug, Clone, Deserialize)]
pub struct LeverageInfo {
    pub value: Decimal,
}

/// One raw position entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub coin: String,
    /// Signed size: positive long, negative short
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    #[serde(default)]
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Decimal,
    pub leverage: LeverageInfo,
}

/// Wrapper the venue puts around each position.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: RawPosition,
}

/// Account state from `clearinghouseState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub margin_summary: MarginSummary,
    pub asset_positions: Vec<AssetPosition>,
    pub withdrawable: Decimal,
}

/// Signed request body for `/exchange`.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    pub action: serde_json::Value,
    pub nonce: u64,
    pub signature: String,
}

/// Top-level `/exchange` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    #[serde(default)]
    pub response: Option<ExchangeResponseBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponseBody {
    #[serde(default)]
    pub data: Option<ExchangeResponseData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponseData {
    #[serde(default)]
    pub statuses: Vec<OrderStatusEntry>,
}

/// Per-order status inside an exchange response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatusEntry {
    /// Order fully filled on arrival
    Filled(FilledStatus),
    /// Order resting on the book
    Resting(RestingStatus),
    /// Venue rejected the order
    Error(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledStatus {
    pub oid: u64,
    pub total_sz: Decimal,
    pub avg_px: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingStatus {
    pub oid: u64,
}

/// Response for an `orderStatus` info query.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusResponse {
    pub status: String,
    #[serde(default)]
    pub order: Option<OrderStatusDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusDetail {
    /// "open", "filled", "canceled", "rejected" or "marginCanceled"
    pub status: String,
}
