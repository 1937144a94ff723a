//! Strike REST API payload types.
//!
//! Field names follow the venue's camelCase JSON convention; everything is
//! normalized into the venue-agnostic types before leaving the adapter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for building an unsigned open-position transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    /// Bech32 wallet address that will witness the transaction
    pub address: String,
    /// Asset ticker
    pub asset: String,
    /// "Long" or "Short"
    pub position: String,
    /// Collateral committed, in native units
    pub collateral_amount: Decimal,
    /// Leverage multiplier
    pub leverage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_price: Option<Decimal>,
    /// Client-assigned idempotency token
    pub client_request_id: String,
}

/// Unsigned transaction returned by the position-building endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTxResponse {
    /// CBOR-encoded unsigned transaction, hex
    pub cbor_hex: String,
}

/// Request body for submitting a witnessed transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTxRequest {
    /// Witnessed transaction, hex
    pub signed_tx: String,
}

/// Response from transaction submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTxResponse {
    /// On-chain transaction hash; doubles as the venue order id
    pub tx_hash: String,
    /// Fill price reported at settlement, if already known
    #[serde(default)]
    pub executed_price: Option<Decimal>,
}

/// Settlement status of a submitted transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusResponse {
    pub tx_hash: String,
    /// "confirmed", "pending" or "failed"
    pub status: String,
}

/// One open position as reported by the venue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikePosition {
    pub asset: String,
    /// "Long" or "Short"
    pub position: String,
    pub position_size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    #[serde(default)]
    pub realized_pnl: Decimal,
    pub collateral_amount: Decimal,
    pub leverage: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// Account collateral summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeAccountInfo {
    pub total_collateral: Decimal,
    pub available_collateral: Decimal,
    pub margin_used: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Market summary for one asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeMarketInfo {
    pub asset: String,
    pub mark_price: Decimal,
    /// Hourly borrow/funding rate, when the market charges one
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
}

/// One side of the venue's depth response: `[price, size]` pairs.
pub type DepthLevels = Vec<(Decimal, Decimal)>;

/// Market depth for one asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeDepthResponse {
    pub asset: String,
    pub bids: DepthLevels,
    pub asks: DepthLevels,
}

/// Request body for collateral transfers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralRequest {
    pub address: String,
    pub amount: Decimal,
    /// "deposit" or "withdraw"
    pub direction: String,
}
