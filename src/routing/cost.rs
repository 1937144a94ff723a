//! Execution cost estimation.
//!
//! [`estimate_cost`] is a pure function of an order intent and a venue
//! snapshot — no hidden state, no I/O — so every component that prices an
//! order (live routing, shadow re-pricing, tests) shares one implementation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::venue::{
    FeeSchedule, OrderBookSnapshot, OrderIntent, VenueError, VenueResult,
};

/// Tunables for the cost model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModelConfig {
    /// Projected number of funding intervals a new position is held for
    pub funding_intervals: u32,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            funding_intervals: 1,
        }
    }
}

/// Point-in-time view of one venue, sufficient to price an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSnapshot {
    /// Venue the snapshot describes
    pub venue: String,
    /// Venue fee schedule
    pub fees: FeeSchedule,
    /// Order book snapshot
    pub book: OrderBookSnapshot,
    /// Current funding rate, when the venue reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_rate: Option<Decimal>,
    /// Observed average call latency in milliseconds
    pub avg_latency_ms: f64,
    /// When the snapshot was assembled
    pub captured_at: DateTime<Utc>,
}

/// Itemized predicted execution cost for one order on one venue.
///
/// Invariant: `total_cost` equals the sum of the named components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionCostBreakdown {
    /// Cost of walking the book past the best price
    pub slippage_cost: Decimal,
    /// Maker or taker fee on the order notional
    pub trading_fee: Decimal,
    /// Projected funding cost; `None` when the venue reports no funding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_cost: Option<Decimal>,
    /// Fixed network/settlement fee; `None` when the venue charges none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_fee: Option<Decimal>,
    /// Sum of all components, in quote currency
    pub total_cost: Decimal,
    /// Total cost as a fraction of order notional
    pub cost_pct: Decimal,
    /// Order notional at the snapshot's reference price
    pub notional: Decimal,
    /// Average fill price implied by the book walk
    pub expected_fill_price: Decimal,
}

impl ExecutionCostBreakdown {
    /// Recompute the component sum; equals `total_cost` by construction.
    pub fn component_sum(&self) -> Decimal {
        self.slippage_cost
            + self.trading_fee
            + self.funding_cost.unwrap_or_default()
            + self.network_fee.unwrap_or_default()
    }
}

/// Walk the book until `size` is filled; returns the average fill price.
fn walk_book(book: &OrderBookSnapshot, intent: &OrderIntent) -> VenueResult<(Decimal, Decimal)> {
    let levels = book.levels_for(intent.side);
    let best = levels
        .first()
        .map(|l| l.price)
        .ok_or_else(|| VenueError::Validation(format!("no book depth for {}", intent.asset)))?;

    let mut remaining = intent.size;
    let mut cost = Decimal::ZERO;
    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(level.size);
        cost += take * level.price;
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return Err(VenueError::Validation(format!(
            "book depth insufficient for size {} of {}",
            intent.size, intent.asset
        )));
    }

    Ok((cost / intent.size, best))
}

/// Estimate the full execution cost of `intent` against `snapshot`.
///
/// `opens_position` controls whether projected funding applies; closing or
/// reducing orders carry no funding cost.
pub fn estimate_cost(
    intent: &OrderIntent,
    snapshot: &VenueSnapshot,
    config: &CostModelConfig,
    opens_position: bool,
) -> VenueResult<ExecutionCostBreakdown> {
    if intent.size <= Decimal::ZERO {
        return Err(VenueError::Validation("order size must be positive".to_string()));
    }

    let (avg_price, best_price) = walk_book(&snapshot.book, intent)?;
    let slippage_cost = (avg_price - best_price).abs() * intent.size;

    let reference_price = snapshot.book.mid_price().unwrap_or(best_price);
    let notional = intent.size * reference_price;

    let trading_fee = notional * snapshot.fees.rate_for(intent.kind);

    let funding_cost = if opens_position {
        snapshot
            .funding_rate
            .map(|rate| rate * notional * Decimal::from(config.funding_intervals))
    } else {
        None
    };

    let network_fee = snapshot.fees.network_fee;

    let total_cost = slippage_cost
        + trading_fee
        + funding_cost.unwrap_or_default()
        + network_fee.unwrap_or_default();

    let cost_pct = if notional.is_zero() {
        Decimal::ZERO
    } else {
        total_cost / notional
    };

    Ok(ExecutionCostBreakdown {
        slippage_cost,
        trading_fee,
        funding_cost,
        network_fee,
        total_cost,
        cost_pct,
        notional,
        expected_fill_price: avg_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{BookLevel, OrderSide};
    use rust_decimal_macros::dec;

    fn book(bids: Vec<(Decimal, Decimal)>, asks: Vec<(Decimal, Decimal)>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            asset: "SOL".to_string(),
            venue: "hyperliquid".to_string(),
            bids: bids.into_iter().map(|(p, s)| BookLevel::new(p, s)).collect(),
            asks: asks.into_iter().map(|(p, s)| BookLevel::new(p, s)).collect(),
            captured_at: Utc::now(),
        }
    }

    fn snapshot(book: OrderBookSnapshot) -> VenueSnapshot {
        VenueSnapshot {
            venue: "hyperliquid".to_string(),
            fees: FeeSchedule {
                maker_rate: dec!(0.0001),
                taker_rate: dec!(0.0005),
                network_fee: None,
            },
            book,
            funding_rate: None,
            avg_latency_ms: 50.0,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_slippage_when_top_level_covers_size() {
        let snap = snapshot(book(
            vec![(dec!(99), dec!(100))],
            vec![(dec!(101), dec!(100))],
        ));
        let intent = OrderIntent::market("SOL", OrderSide::Buy, dec!(10));

        let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        assert_eq!(cost.slippage_cost, Decimal::ZERO);
        assert_eq!(cost.expected_fill_price, dec!(101));
        // fee = 10 * 100 (mid) * 0.0005
        assert_eq!(cost.trading_fee, dec!(0.5));
        assert_eq!(cost.total_cost, cost.component_sum());
    }

    #[test]
    fn test_slippage_from_walking_levels() {
        let snap = snapshot(book(
            vec![(dec!(99), dec!(100))],
            vec![(dec!(100), dec!(5)), (dec!(102), dec!(10))],
        ));
        let intent = OrderIntent::market("SOL", OrderSide::Buy, dec!(10));

        let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        // avg = (5*100 + 5*102) / 10 = 101; slippage = (101-100)*10 = 10
        assert_eq!(cost.expected_fill_price, dec!(101));
        assert_eq!(cost.slippage_cost, dec!(10));
    }

    #[test]
    fn test_sell_walks_bids() {
        let snap = snapshot(book(
            vec![(dec!(100), dec!(5)), (dec!(98), dec!(10))],
            vec![(dec!(101), dec!(100))],
        ));
        let intent = OrderIntent::market("SOL", OrderSide::Sell, dec!(10));

        let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        // avg = (5*100 + 5*98) / 10 = 99; slippage = (100-99)*10 = 10
        assert_eq!(cost.slippage_cost, dec!(10));
    }

    #[test]
    fn test_insufficient_depth_is_a_validation_error() {
        let snap = snapshot(book(vec![(dec!(99), dec!(1))], vec![(dec!(101), dec!(1))]));
        let intent = OrderIntent::market("SOL", OrderSide::Buy, dec!(10));

        let err = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap_err();
        assert!(matches!(err, VenueError::Validation(_)));
    }

    #[test]
    fn test_funding_applies_only_to_opening_orders() {
        let mut snap = snapshot(book(
            vec![(dec!(99), dec!(100))],
            vec![(dec!(101), dec!(100))],
        ));
        snap.funding_rate = Some(dec!(0.0001));
        let intent = OrderIntent::market("SOL", OrderSide::Buy, dec!(10));

        let opening = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        assert_eq!(opening.funding_cost, Some(dec!(0.1)));

        let closing = estimate_cost(&intent, &snap, &CostModelConfig::default(), false).unwrap();
        assert_eq!(closing.funding_cost, None);
        assert!(closing.total_cost < opening.total_cost);
    }

    #[test]
    fn test_limit_orders_pay_maker_rate() {
        let snap = snapshot(book(
            vec![(dec!(99), dec!(100))],
            vec![(dec!(101), dec!(100))],
        ));
        let intent = OrderIntent::limit("SOL", OrderSide::Buy, dec!(10), dec!(100));

        let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        // fee = 10 * 100 * 0.0001
        assert_eq!(cost.trading_fee, dec!(0.1));
    }

    #[test]
    fn test_network_fee_included_in_total() {
        let mut snap = snapshot(book(
            vec![(dec!(99), dec!(100))],
            vec![(dec!(101), dec!(100))],
        ));
        snap.fees.network_fee = Some(dec!(2));
        let intent = OrderIntent::market("SOL", OrderSide::Buy, dec!(10));

        let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
        assert_eq!(cost.network_fee, Some(dec!(2)));
        assert_eq!(cost.total_cost, cost.component_sum());
        assert!(cost.total_cost >= dec!(2));
    }

    #[test]
    fn test_total_equals_component_sum_across_inputs() {
        // Consistency law over a spread of sizes and fee schedules.
        for (size, taker, funding) in [
            (dec!(1), dec!(0.001), None),
            (dec!(7), dec!(0.0005), Some(dec!(0.0002))),
            (dec!(15), dec!(0.0035), Some(dec!(-0.0001))),
        ] {
            let mut snap = snapshot(book(
                vec![(dec!(99), dec!(100))],
                vec![(dec!(100), dec!(8)), (dec!(103), dec!(50))],
            ));
            snap.fees.taker_rate = taker;
            snap.funding_rate = funding;

            let intent = OrderIntent::market("SOL", OrderSide::Buy, size);
            let cost = estimate_cost(&intent, &snap, &CostModelConfig::default(), true).unwrap();
            assert_eq!(cost.total_cost, cost.component_sum());
        }
    }
}
