//! Cross-venue position aggregation and liquidation-risk classification.
//!
//! The aggregator merges per-venue positions for the same logical asset
//! into one net exposure view. It reads through the registry's eligibility
//! filter; venues that are down or in maintenance are not queried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::registry::VenueRegistry;
use crate::venue::{Position, VenueError};

/// Risk tier for aggregated exposure, ordered from safest to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Comfortable distance to liquidation
    Low,
    /// Worth monitoring
    Medium,
    /// Consider reducing exposure
    High,
    /// Immediate action required
    Critical,
}

impl RiskTier {
    /// Check if this tier requires attention
    pub fn requires_attention(&self) -> bool {
        *self >= RiskTier::High
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
            RiskTier::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Distance-to-liquidation thresholds, as fractions of mark price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Below this distance the tier is critical
    pub critical: Decimal,
    /// Below this distance the tier is high
    pub high: Decimal,
    /// Below this distance the tier is medium
    pub medium: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: Decimal::new(5, 2),  // 5%
            high: Decimal::new(15, 2),     // 15%
            medium: Decimal::new(30, 2),   // 30%
        }
    }
}

impl RiskThresholds {
    /// Classify a distance-to-liquidation fraction.
    ///
    /// Monotonic by construction: a smaller distance never yields a lower
    /// tier than a larger one.
    pub fn classify(&self, distance: Decimal) -> RiskTier {
        if distance < self.critical {
            RiskTier::Critical
        } else if distance < self.high {
            RiskTier::High
        } else if distance < self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Liquidation risk across all venues holding one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRisk {
    /// Tier driven by the venue closest to liquidation
    pub overall_risk: RiskTier,
    /// Venue driving the classification, when any venue reports a
    /// liquidation price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearest_liquidation_venue: Option<String>,
    /// Minimum distance to liquidation across venues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<Decimal>,
}

/// One asset's exposure merged across venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedPosition {
    /// Asset identifier
    pub asset: String,
    /// Signed sum of per-venue sizes (long positive, short negative)
    pub net_size: Decimal,
    /// Size-weighted average entry price
    pub avg_entry_price: Decimal,
    /// Summed unrealized P&L
    pub unrealized_pnl: Decimal,
    /// Summed realized P&L
    pub realized_pnl: Decimal,
    /// Summed margin across venues
    pub total_margin: Decimal,
    /// Blended leverage: total notional over total margin
    pub effective_leverage: Decimal,
    /// Liquidation-risk classification
    pub risk: LiquidationRisk,
    /// Per-venue breakdown keyed by venue name
    pub by_venue: HashMap<String, Position>,
    /// When the aggregate was computed
    pub aggregated_at: DateTime<Utc>,
}

/// Aggregation failure surfaced to the caller.
///
/// Venue-adapter errors are never swallowed: a failed position query on an
/// eligible venue surfaces here tagged with the venue name, because an
/// aggregate silently missing a venue would misreport exposure.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// A venue's position query failed
    #[error("position query failed on {venue}: {source}")]
    VenueQueryFailed {
        venue: String,
        #[source]
        source: VenueError,
    },
}

/// Merges per-venue positions into net exposure views.
pub struct PositionAggregator {
    registry: Arc<VenueRegistry>,
    thresholds: RiskThresholds,
}

impl PositionAggregator {
    /// Create an aggregator over the given registry.
    pub fn new(registry: Arc<VenueRegistry>, thresholds: RiskThresholds) -> Self {
        Self {
            registry,
            thresholds,
        }
    }

    /// Aggregate exposure for one asset.
    ///
    /// Returns `None` when no venue holds the asset or the net size is
    /// zero — flat exposure is dropped, not reported as a zero-size entry.
    pub async fn aggregate(
        &self,
        asset: &str,
    ) -> Result<Option<AggregatedPosition>, AggregationError> {
        let all = self.aggregate_all().await?;
        Ok(all.into_iter().find(|p| p.asset == asset))
    }

    /// Aggregate exposure for every asset with open positions.
    pub async fn aggregate_all(&self) -> Result<Vec<AggregatedPosition>, AggregationError> {
        let venues = self.registry.eligible_venues();

        let queries = venues.iter().map(|venue| {
            let venue = venue.clone();
            async move {
                let started = Instant::now();
                let result = venue.positions().await;
                self.registry
                    .observe_call(venue.name(), result.is_ok(), Some(started.elapsed()));
                (venue.name().to_string(), result)
            }
        });

        let mut positions: Vec<Position> = Vec::new();
        for (venue, result) in futures_util::future::join_all(queries).await {
            match result {
                Ok(mut venue_positions) => positions.append(&mut venue_positions),
                Err(source) => {
                    return Err(AggregationError::VenueQueryFailed { venue, source })
                }
            }
        }

        let mut by_asset: HashMap<String, Vec<Position>> = HashMap::new();
        for position in positions {
            by_asset
                .entry(position.asset.clone())
                .or_default()
                .push(position);
        }

        let mut aggregates: Vec<AggregatedPosition> = by_asset
            .into_iter()
            .filter_map(|(asset, positions)| self.merge(asset, positions))
            .collect();
        aggregates.sort_by(|a, b| a.asset.cmp(&b.asset));

        Ok(aggregates)
    }

    /// Merge one asset's per-venue positions; `None` when net size is zero.
    fn merge(&self, asset: String, positions: Vec<Position>) -> Option<AggregatedPosition> {
        let net_size: Decimal = positions.iter().map(|p| p.signed_size()).sum();
        if net_size.is_zero() {
            debug!(%asset, "net exposure is flat, dropped from aggregate");
            return None;
        }

        let gross_size: Decimal = positions.iter().map(|p| p.size).sum();
        let avg_entry_price = if gross_size.is_zero() {
            Decimal::ZERO
        } else {
            positions
                .iter()
                .map(|p| p.entry_price * p.size)
                .sum::<Decimal>()
                / gross_size
        };

        let unrealized_pnl = positions.iter().map(|p| p.unrealized_pnl).sum();
        let realized_pnl = positions.iter().map(|p| p.realized_pnl).sum();
        let total_margin: Decimal = positions.iter().map(|p| p.margin_used).sum();
        let total_notional: Decimal = positions.iter().map(|p| p.notional()).sum();

        let effective_leverage = if total_margin.is_zero() {
            Decimal::ZERO
        } else {
            total_notional / total_margin
        };

        let risk = self.classify_risk(&positions);

        let by_venue = positions
            .into_iter()
            .map(|p| (p.venue.clone(), p))
            .collect();

        Some(AggregatedPosition {
            asset,
            net_size,
            avg_entry_price,
            unrealized_pnl,
            realized_pnl,
            total_margin,
            effective_leverage,
            risk,
            by_venue,
            aggregated_at: Utc::now(),
        })
    }

    /// Classify by the minimum distance to liquidation across venues.
    fn classify_risk(&self, positions: &[Position]) -> LiquidationRisk {
        let nearest = positions
            .iter()
            .filter_map(|p| p.liquidation_distance().map(|d| (p.venue.clone(), d)))
            .min_by(|a, b| a.1.cmp(&b.1));

        match nearest {
            Some((venue, distance)) => LiquidationRisk {
                overall_risk: self.thresholds.classify(distance),
                nearest_liquidation_venue: Some(venue),
                min_distance: Some(distance),
            },
            // No venue reports a liquidation price: nothing to classify.
            None => LiquidationRisk {
                overall_risk: RiskTier::Low,
                nearest_liquidation_venue: None,
                min_distance: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::venue::PositionSide;
    use rust_decimal_macros::dec;

    fn aggregator() -> PositionAggregator {
        PositionAggregator::new(
            Arc::new(VenueRegistry::new(
                Vec::new(),
                Default::default(),
                EventBus::new(),
            )),
            RiskThresholds::default(),
        )
    }

    fn position(
        venue: &str,
        side: PositionSide,
        size: Decimal,
        entry: Decimal,
        mark: Decimal,
        liq: Option<Decimal>,
    ) -> Position {
        Position {
            venue: venue.to_string(),
            asset: "SOL".to_string(),
            side,
            size,
            entry_price: entry,
            mark_price: mark,
            liquidation_price: liq,
            unrealized_pnl: (mark - entry) * size * side.sign(),
            realized_pnl: Decimal::ZERO,
            margin_used: size * mark / dec!(5),
            leverage: dec!(5),
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_net_size_is_signed_sum() {
        let agg = aggregator();
        let merged = agg
            .merge(
                "SOL".to_string(),
                vec![
                    position("hyperliquid", PositionSide::Long, dec!(10), dec!(100), dec!(110), None),
                    position("strike", PositionSide::Short, dec!(4), dec!(105), dec!(110), None),
                ],
            )
            .unwrap();
        assert_eq!(merged.net_size, dec!(6));
    }

    #[test]
    fn test_flat_exposure_is_dropped() {
        let agg = aggregator();
        let merged = agg.merge(
            "SOL".to_string(),
            vec![
                position("hyperliquid", PositionSide::Long, dec!(10), dec!(100), dec!(110), None),
                position("strike", PositionSide::Short, dec!(10), dec!(105), dec!(110), None),
            ],
        );
        assert!(merged.is_none());
    }

    #[test]
    fn test_vwap_entry_price() {
        let agg = aggregator();
        let merged = agg
            .merge(
                "SOL".to_string(),
                vec![
                    position("hyperliquid", PositionSide::Long, dec!(10), dec!(100), dec!(100), None),
                    position("strike", PositionSide::Long, dec!(30), dec!(104), dec!(100), None),
                ],
            )
            .unwrap();
        // (10*100 + 30*104) / 40 = 103
        assert_eq!(merged.avg_entry_price, dec!(103));
        assert_eq!(merged.net_size, dec!(40));
    }

    #[test]
    fn test_effective_leverage_is_notional_over_margin() {
        let agg = aggregator();
        let merged = agg
            .merge(
                "SOL".to_string(),
                vec![position(
                    "hyperliquid",
                    PositionSide::Long,
                    dec!(10),
                    dec!(100),
                    dec!(100),
                    None,
                )],
            )
            .unwrap();
        // notional 1000, margin 200
        assert_eq!(merged.effective_leverage, dec!(5));
    }

    #[test]
    fn test_risk_driven_by_nearest_venue() {
        let agg = aggregator();
        let merged = agg
            .merge(
                "SOL".to_string(),
                vec![
                    // distance (100-60)/100 = 40%
                    position("hyperliquid", PositionSide::Long, dec!(10), dec!(90), dec!(100), Some(dec!(60))),
                    // distance (100-90)/100 = 10%
                    position("strike", PositionSide::Long, dec!(5), dec!(95), dec!(100), Some(dec!(90))),
                ],
            )
            .unwrap();
        assert_eq!(merged.risk.overall_risk, RiskTier::High);
        assert_eq!(
            merged.risk.nearest_liquidation_venue.as_deref(),
            Some("strike")
        );
        assert_eq!(merged.risk.min_distance, Some(dec!(0.1)));
    }

    #[test]
    fn test_classification_is_monotonic_in_distance() {
        let thresholds = RiskThresholds::default();
        let mut last = RiskTier::Critical;
        for distance in [
            dec!(0.01),
            dec!(0.04),
            dec!(0.05),
            dec!(0.14),
            dec!(0.15),
            dec!(0.29),
            dec!(0.30),
            dec!(0.50),
        ] {
            let tier = thresholds.classify(distance);
            assert!(tier <= last, "tier rose as distance grew: {distance}");
            last = tier;
        }
    }

    #[test]
    fn test_threshold_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(dec!(0.049)), RiskTier::Critical);
        assert_eq!(t.classify(dec!(0.05)), RiskTier::High);
        assert_eq!(t.classify(dec!(0.149)), RiskTier::High);
        assert_eq!(t.classify(dec!(0.15)), RiskTier::Medium);
        assert_eq!(t.classify(dec!(0.3)), RiskTier::Low);
    }

    #[tokio::test]
    async fn test_aggregate_all_reads_through_registry() {
        use crate::testutil::MockVenue;
        use crate::venue::TradingVenue;

        let venue = Arc::new(MockVenue::new("hyperliquid", &["SOL"]).with_position(position(
            "hyperliquid",
            PositionSide::Long,
            dec!(10),
            dec!(100),
            dec!(100),
            None,
        )));
        let registry = Arc::new(VenueRegistry::new(
            vec![venue as Arc<dyn TradingVenue>],
            Default::default(),
            EventBus::new(),
        ));
        let agg = PositionAggregator::new(registry, RiskThresholds::default());

        let all = agg.aggregate_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].asset, "SOL");
        assert_eq!(all[0].net_size, dec!(10));
        assert!(all[0].by_venue.contains_key("hyperliquid"));
    }

    #[tokio::test]
    async fn test_aggregate_with_no_venues_is_empty() {
        let agg = aggregator();
        let all = agg.aggregate_all().await.unwrap();
        assert!(all.is_empty());
        assert!(agg.aggregate("SOL").await.unwrap().is_none());
    }
}
