//! Shadow-mode comparator.
//!
//! After a real execution completes, the comparator re-prices the same
//! order against every venue that was eligible at decision time — without
//! submitting anything — to measure forgone savings. Evaluations run as
//! detached tasks: they never block the order path, the caller's request
//! being cancelled does not cancel them, and their failures are logged,
//! never raised to any caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::audit::AuditSink;
use crate::registry::VenueRegistry;
use crate::routing::engine::assemble_snapshot;
use crate::routing::{CostModelConfig, ExecutionContext, ExecutionCostBreakdown, RoutingDecision};
use crate::routing::cost::estimate_cost;

/// Shadow evaluation tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowModeConfig {
    /// Comparisons whose snapshot is further than this from the real
    /// execution are dropped, not reported as zero-savings
    pub staleness_bound_secs: u64,
    /// Concurrent hypothetical re-pricing calls per evaluation, bounding
    /// the load placed on each venue's rate budget
    pub max_concurrency: usize,
}

impl Default for ShadowModeConfig {
    fn default() -> Self {
        Self {
            staleness_bound_secs: 30,
            max_concurrency: 4,
        }
    }
}

/// What actually happened on the selected venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealExecutionRecord {
    /// Venue that executed the order
    pub venue: String,
    /// Achieved average fill price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Predicted total cost of the executed route
    pub total_cost: Decimal,
    /// Observed venue latency at execution time, milliseconds
    pub latency_ms: f64,
    /// Whether the execution succeeded
    pub success: bool,
    /// When the execution completed
    pub executed_at: DateTime<Utc>,
}

/// Hypothetical outcome on one non-selected venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypotheticalExecution {
    /// Venue the order was re-priced against
    pub venue: String,
    /// Expected fill price from the comparison snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_price: Option<Decimal>,
    /// Full cost breakdown, when re-pricing succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ExecutionCostBreakdown>,
    /// Observed venue latency, milliseconds
    pub latency_ms: f64,
    /// Whether the hypothetical could be priced
    pub success: bool,
    /// Signed savings versus the real execution: positive means the
    /// alternative was strictly cheaper (money left on the table); equal
    /// or worse alternatives report zero or negative, never omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings: Option<Decimal>,
    /// Distance between the comparison snapshot and the real execution
    pub snapshot_age_ms: i64,
}

/// Result of one shadow evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowModeResult {
    /// The real execution being compared against
    pub real: RealExecutionRecord,
    /// One hypothetical per alternative venue retained
    pub alternatives: Vec<HypotheticalExecution>,
    /// Alternative with the highest savings, when any was priced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_alternative: Option<String>,
    /// Confidence in the comparison, decaying with snapshot age:
    /// 1.0 fresh, 0.0 at the staleness bound
    pub confidence: f64,
    /// When the evaluation finished
    pub evaluated_at: DateTime<Utc>,
}

impl ShadowModeResult {
    /// Highest positive savings across alternatives, if any.
    pub fn forgone_savings(&self) -> Option<Decimal> {
        self.alternatives
            .iter()
            .filter_map(|a| a.savings)
            .filter(|s| *s > Decimal::ZERO)
            .max()
    }
}

/// Re-prices completed orders against non-selected venues.
pub struct ShadowComparator {
    registry: Arc<VenueRegistry>,
    config: ShadowModeConfig,
    cost_config: CostModelConfig,
    audit: Arc<dyn AuditSink>,
}

impl ShadowComparator {
    /// Create a comparator over the given registry.
    pub fn new(
        registry: Arc<VenueRegistry>,
        config: ShadowModeConfig,
        cost_config: CostModelConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            config,
            cost_config,
            audit,
        }
    }

    /// Schedule a detached evaluation of one completed execution.
    ///
    /// Returns the task handle for tests; production callers drop it.
    pub fn spawn_evaluation(
        self: &Arc<Self>,
        decision: RoutingDecision,
        real: RealExecutionRecord,
        ctx: ExecutionContext,
    ) -> tokio::task::JoinHandle<()> {
        let comparator = Arc::clone(self);
        tokio::spawn(async move {
            let result = comparator.evaluate(&decision, real, &ctx).await;
            comparator.audit.record_shadow(&result).await;
            debug!(
                venue = %result.real.venue,
                alternatives = result.alternatives.len(),
                best = result.best_alternative.as_deref().unwrap_or("-"),
                confidence = result.confidence,
                "shadow evaluation complete"
            );
        })
    }

    /// Evaluate one execution against every alternative eligible at
    /// decision time.
    pub async fn evaluate(
        &self,
        decision: &RoutingDecision,
        real: RealExecutionRecord,
        ctx: &ExecutionContext,
    ) -> ShadowModeResult {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let evaluations = decision
            .ranked_alternatives()
            .into_iter()
            .map(|candidate| {
                let venue_name = candidate.venue.clone();
                let semaphore = Arc::clone(&semaphore);
                let real_ts = real.executed_at;
                async move {
                    // Permit scope bounds the concurrent outbound calls.
                    let _permit = semaphore.acquire().await.ok()?;
                    self.price_alternative(&venue_name, ctx, real_ts).await
                }
            });

        let alternatives: Vec<HypotheticalExecution> =
            futures_util::future::join_all(evaluations)
                .await
                .into_iter()
                .flatten()
                .map(|mut hypo| {
                    hypo.savings = hypo
                        .cost
                        .as_ref()
                        .map(|cost| real.total_cost - cost.total_cost);
                    hypo
                })
                .collect();

        let best_alternative = alternatives
            .iter()
            .filter(|a| a.savings.is_some())
            .max_by(|a, b| {
                a.savings
                    .partial_cmp(&b.savings)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|a| a.venue.clone());

        let confidence = self.confidence(&alternatives);

        ShadowModeResult {
            real,
            alternatives,
            best_alternative,
            confidence,
            evaluated_at: Utc::now(),
        }
    }

    /// Re-price the order on one alternative venue.
    ///
    /// Returns `None` when the comparison snapshot is older than the
    /// staleness bound — stale comparisons are dropped, not reported as
    /// zero savings.
    async fn price_alternative(
        &self,
        venue_name: &str,
        ctx: &ExecutionContext,
        real_ts: DateTime<Utc>,
    ) -> Option<HypotheticalExecution> {
        let venue = self.registry.venue(venue_name)?;
        let latency_ms = self
            .registry
            .health(venue_name)
            .map(|h| h.avg_latency_ms)
            .unwrap_or(0.0);

        let snapshot = match assemble_snapshot(&self.registry, &venue, &ctx.intent.asset).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(venue = venue_name, error = %err, "shadow re-pricing failed");
                return Some(HypotheticalExecution {
                    venue: venue_name.to_string(),
                    expected_price: None,
                    cost: None,
                    latency_ms,
                    success: false,
                    savings: None,
                    snapshot_age_ms: 0,
                });
            }
        };

        let age = (snapshot.captured_at - real_ts).num_milliseconds().abs();
        if age > (self.config.staleness_bound_secs as i64) * 1000 {
            debug!(
                venue = venue_name,
                age_ms = age,
                "comparison snapshot beyond staleness bound, dropped"
            );
            return None;
        }

        match estimate_cost(&ctx.intent, &snapshot, &self.cost_config, ctx.opens_position) {
            Ok(cost) => Some(HypotheticalExecution {
                venue: venue_name.to_string(),
                expected_price: Some(cost.expected_fill_price),
                cost: Some(cost),
                latency_ms,
                success: true,
                savings: None, // filled in by the caller against the real cost
                snapshot_age_ms: age,
            }),
            Err(err) => {
                warn!(venue = venue_name, error = %err, "shadow cost estimate failed");
                Some(HypotheticalExecution {
                    venue: venue_name.to_string(),
                    expected_price: None,
                    cost: None,
                    latency_ms,
                    success: false,
                    savings: None,
                    snapshot_age_ms: age,
                })
            }
        }
    }

    /// Confidence decays linearly with the oldest retained snapshot.
    fn confidence(&self, alternatives: &[HypotheticalExecution]) -> f64 {
        let priced: Vec<i64> = alternatives
            .iter()
            .filter(|a| a.success)
            .map(|a| a.snapshot_age_ms)
            .collect();

        if priced.is_empty() {
            return 0.0;
        }

        let bound_ms = (self.config.staleness_bound_secs as f64) * 1000.0;
        let max_age = priced.into_iter().max().unwrap_or(0) as f64;
        (1.0 - max_age / bound_ms).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn hypo(venue: &str, savings: Option<Decimal>, success: bool, age_ms: i64) -> HypotheticalExecution {
        HypotheticalExecution {
            venue: venue.to_string(),
            expected_price: None,
            cost: None,
            latency_ms: 0.0,
            success,
            savings,
            snapshot_age_ms: age_ms,
        }
    }

    fn result(alternatives: Vec<HypotheticalExecution>) -> ShadowModeResult {
        ShadowModeResult {
            real: RealExecutionRecord {
                venue: "strike".to_string(),
                price: Some(dec!(0.5)),
                total_cost: dec!(10),
                latency_ms: 40.0,
                success: true,
                executed_at: Utc::now(),
            },
            alternatives,
            best_alternative: None,
            confidence: 1.0,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_forgone_savings_only_counts_positive() {
        let res = result(vec![
            hypo("hyperliquid", Some(dec!(2.5)), true, 100),
            hypo("other", Some(dec!(-1)), true, 100),
        ]);
        assert_eq!(res.forgone_savings(), Some(dec!(2.5)));

        let res = result(vec![hypo("hyperliquid", Some(dec!(-3)), true, 100)]);
        assert_eq!(res.forgone_savings(), None);
    }

    fn scored_candidate(venue: &str, score: f64) -> crate::routing::CandidateScore {
        crate::routing::CandidateScore {
            venue: venue.to_string(),
            score: Some(score),
            cost: None,
            latency_ms: 10.0,
            rejection: None,
        }
    }

    fn decision_with(selected: &str, candidates: Vec<crate::routing::CandidateScore>) -> RoutingDecision {
        use crate::routing::cost::ExecutionCostBreakdown;
        RoutingDecision {
            selected_venue: selected.to_string(),
            score: 0.001,
            reason: "lowest_weighted_cost".to_string(),
            cost: ExecutionCostBreakdown {
                slippage_cost: Decimal::ZERO,
                trading_fee: dec!(20),
                funding_cost: None,
                network_fee: None,
                total_cost: dec!(20),
                cost_pct: dec!(0.002),
                notional: dec!(10000),
                expected_fill_price: dec!(100),
            },
            candidates,
            decided_at: Utc::now(),
        }
    }

    fn comparator_over(venues: Vec<Arc<crate::testutil::MockVenue>>) -> Arc<ShadowComparator> {
        use crate::venue::TradingVenue;
        let registry = Arc::new(crate::registry::VenueRegistry::new(
            venues
                .into_iter()
                .map(|v| v as Arc<dyn TradingVenue>)
                .collect(),
            Default::default(),
            crate::events::EventBus::new(),
        ));
        Arc::new(ShadowComparator::new(
            registry,
            ShadowModeConfig::default(),
            CostModelConfig::default(),
            Arc::new(crate::audit::NoopAuditSink),
        ))
    }

    fn real_record(total_cost: Decimal) -> RealExecutionRecord {
        RealExecutionRecord {
            venue: "expensive".to_string(),
            price: Some(dec!(100)),
            total_cost,
            latency_ms: 50.0,
            success: true,
            executed_at: Utc::now(),
        }
    }

    fn buy_ctx() -> crate::routing::ExecutionContext {
        use crate::venue::{OrderIntent, OrderSide};
        crate::routing::ExecutionContext::new(OrderIntent::market(
            "SOL",
            OrderSide::Buy,
            dec!(100),
        ))
    }

    #[tokio::test]
    async fn test_cheaper_alternative_reports_positive_savings() {
        use crate::venue::FeeSchedule;
        let cheap = Arc::new(
            crate::testutil::MockVenue::new("cheap", &["SOL"])
                .with_fees(FeeSchedule::flat(dec!(0.0001)))
                .with_book(
                    "SOL",
                    vec![(dec!(99.95), dec!(1000000))],
                    vec![(dec!(100), dec!(1000000))],
                ),
        );
        let comparator = comparator_over(vec![cheap]);

        let decision = decision_with(
            "expensive",
            vec![
                scored_candidate("expensive", 0.002),
                scored_candidate("cheap", 0.0001),
            ],
        );

        let result = comparator
            .evaluate(&decision, real_record(dec!(20)), &buy_ctx())
            .await;

        assert_eq!(result.alternatives.len(), 1);
        let alt = &result.alternatives[0];
        assert!(alt.success);
        assert!(alt.savings.unwrap() > Decimal::ZERO);
        assert_eq!(result.best_alternative.as_deref(), Some("cheap"));
        assert!(result.confidence > 0.9);
        assert_eq!(result.forgone_savings(), alt.savings);
    }

    #[tokio::test]
    async fn test_equal_cost_alternative_reports_zero_not_omitted() {
        use crate::venue::FeeSchedule;
        let peer = Arc::new(
            crate::testutil::MockVenue::new("peer", &["SOL"])
                .with_fees(FeeSchedule::flat(dec!(0.0005)))
                .with_book(
                    "SOL",
                    vec![(dec!(99.95), dec!(1000000))],
                    vec![(dec!(100), dec!(1000000))],
                ),
        );
        let comparator = comparator_over(vec![peer]);

        let decision = decision_with(
            "expensive",
            vec![
                scored_candidate("expensive", 0.002),
                scored_candidate("peer", 0.0005),
            ],
        );

        // Real cost exactly matches peer's hypothetical: fee on a
        // 100-unit buy at mid 99.975 with a 0.05% rate.
        let real_cost = dec!(9997.5) * dec!(0.0005);
        let result = comparator
            .evaluate(&decision, real_record(real_cost), &buy_ctx())
            .await;

        let alt = &result.alternatives[0];
        assert_eq!(alt.savings, Some(Decimal::ZERO));
        assert_eq!(result.forgone_savings(), None);
    }

    #[tokio::test]
    async fn test_failed_repricing_is_contained() {
        // Venue has no book for the asset: re-pricing fails, the
        // evaluation still completes with a failed hypothetical.
        let broken = Arc::new(crate::testutil::MockVenue::new("broken", &["SOL"]));
        let comparator = comparator_over(vec![broken]);

        let decision = decision_with(
            "expensive",
            vec![
                scored_candidate("expensive", 0.002),
                scored_candidate("broken", 0.001),
            ],
        );

        let result = comparator
            .evaluate(&decision, real_record(dec!(20)), &buy_ctx())
            .await;

        assert_eq!(result.alternatives.len(), 1);
        assert!(!result.alternatives[0].success);
        assert_eq!(result.alternatives[0].savings, None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_confidence_decays_with_age() {
        let comparator = ShadowComparator {
            registry: Arc::new(crate::registry::VenueRegistry::new(
                Vec::new(),
                Default::default(),
                crate::events::EventBus::new(),
            )),
            config: ShadowModeConfig {
                staleness_bound_secs: 10,
                max_concurrency: 2,
            },
            cost_config: CostModelConfig::default(),
            audit: Arc::new(crate::audit::NoopAuditSink),
        };

        // Fresh snapshot: full confidence.
        assert!((comparator.confidence(&[hypo("a", None, true, 0)]) - 1.0).abs() < 1e-9);
        // Half the bound: half confidence.
        assert!((comparator.confidence(&[hypo("a", None, true, 5000)]) - 0.5).abs() < 1e-9);
        // Nothing priced: no confidence.
        assert_eq!(comparator.confidence(&[hypo("a", None, false, 0)]), 0.0);
    }
}
