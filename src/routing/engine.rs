//! Best-execution routing engine.
//!
//! For each order the engine filters the registry down to eligible venues,
//! prices the order on every survivor via the pure cost estimator, ranks the
//! candidates by a weighted score, and returns a [`RoutingDecision`] that
//! carries every candidate's score for audit. Execution failover is bounded
//! to a single retry against the next-ranked venue.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::events::{EventBus, ProviderEvent};
use crate::registry::VenueRegistry;
use crate::shadow::{RealExecutionRecord, ShadowComparator};
use crate::venue::{
    OrderIntent, OrderLifecycle, OrderResult, TradingVenue, VenueError,
};

use super::cost::{estimate_cost, CostModelConfig, ExecutionCostBreakdown, VenueSnapshot};

/// Book levels requested per side when assembling venue snapshots.
const BOOK_DEPTH: usize = 20;

/// Fetch one venue's book and funding concurrently and record the
/// observation with the registry. Shared by live routing and shadow
/// re-pricing so both price orders from identically shaped snapshots.
pub(crate) async fn assemble_snapshot(
    registry: &VenueRegistry,
    venue: &Arc<dyn TradingVenue>,
    asset: &str,
) -> Result<VenueSnapshot, VenueError> {
    let started = Instant::now();
    let (book, funding) = tokio::join!(
        venue.order_book(asset, BOOK_DEPTH),
        venue.funding_rate(asset)
    );
    let ok = book.is_ok() && funding.is_ok();
    registry.observe_call(venue.name(), ok, Some(started.elapsed()));

    let book = book?;
    let funding_rate = funding?;
    let latency_ms = registry
        .health(venue.name())
        .map(|h| h.avg_latency_ms)
        .unwrap_or(0.0);

    Ok(VenueSnapshot {
        venue: venue.name().to_string(),
        fees: venue.config().fees.clone(),
        book,
        funding_rate,
        avg_latency_ms: latency_ms,
        captured_at: Utc::now(),
    })
}

/// How urgently the caller needs the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

/// Weights applied to the normalized scoring factors.
///
/// The latency weight is configurable rather than fixed; callers that want
/// latency ignored set it to zero through preferences or configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub slippage: f64,
    pub fee: f64,
    pub funding: f64,
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            slippage: 0.4,
            fee: 0.4,
            funding: 0.1,
            latency: 0.1,
        }
    }
}

/// Hard filters and overrides supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserExecutionPreferences {
    /// When set, only these venues are considered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_venues: Option<Vec<String>>,
    /// Venues never considered
    pub denied_venues: Vec<String>,
    /// Override for the default scoring weights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<ScoringWeights>,
}

impl UserExecutionPreferences {
    fn permits(&self, venue: &str) -> bool {
        if self.denied_venues.iter().any(|v| v == venue) {
            return false;
        }
        match &self.allowed_venues {
            Some(allowed) => allowed.iter().any(|v| v == venue),
            None => true,
        }
    }
}

/// Everything the engine needs to route one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The order to route
    pub intent: OrderIntent,
    /// Fill urgency
    #[serde(default)]
    pub urgency: Urgency,
    /// Strategy that originated the order, for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Caller preferences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<UserExecutionPreferences>,
    /// Whether the order opens (or extends) a position; funding cost
    /// applies only to opening orders
    #[serde(default = "default_opens_position")]
    pub opens_position: bool,
}

fn default_opens_position() -> bool {
    true
}

impl ExecutionContext {
    /// Context for a position-opening order with default urgency.
    pub fn new(intent: OrderIntent) -> Self {
        Self {
            intent,
            urgency: Urgency::Normal,
            strategy: None,
            preferences: None,
            opens_position: true,
        }
    }

    /// Attach caller preferences.
    pub fn with_preferences(mut self, preferences: UserExecutionPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Tag the originating strategy.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }
}

/// Score (or rejection reason) for one candidate venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Venue considered
    pub venue: String,
    /// Weighted score; lower is better. `None` when the venue was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Cost breakdown for scored candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ExecutionCostBreakdown>,
    /// Observed average latency in milliseconds
    pub latency_ms: f64,
    /// Why the venue was rejected, when it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

/// The engine's answer for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Venue chosen for execution
    pub selected_venue: String,
    /// Winning weighted score
    pub score: f64,
    /// Human-readable reason code for the selection
    pub reason: String,
    /// Cost breakdown for the selected venue
    pub cost: ExecutionCostBreakdown,
    /// Every candidate considered, scored or rejected, for audit
    pub candidates: Vec<CandidateScore>,
    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

impl RoutingDecision {
    /// Scored alternatives, best first, excluding the selected venue.
    pub fn ranked_alternatives(&self) -> Vec<&CandidateScore> {
        let mut alternatives: Vec<&CandidateScore> = self
            .candidates
            .iter()
            .filter(|c| c.score.is_some() && c.venue != self.selected_venue)
            .collect();
        alternatives.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        alternatives
    }
}

/// Routing failure surfaced to the caller.
///
/// A routing call either returns a concrete [`RoutingDecision`] or exactly
/// one of these — never a partial result.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// No configured venue trades the asset
    #[error("no configured venue supports asset {0}")]
    UnsupportedAsset(String),

    /// Venues exist for the asset but none survived filtering
    #[error("no eligible venue for {asset}: {detail}")]
    NoEligibleVenue {
        asset: String,
        detail: String,
    },

    /// Every configured venue is down or in maintenance
    #[error("all venues are down or in maintenance")]
    AllVenuesDown,

    /// Execution failed on the venue (after any permitted failover)
    #[error("execution failed on {venue}: {source}")]
    ExecutionFailed {
        venue: String,
        #[source]
        source: VenueError,
    },
}

/// Best-execution router over a venue registry.
pub struct RoutingEngine {
    registry: Arc<VenueRegistry>,
    weights: ScoringWeights,
    cost_config: CostModelConfig,
    audit: Arc<dyn AuditSink>,
    events: EventBus,
    shadow: Option<Arc<ShadowComparator>>,
}

impl RoutingEngine {
    /// Create an engine over the given registry.
    pub fn new(
        registry: Arc<VenueRegistry>,
        weights: ScoringWeights,
        cost_config: CostModelConfig,
        audit: Arc<dyn AuditSink>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            weights,
            cost_config,
            audit,
            events,
            shadow: None,
        }
    }

    /// Attach a shadow-mode comparator; completed executions are handed to
    /// it in the background.
    pub fn with_shadow_comparator(mut self, shadow: Arc<ShadowComparator>) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Choose the best venue for the order.
    pub async fn route(&self, ctx: &ExecutionContext) -> Result<RoutingDecision, RoutingError> {
        self.route_excluding(ctx, &[]).await
    }

    /// Route while excluding venues that already failed this order.
    async fn route_excluding(
        &self,
        ctx: &ExecutionContext,
        excluded: &[String],
    ) -> Result<RoutingDecision, RoutingError> {
        let asset = &ctx.intent.asset;
        let weights = ctx
            .preferences
            .as_ref()
            .and_then(|p| p.weights)
            .unwrap_or(self.weights);

        let names = self.registry.venue_names();
        if names.is_empty() {
            return Err(RoutingError::AllVenuesDown);
        }

        let asset_supported = names.iter().any(|name| {
            self.registry
                .venue_for_diagnostics(name)
                .map(|v| v.supports_asset(asset))
                .unwrap_or(false)
        });
        if !asset_supported {
            return Err(RoutingError::UnsupportedAsset(asset.clone()));
        }

        // Score every candidate concurrently; scoring only reads snapshots,
        // so candidates share no mutable state.
        let evaluations = names.iter().map(|name| self.evaluate_candidate(ctx, name, excluded));
        let mut candidates: Vec<CandidateScore> =
            futures_util::future::join_all(evaluations).await;
        candidates.sort_by(|a, b| a.venue.cmp(&b.venue));

        self.apply_latency_factor(&mut candidates, &weights);

        let best = candidates
            .iter()
            .filter(|c| c.score.is_some())
            .min_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        let Some(best) = best else {
            if self.registry.eligible_venues().is_empty() {
                return Err(RoutingError::AllVenuesDown);
            }
            let detail = candidates
                .iter()
                .filter_map(|c| {
                    c.rejection
                        .as_ref()
                        .map(|r| format!("{}: {}", c.venue, r))
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RoutingError::NoEligibleVenue {
                asset: asset.clone(),
                detail,
            });
        };

        let Some(cost) = best.cost.clone() else {
            return Err(RoutingError::NoEligibleVenue {
                asset: asset.clone(),
                detail: "selected candidate lost its cost breakdown".to_string(),
            });
        };

        let decision = RoutingDecision {
            selected_venue: best.venue.clone(),
            score: best.score.unwrap_or_default(),
            reason: "lowest_weighted_cost".to_string(),
            cost,
            candidates,
            decided_at: Utc::now(),
        };

        info!(
            asset = %asset,
            venue = %decision.selected_venue,
            score = decision.score,
            "routing decision"
        );

        Ok(decision)
    }

    /// Evaluate one venue; returns a scored or rejected candidate.
    async fn evaluate_candidate(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        excluded: &[String],
    ) -> CandidateScore {
        let health = self.registry.health(name);
        let latency_ms = health.as_ref().map(|h| h.avg_latency_ms).unwrap_or(0.0);

        let rejected = |reason: String| CandidateScore {
            venue: name.to_string(),
            score: None,
            cost: None,
            latency_ms,
            rejection: Some(reason),
        };

        if excluded.iter().any(|v| v == name) {
            return rejected("excluded after execution failure".to_string());
        }

        if let Some(prefs) = &ctx.preferences {
            if !prefs.permits(name) {
                return rejected("excluded by caller preferences".to_string());
            }
        }

        let Some(venue) = self.registry.venue(name) else {
            let status = health
                .map(|h| h.status.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return rejected(format!("venue not routable ({status})"));
        };

        if !venue.supports_asset(&ctx.intent.asset) {
            return rejected(format!("asset {} not supported", ctx.intent.asset));
        }

        let snapshot = match self.gather_snapshot(&venue, &ctx.intent.asset).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return rejected(format!("snapshot unavailable ({})", err.kind()));
            }
        };

        // Size limits are checked against the snapshot's reference price.
        if let Some(mid) = snapshot.book.mid_price() {
            let notional = ctx.intent.notional_at(mid);
            if !venue.config().accepts_notional(notional) {
                return rejected(format!(
                    "notional {notional} outside bounds [{}, {}]",
                    venue.config().min_order_usd,
                    venue.config().max_order_usd
                ));
            }
        }

        match estimate_cost(&ctx.intent, &snapshot, &self.cost_config, ctx.opens_position) {
            Ok(cost) => CandidateScore {
                venue: name.to_string(),
                score: None, // filled in by apply_latency_factor
                cost: Some(cost),
                latency_ms,
                rejection: None,
            },
            Err(err) => rejected(format!("cost estimate failed ({})", err.kind())),
        }
    }

    /// Assemble a snapshot of one venue for the cost estimator.
    async fn gather_snapshot(
        &self,
        venue: &Arc<dyn TradingVenue>,
        asset: &str,
    ) -> Result<VenueSnapshot, VenueError> {
        assemble_snapshot(&self.registry, venue, asset).await
    }

    /// Compute final weighted scores once every candidate's cost is known.
    ///
    /// Cost factors are normalized as fractions of notional; latency is
    /// normalized against the slowest scored candidate so the factor stays
    /// in `[0, 1]` regardless of absolute latencies.
    fn apply_latency_factor(&self, candidates: &mut [CandidateScore], weights: &ScoringWeights) {
        let max_latency = candidates
            .iter()
            .filter(|c| c.cost.is_some())
            .map(|c| c.latency_ms)
            .fold(0.0_f64, f64::max);

        for candidate in candidates.iter_mut() {
            let Some(cost) = &candidate.cost else { continue };

            let notional = cost.notional;
            let frac = |value: Decimal| -> f64 {
                if notional.is_zero() {
                    0.0
                } else {
                    (value / notional).to_f64().unwrap_or(0.0)
                }
            };

            let slippage_frac = frac(cost.slippage_cost);
            let fee_frac = frac(cost.trading_fee);
            let funding_frac = frac(cost.funding_cost.unwrap_or_default());
            let latency_norm = if max_latency > 0.0 {
                candidate.latency_ms / max_latency
            } else {
                0.0
            };

            let score = weights.slippage * slippage_frac
                + weights.fee * fee_frac
                + weights.funding * funding_frac
                + weights.latency * latency_norm;

            debug!(
                venue = %candidate.venue,
                score,
                slippage_frac,
                fee_frac,
                funding_frac,
                latency_norm,
                "candidate scored"
            );
            candidate.score = Some(score);
        }
    }

    /// Route and execute one order.
    ///
    /// On a retryable execution failure the engine re-invokes selection
    /// excluding the failed venue — at most once per order. A second
    /// failure surfaces to the caller.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<(RoutingDecision, OrderResult), RoutingError> {
        let decision = self.route(ctx).await?;
        self.audit.record_decision(&decision).await;

        match self.place_on(&decision.selected_venue, ctx).await {
            Ok(result) => {
                self.dispatch_shadow(&decision, &result, ctx);
                Ok((decision, result))
            }
            Err(err) if err.is_failover_eligible() => {
                let failed_venue = decision.selected_venue.clone();
                warn!(
                    venue = %failed_venue,
                    error = %err,
                    "execution failed with retryable error, attempting failover"
                );

                let excluded = vec![failed_venue.clone()];
                let retry_decision = self.route_excluding(ctx, &excluded).await?;
                self.events.publish(ProviderEvent::FailoverTriggered {
                    failed_venue: failed_venue.clone(),
                    alternate_venue: retry_decision.selected_venue.clone(),
                    asset: ctx.intent.asset.clone(),
                });
                self.audit.record_decision(&retry_decision).await;

                match self.place_on(&retry_decision.selected_venue, ctx).await {
                    Ok(result) => {
                        self.dispatch_shadow(&retry_decision, &result, ctx);
                        Ok((retry_decision, result))
                    }
                    Err(second) => Err(RoutingError::ExecutionFailed {
                        venue: retry_decision.selected_venue,
                        source: second,
                    }),
                }
            }
            Err(err) => Err(RoutingError::ExecutionFailed {
                venue: decision.selected_venue,
                source: err,
            }),
        }
    }

    /// Place the order on one venue, recording the observation.
    async fn place_on(
        &self,
        venue_name: &str,
        ctx: &ExecutionContext,
    ) -> Result<OrderResult, VenueError> {
        let venue = self
            .registry
            .venue(venue_name)
            .ok_or_else(|| VenueError::Connection(format!("venue {venue_name} not routable")))?;

        let started = Instant::now();
        let outcome = venue.place_order(&ctx.intent).await;
        self.registry
            .observe_call(venue_name, outcome.is_ok(), Some(started.elapsed()));

        match &outcome {
            Ok(result) => {
                self.events.publish(ProviderEvent::OrderPlaced {
                    venue: venue_name.to_string(),
                    asset: ctx.intent.asset.clone(),
                    order_id: result.order_id.clone(),
                });
                if result.status == OrderLifecycle::Filled {
                    self.events.publish(ProviderEvent::OrderFilled {
                        venue: venue_name.to_string(),
                        asset: ctx.intent.asset.clone(),
                        order_id: result.order_id.clone(),
                        filled_size: result.filled_size,
                    });
                    if ctx.opens_position {
                        self.events.publish(ProviderEvent::PositionOpened {
                            venue: venue_name.to_string(),
                            asset: ctx.intent.asset.clone(),
                        });
                    }
                }
            }
            Err(err) => {
                self.events.publish(ProviderEvent::Error {
                    venue: venue_name.to_string(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                });
            }
        }

        outcome
    }

    /// Hand a completed execution to the shadow comparator, detached from
    /// the caller's request cycle.
    fn dispatch_shadow(
        &self,
        decision: &RoutingDecision,
        result: &OrderResult,
        ctx: &ExecutionContext,
    ) {
        if let Some(shadow) = &self.shadow {
            let record = RealExecutionRecord {
                venue: decision.selected_venue.clone(),
                price: result.avg_fill_price,
                total_cost: decision.cost.total_cost,
                latency_ms: decision
                    .candidates
                    .iter()
                    .find(|c| c.venue == decision.selected_venue)
                    .map(|c| c.latency_ms)
                    .unwrap_or(0.0),
                success: result.success,
                executed_at: result.executed_at,
            };
            shadow.spawn_evaluation(decision.clone(), record, ctx.clone());
        }
    }
}
