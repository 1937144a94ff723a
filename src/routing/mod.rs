//! Best-execution routing: cost estimation and venue selection.

pub mod cost;
pub mod engine;

pub use cost::{estimate_cost, CostModelConfig, ExecutionCostBreakdown, VenueSnapshot};
pub use engine::{
    CandidateScore, ExecutionContext, RoutingDecision, RoutingEngine, RoutingError,
    ScoringWeights, Urgency, UserExecutionPreferences,
};
