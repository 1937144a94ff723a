// venue-router: multi-venue execution routing core.
// Consumed as a library by host services; exposes no network listener.

pub mod audit;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod positions;
pub mod registry;
pub mod routing;
pub mod shadow;
pub mod venue;

#[cfg(test)]
pub(crate) mod testutil;

pub use audit::{AuditSink, TracingAuditSink};
pub use config::RouterConfig;
pub use error::{ErrorCategory, ErrorClassification};
pub use events::{EventBus, ProviderEvent};
pub use positions::{AggregatedPosition, LiquidationRisk, PositionAggregator, RiskTier};
pub use registry::{HealthStatus, VenueHealth, VenueRegistry};
pub use routing::{
    ExecutionContext, ExecutionCostBreakdown, RoutingDecision, RoutingEngine, RoutingError,
};
pub use shadow::{ShadowComparator, ShadowModeResult};
pub use venue::{
    ChainKind, OrderIntent, OrderKind, OrderLifecycle, OrderResult, OrderSide, Position,
    TradingVenue, VenueConfig, VenueError, VenueResult,
};
