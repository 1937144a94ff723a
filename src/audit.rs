//! Audit sink collaborator.
//!
//! The core writes routing decisions and shadow-mode results to a
//! host-supplied sink and never reads them back; persistence (database,
//! object store, message queue) is entirely the host's concern. Sink
//! failures must be contained by the implementation — the order path is
//! never blocked on audit.

use async_trait::async_trait;
use tracing::info;

use crate::routing::RoutingDecision;
use crate::shadow::ShadowModeResult;

/// Write-only audit record sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one routing decision.
    async fn record_decision(&self, decision: &RoutingDecision);

    /// Record one shadow-mode comparison.
    async fn record_shadow(&self, result: &ShadowModeResult);
}

/// Audit sink that emits structured log records.
///
/// The default sink when the host wires no persistence: decisions and
/// shadow results land in the log stream as JSON payloads.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_decision(&self, decision: &RoutingDecision) {
        let payload = serde_json::to_string(decision).unwrap_or_default();
        info!(
            target: "venue_router::audit",
            venue = %decision.selected_venue,
            score = decision.score,
            %payload,
            "routing decision"
        );
    }

    async fn record_shadow(&self, result: &ShadowModeResult) {
        let payload = serde_json::to_string(result).unwrap_or_default();
        info!(
            target: "venue_router::audit",
            venue = %result.real.venue,
            alternatives = result.alternatives.len(),
            %payload,
            "shadow comparison"
        );
    }
}

/// Audit sink that drops every record. Useful in tests.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record_decision(&self, _decision: &RoutingDecision) {}

    async fn record_shadow(&self, _result: &ShadowModeResult) {}
}
