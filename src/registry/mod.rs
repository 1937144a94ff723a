//! Venue registry: the one mutable shared structure in the core.
//!
//! The registry owns every configured venue adapter plus its live
//! [`VenueHealth`]. It is explicitly constructed at startup from
//! configuration and explicitly passed to the components that need it —
//! there is no process-wide singleton.
//!
//! Health mutations are serialized per venue (one mutex per venue id), so
//! the probe loop and call-result observers never lose updates to each
//! other; cross-venue updates are independent and share no lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{EventBus, ProviderEvent};
use crate::venue::TradingVenue;

/// Weight of the newest sample in the health latency EMA.
const LATENCY_EMA_ALPHA: f64 = 0.2;

/// Health status of one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Operating normally
    Healthy,
    /// Elevated failure rate; still routable
    Degraded,
    /// Unreachable; excluded from routing
    Down,
    /// Operator-forced exclusion; probes do not override it
    Maintenance,
}

impl HealthStatus {
    /// Whether a venue in this status may receive routed orders.
    pub fn is_routable(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Down => write!(f, "DOWN"),
            HealthStatus::Maintenance => write!(f, "MAINTENANCE"),
        }
    }
}

/// Consecutive-failure thresholds for health transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failures at which a venue becomes degraded
    pub degraded_after: u32,
    /// Consecutive failures at which a venue becomes down
    pub down_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: 3,
            down_after: 4,
        }
    }
}

/// Live health state for one venue. Owned exclusively by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueHealth {
    /// Current status
    pub status: HealthStatus,
    /// Timestamp of the last successful probe or call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    /// Current run of consecutive failures
    pub consecutive_failures: u32,
    /// Total failures observed
    pub error_count: u64,
    /// Total probes and calls observed
    pub total_observations: u64,
    /// Exponentially weighted average latency in milliseconds
    pub avg_latency_ms: f64,
}

impl VenueHealth {
    fn new(status: HealthStatus) -> Self {
        Self {
            status,
            last_success: None,
            consecutive_failures: 0,
            error_count: 0,
            total_observations: 0,
            avg_latency_ms: 0.0,
        }
    }

    /// Fraction of observations that succeeded; 1.0 with no observations.
    pub fn uptime_ratio(&self) -> f64 {
        if self.total_observations == 0 {
            return 1.0;
        }
        (self.total_observations - self.error_count) as f64 / self.total_observations as f64
    }
}

/// Registry of configured venues and their live health.
pub struct VenueRegistry {
    venues: HashMap<String, Arc<dyn TradingVenue>>,
    health: HashMap<String, Mutex<VenueHealth>>,
    thresholds: HealthThresholds,
    events: EventBus,
}

impl VenueRegistry {
    /// Build a registry from configured adapters.
    ///
    /// Venues whose configuration carries the maintenance flag start in
    /// `Maintenance` and stay there until the flag is lifted at the next
    /// process start; probe results never override it.
    pub fn new(
        venues: Vec<Arc<dyn TradingVenue>>,
        thresholds: HealthThresholds,
        events: EventBus,
    ) -> Self {
        let mut venue_map = HashMap::new();
        let mut health = HashMap::new();

        for venue in venues {
            let name = venue.name().to_string();
            let initial = if venue.config().maintenance {
                HealthStatus::Maintenance
            } else {
                HealthStatus::Healthy
            };
            info!(venue = %name, status = %initial, "registering venue");
            health.insert(name.clone(), Mutex::new(VenueHealth::new(initial)));
            venue_map.insert(name, venue);
        }

        Self {
            venues: venue_map,
            health,
            thresholds,
            events,
        }
    }

    /// Names of all configured venues, regardless of health.
    pub fn venue_names(&self) -> Vec<String> {
        self.venues.keys().cloned().collect()
    }

    /// Number of configured venues.
    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    /// A routable venue by name.
    ///
    /// Returns `None` for unknown venues and for venues that are down or in
    /// maintenance; use [`venue_for_diagnostics`](Self::venue_for_diagnostics)
    /// to bypass the health filter.
    pub fn venue(&self, name: &str) -> Option<Arc<dyn TradingVenue>> {
        if !self.is_routable(name) {
            return None;
        }
        self.venues.get(name).cloned()
    }

    /// Any configured venue by name, ignoring health. Diagnostics only.
    pub fn venue_for_diagnostics(&self, name: &str) -> Option<Arc<dyn TradingVenue>> {
        self.venues.get(name).cloned()
    }

    /// All venues currently eligible for routing.
    pub fn eligible_venues(&self) -> Vec<Arc<dyn TradingVenue>> {
        self.venues
            .iter()
            .filter(|(name, _)| self.is_routable(name))
            .map(|(_, venue)| venue.clone())
            .collect()
    }

    /// Whether the named venue may receive routed orders.
    pub fn is_routable(&self, name: &str) -> bool {
        self.health
            .get(name)
            .map(|h| h.lock().status.is_routable())
            .unwrap_or(false)
    }

    /// Health snapshot for one venue.
    pub fn health(&self, name: &str) -> Option<VenueHealth> {
        self.health.get(name).map(|h| h.lock().clone())
    }

    /// Health snapshots for every venue.
    pub fn all_health(&self) -> HashMap<String, VenueHealth> {
        self.health
            .iter()
            .map(|(name, h)| (name.clone(), h.lock().clone()))
            .collect()
    }

    /// Record the outcome of a scheduled probe.
    pub fn record_probe(&self, name: &str, outcome: Result<Duration, String>) {
        match outcome {
            Ok(latency) => {
                self.observe(name, true, Some(latency));
            }
            Err(reason) => {
                let failures = self.observe(name, false, None);
                self.events.publish(ProviderEvent::HealthCheckFailed {
                    venue: name.to_string(),
                    consecutive_failures: failures,
                });
                warn!(venue = name, %reason, failures, "health probe failed");
            }
        }
    }

    /// Record the outcome of a real venue call.
    ///
    /// Call observations feed the same rolling state as probes, so a venue
    /// can be marked degraded between scheduled probes purely from observed
    /// call failures.
    pub fn observe_call(&self, name: &str, ok: bool, latency: Option<Duration>) {
        self.observe(name, ok, latency);
    }

    /// Apply one observation under the venue's own lock; returns the
    /// resulting consecutive-failure count.
    fn observe(&self, name: &str, ok: bool, latency: Option<Duration>) -> u32 {
        let Some(entry) = self.health.get(name) else {
            debug!(venue = name, "observation for unknown venue dropped");
            return 0;
        };

        let mut health = entry.lock();
        health.total_observations += 1;

        if let Some(latency) = latency {
            let sample = latency.as_secs_f64() * 1000.0;
            health.avg_latency_ms = if health.total_observations == 1 {
                sample
            } else {
                LATENCY_EMA_ALPHA * sample + (1.0 - LATENCY_EMA_ALPHA) * health.avg_latency_ms
            };
        }

        let previous = health.status;

        if ok {
            health.consecutive_failures = 0;
            health.last_success = Some(Utc::now());
            // A single passing observation restores health directly, even
            // from Down. Maintenance is operator-owned and never overridden.
            if previous != HealthStatus::Maintenance {
                health.status = HealthStatus::Healthy;
            }
        } else {
            health.error_count += 1;
            health.consecutive_failures += 1;
            if previous != HealthStatus::Maintenance {
                health.status = if health.consecutive_failures >= self.thresholds.down_after {
                    HealthStatus::Down
                } else if health.consecutive_failures >= self.thresholds.degraded_after {
                    HealthStatus::Degraded
                } else {
                    previous
                };
            }
        }

        let current = health.status;
        let failures = health.consecutive_failures;
        drop(health);

        if previous != current {
            info!(venue = name, from = %previous, to = %current, "venue health transition");
            match current {
                HealthStatus::Healthy if previous == HealthStatus::Down => {
                    self.events.publish(ProviderEvent::Connected {
                        venue: name.to_string(),
                    });
                }
                HealthStatus::Down => {
                    self.events.publish(ProviderEvent::Disconnected {
                        venue: name.to_string(),
                    });
                }
                _ => {}
            }
        }

        failures
    }

    /// Spawn the background probe loop.
    ///
    /// All venues are probed concurrently each tick; each probe runs under
    /// its own timeout, and a timed-out probe counts as a failed probe.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                registry.probe_all(probe_timeout).await;
            }
        })
    }

    /// Probe every configured venue once, concurrently.
    pub async fn probe_all(&self, probe_timeout: Duration) {
        let probes = self.venues.iter().map(|(name, venue)| {
            let name = name.clone();
            let venue = venue.clone();
            async move {
                let outcome =
                    match tokio::time::timeout(probe_timeout, venue.health_probe()).await {
                        Ok(Ok(latency)) => Ok(latency),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_) => Err(format!("probe timed out after {probe_timeout:?}")),
                    };
                (name, outcome)
            }
        });

        let results = futures_util::future::join_all(probes).await;
        for (name, outcome) in results {
            self.record_probe(&name, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> VenueRegistry {
        VenueRegistry {
            venues: HashMap::new(),
            health: [(
                "strike".to_string(),
                Mutex::new(VenueHealth::new(HealthStatus::Healthy)),
            )]
            .into_iter()
            .collect(),
            thresholds: HealthThresholds::default(),
            events: EventBus::new(),
        }
    }

    fn fail(reg: &VenueRegistry, times: u32) {
        for _ in 0..times {
            reg.record_probe("strike", Err("timeout".to_string()));
        }
    }

    #[test]
    fn test_degraded_at_threshold_down_past_it() {
        let reg = registry();

        fail(&reg, 2);
        assert_eq!(reg.health("strike").unwrap().status, HealthStatus::Healthy);

        fail(&reg, 1);
        assert_eq!(reg.health("strike").unwrap().status, HealthStatus::Degraded);

        fail(&reg, 1);
        assert_eq!(reg.health("strike").unwrap().status, HealthStatus::Down);
        assert!(!reg.is_routable("strike"));
    }

    #[test]
    fn test_single_success_restores_healthy_directly() {
        let reg = registry();
        fail(&reg, 4);
        assert_eq!(reg.health("strike").unwrap().status, HealthStatus::Down);

        reg.record_probe("strike", Ok(Duration::from_millis(20)));
        let health = reg.health("strike").unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_some());
    }

    #[test]
    fn test_maintenance_is_never_overridden_by_probes() {
        let reg = VenueRegistry {
            venues: HashMap::new(),
            health: [(
                "strike".to_string(),
                Mutex::new(VenueHealth::new(HealthStatus::Maintenance)),
            )]
            .into_iter()
            .collect(),
            thresholds: HealthThresholds::default(),
            events: EventBus::new(),
        };

        reg.record_probe("strike", Ok(Duration::from_millis(10)));
        assert_eq!(
            reg.health("strike").unwrap().status,
            HealthStatus::Maintenance
        );
        fail(&reg, 5);
        assert_eq!(
            reg.health("strike").unwrap().status,
            HealthStatus::Maintenance
        );
        assert!(!reg.is_routable("strike"));
    }

    #[test]
    fn test_call_observations_degrade_between_probes() {
        let reg = registry();
        for _ in 0..3 {
            reg.observe_call("strike", false, None);
        }
        assert_eq!(reg.health("strike").unwrap().status, HealthStatus::Degraded);
    }

    #[test]
    fn test_uptime_ratio_and_latency_tracking() {
        let reg = registry();
        reg.observe_call("strike", true, Some(Duration::from_millis(100)));
        reg.observe_call("strike", false, None);

        let health = reg.health("strike").unwrap();
        assert_eq!(health.total_observations, 2);
        assert_eq!(health.error_count, 1);
        assert!((health.uptime_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(health.avg_latency_ms > 0.0);
    }

    #[test]
    fn test_unknown_venue_observation_is_dropped() {
        let reg = registry();
        reg.observe_call("nope", false, None);
        assert!(reg.health("nope").is_none());
    }

    #[tokio::test]
    async fn test_probe_all_runs_every_venue_concurrently() {
        use crate::testutil::MockVenue;
        use crate::venue::{TradingVenue, VenueError};

        let failing = Arc::new(MockVenue::new("failing", &["SOL"]));
        failing.queue_probe_result(Err(VenueError::Connection("refused".to_string())));
        let passing = Arc::new(MockVenue::new("passing", &["SOL"]));

        let reg = Arc::new(VenueRegistry::new(
            vec![
                failing.clone() as Arc<dyn TradingVenue>,
                passing.clone() as Arc<dyn TradingVenue>,
            ],
            HealthThresholds::default(),
            EventBus::new(),
        ));

        reg.probe_all(Duration::from_secs(1)).await;

        assert_eq!(reg.health("failing").unwrap().consecutive_failures, 1);
        assert_eq!(reg.health("passing").unwrap().consecutive_failures, 0);
        assert!(reg.health("passing").unwrap().last_success.is_some());
    }

    #[tokio::test]
    async fn test_probe_failure_publishes_event() {
        let reg = registry();
        let mut rx = reg.events.subscribe();
        reg.record_probe("strike", Err("connection refused".to_string()));

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(
            envelope.event,
            ProviderEvent::HealthCheckFailed {
                consecutive_failures: 1,
                ..
            }
        ));
    }
}
