//! Provider event stream for external observability collectors.
//!
//! Events are published on a `tokio::sync::broadcast` channel: subscribers
//! that fall behind miss events rather than back-pressuring the core.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default buffered capacity of the event channel.
const DEFAULT_CAPACITY: usize = 256;

/// Observable event emitted by the routing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderEvent {
    /// Venue became reachable
    Connected { venue: String },
    /// Venue became unreachable
    Disconnected { venue: String },
    /// Venue reported an error outside the order path
    Error { venue: String, kind: String, message: String },
    /// Order accepted by a venue
    OrderPlaced {
        venue: String,
        asset: String,
        order_id: Option<String>,
    },
    /// Order completely filled
    OrderFilled {
        venue: String,
        asset: String,
        order_id: Option<String>,
        filled_size: Decimal,
    },
    /// New position opened on a venue
    PositionOpened { venue: String, asset: String },
    /// Position closed on a venue
    PositionClosed { venue: String, asset: String },
    /// Scheduled health probe failed
    HealthCheckFailed { venue: String, consecutive_failures: u32 },
    /// Routing retried an order on an alternate venue
    FailoverTriggered {
        failed_venue: String,
        alternate_venue: String,
        asset: String,
    },
}

/// Timestamped envelope delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The event payload
    pub event: ProviderEvent,
    /// When the event was published
    pub ts: DateTime<Utc>,
}

/// Broadcast bus carrying [`ProviderEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit buffered capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; lagging or absent subscribers are not an error.
    pub fn publish(&self, event: ProviderEvent) {
        let _ = self.tx.send(EventEnvelope {
            event,
            ts: Utc::now(),
        });
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(ProviderEvent::OrderFilled {
            venue: "strike".to_string(),
            asset: "ADA".to_string(),
            order_id: Some("tx-1".to_string()),
            filled_size: dec!(100),
        });

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(envelope.event, ProviderEvent::OrderFilled { .. }));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(ProviderEvent::Connected {
            venue: "strike".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization_tags_type() {
        let event = ProviderEvent::FailoverTriggered {
            failed_venue: "strike".to_string(),
            alternate_venue: "hyperliquid".to_string(),
            asset: "SOL".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FAILOVER_TRIGGERED");
    }
}
