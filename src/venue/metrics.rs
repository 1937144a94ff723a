//! Rolling per-adapter call metrics.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use super::types::VenueMetrics;

/// Weight of the newest sample in the latency EMA.
const LATENCY_EMA_ALPHA: f64 = 0.2;

/// Thread-safe rolling call counters shared by adapter methods.
pub struct CallRecorder {
    inner: Mutex<VenueMetrics>,
}

impl CallRecorder {
    /// Fresh recorder for a venue.
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(VenueMetrics::new(venue)),
        }
    }

    /// Record one completed call.
    pub fn observe(&self, ok: bool, latency: Duration) {
        let mut m = self.inner.lock();
        m.total_calls += 1;
        if ok {
            m.last_success = Some(Utc::now());
        } else {
            m.failed_calls += 1;
        }
        let sample = latency.as_secs_f64() * 1000.0;
        m.avg_latency_ms = if m.total_calls == 1 {
            sample
        } else {
            LATENCY_EMA_ALPHA * sample + (1.0 - LATENCY_EMA_ALPHA) * m.avg_latency_ms
        };
    }

    /// Snapshot of the current counters.
    pub fn snapshot(&self) -> VenueMetrics {
        self.inner.lock().clone()
    }
}
