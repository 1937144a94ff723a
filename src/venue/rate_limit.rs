//! Per-venue request rate budgets.
//!
//! Token-bucket limiting via the `governor` crate. Each adapter owns one
//! limiter sized from its configured requests-per-second budget; order
//! placement uses the fail-fast check, background work (probes, shadow
//! re-pricing) awaits capacity.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use tracing::warn;

use super::error::{VenueError, VenueResult};

type Limiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token-bucket rate limiter for one venue's outbound calls.
pub struct RateLimiter {
    limiter: Option<Arc<Limiter>>,
}

impl RateLimiter {
    /// Create a limiter with the given requests-per-second budget.
    ///
    /// A budget of zero disables limiting.
    pub fn per_second(budget: u32) -> Self {
        let limiter = NonZeroU32::new(budget).map(|rate| {
            let quota = Quota::per_second(rate);
            Arc::new(GovernorRateLimiter::direct(quota))
        });
        Self { limiter }
    }

    /// Wait until the budget allows one more request.
    pub async fn acquire(&self) {
        if let Some(ref limiter) = self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Try to take one request immediately, failing fast when exhausted.
    pub fn try_acquire(&self) -> VenueResult<()> {
        if let Some(ref limiter) = self.limiter {
            match limiter.check() {
                Ok(_) => Ok(()),
                Err(not_until) => {
                    let wait = not_until.wait_time_from(DefaultClock::default().now());
                    warn!("rate budget exhausted, retry after {:?}", wait);
                    Err(VenueError::rate_limited(wait))
                }
            }
        } else {
            Ok(())
        }
    }

    /// Whether a budget is configured.
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }
}
