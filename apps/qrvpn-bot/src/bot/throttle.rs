use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

/// Per-user flood control for incoming messages and button presses.
///
/// Each user may send one update per `period`; anything faster is dropped
/// before it reaches a handler. Payment confirmations bypass it.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DefaultKeyedRateLimiter<i64>>,
}

impl Throttle {
    pub fn new(period: Duration) -> Result<Self> {
        let quota = Quota::with_period(period)
            .context("throttle period must be longer than zero")?
            .allow_burst(NonZeroU32::MIN);
        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        })
    }

    /// Records an update from `user_id` and tells whether it may be handled.
    pub fn allow(&self, user_id: i64) -> bool {
        let allowed = self.limiter.check_key(&user_id).is_ok();
        if !allowed {
            debug!("Throttled update from user {}", user_id);
        }
        // Keep the key map from growing with users who went quiet.
        if self.limiter.len() > 10_000 {
            self.limiter.retain_recent();
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_update_inside_the_period_is_dropped() {
        let throttle = Throttle::new(Duration::from_secs(60)).unwrap();

        assert!(throttle.allow(1));
        assert!(!throttle.allow(1));
        assert!(!throttle.allow(1));
    }

    #[test]
    fn users_are_throttled_independently() {
        let throttle = Throttle::new(Duration::from_secs(60)).unwrap();

        assert!(throttle.allow(1));
        assert!(throttle.allow(2));
        assert!(!throttle.allow(1));
        assert!(!throttle.allow(2));
    }

    #[test]
    fn clones_share_the_same_budget() {
        let throttle = Throttle::new(Duration::from_secs(60)).unwrap();
        let handle = throttle.clone();

        assert!(throttle.allow(7));
        assert!(!handle.allow(7));
    }

    #[test]
    fn updates_pass_again_after_the_period() {
        let throttle = Throttle::new(Duration::from_millis(20)).unwrap();

        assert!(throttle.allow(1));
        std::thread::sleep(Duration::from_millis(60));
        assert!(throttle.allow(1));
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(Throttle::new(Duration::ZERO).is_err());
    }
}
