//! Rate limiting for inbound socket messages

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

/// Max inbound messages per second from one connection
pub const INBOUND_RATE_LIMIT: u32 = 20;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-connection rate limiter state
pub struct ConnectionRateLimiter {
    limiter: Limiter,
}

impl ConnectionRateLimiter {
    pub fn new(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Check if a message is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new(INBOUND_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_refused() {
        let limiter = ConnectionRateLimiter::new(3);
        let allowed = (0..10).filter(|_| limiter.check()).count();
        assert_eq!(allowed, 3);
    }
}
