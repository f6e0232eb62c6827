//! Time source for key freshness, rate-limit windows and claim validation.

use std::time::Instant;

/// Injectable time source.
///
/// `now` drives monotonic measurements (cache freshness, rate-limit
/// windows); `unix_timestamp` is compared against `exp`, `nbf` and `iat`.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn unix_timestamp(&self) -> i64;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
