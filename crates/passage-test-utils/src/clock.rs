//! Manually driven clock for deterministic time in tests.

use passage_auth::Clock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Clock that only moves when told to.
///
/// `now()` and `unix_timestamp()` advance together, so cache freshness,
/// rate-limit windows and claim checks all see the same elapsed time.
///
/// # Example
/// ```rust,ignore
/// let clock = Arc::new(ManualClock::new());
/// let store = KeyStore::new(source, clock.clone());
/// clock.advance(Duration::from_secs(1));
/// ```
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    unix: AtomicI64,
}

impl ManualClock {
    /// Start at the current wall-clock time.
    pub fn new() -> Self {
        Self::at_unix(chrono::Utc::now().timestamp())
    }

    /// Start at a fixed unix timestamp.
    pub fn at_unix(timestamp: i64) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            unix: AtomicI64::new(timestamp),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap();
        *elapsed += by;
        self.unix.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }

    /// Move only the wall clock; monotonic time is unaffected.
    pub fn set_unix(&self, timestamp: i64) {
        self.unix.store(timestamp, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    fn unix_timestamp(&self) -> i64 {
        self.unix.load(Ordering::SeqCst)
    }
}
