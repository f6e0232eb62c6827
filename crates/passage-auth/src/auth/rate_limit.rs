//! Fixed-window limiter for key set refetches triggered by unknown key ids.
//!
//! Tokens carrying a `kid` that is not in a fresh cache force a refetch of
//! the key set. Without a cap, an attacker could turn every request into an
//! outbound HTTPS call by inventing key ids.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default window length.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct WindowState {
    window_start: Option<Instant>,
    count: u32,
}

/// Counts unknown-kid refetches per window.
#[derive(Debug)]
pub struct InvalidKidRateLimiter {
    max_per_window: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl InvalidKidRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Limiter allowing `max` refetches per one-second window.
    pub fn per_second(max: u32) -> Self {
        Self::new(max, DEFAULT_RATE_LIMIT_WINDOW)
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    /// Consume one slot in the window containing `now`.
    ///
    /// Returns `false` once the window's budget is spent. The first call
    /// after the window elapses opens a new window.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let window_open = state
            .window_start
            .is_some_and(|start| now.saturating_duration_since(start) < self.window);

        if !window_open {
            state.window_start = Some(now);
            state.count = 0;
        }

        if state.count >= self.max_per_window {
            return false;
        }

        state.count += 1;
        true
    }
}
