//! Minimum spacing between discrete backend actions.
//!
//! Confirmation already fires once per gesture run; the limiter only
//! guards against a confirmation landing right after the previous action
//! (e.g. Pinch released and re-formed within a few frames).  Pointer
//! movement and drag continuation are never routed through it.

use std::time::Duration;

#[derive(Debug)]
pub struct RateLimiter {
    interval_s: f64,
    last_s: Option<f64>,
    /// Actions rejected since creation.
    pub rejected: u64,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_s: interval.as_secs_f64(),
            last_s: None,
            rejected: 0,
        }
    }

    /// Check if an action at `now_s` is allowed.  An allowed action starts
    /// a new interval.  A clock that moves backwards resets the limiter.
    pub fn check(&mut self, now_s: f64) -> bool {
        match self.last_s {
            Some(last) if now_s >= last && now_s - last < self.interval_s => {
                self.rejected += 1;
                false
            }
            _ => {
                self.last_s = Some(now_s);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_s = None;
    }
}
