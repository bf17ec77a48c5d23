//! Rate limiting for repeated log messages.

use std::time::{Duration, Instant};

/// Lets a message through at most once per period.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    period: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    /// Create a throttle with the given period in seconds.
    pub fn new(period_secs: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(period_secs.max(0.0)),
            last: None,
        }
    }

    /// Returns true if the caller should log now, and records the attempt.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Lets a message through exactly once.
#[derive(Debug, Clone, Default)]
pub struct LogOnce {
    fired: bool,
}

impl LogOnce {
    /// Returns true on the first call only.
    pub fn ready(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }
}
