//! Nanosecond timestamps.

use std::fmt;

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: f64 = 1e9;

/// Point in time in nanoseconds.
///
/// Zero is reserved as the "never set" sentinel used by the submap
/// bookkeeping, matching how sensor drivers leave unstamped headers.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The unset sentinel.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create from nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from seconds. Negative values saturate to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs.max(0.0) * NANOS_PER_SEC).round() as u64)
    }

    /// Nanoseconds since the epoch.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Seconds since the epoch.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC
    }

    /// True for the unset sentinel.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Signed difference `self - earlier` in seconds.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        if self.0 >= earlier.0 {
            (self.0 - earlier.0) as f64 / NANOS_PER_SEC
        } else {
            -((earlier.0 - self.0) as f64 / NANOS_PER_SEC)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_seconds_since_is_signed() {
        let a = Timestamp::from_secs_f64(10.0);
        let b = Timestamp::from_secs_f64(12.5);
        assert_relative_eq!(b.seconds_since(a), 2.5);
        assert_relative_eq!(a.seconds_since(b), -2.5);
    }

    #[test]
    fn test_display() {
        let t = Timestamp::from_nanos(3_000_000_042);
        assert_eq!(t.to_string(), "3.000000042");
        assert!(Timestamp::default().is_zero());
    }
}
