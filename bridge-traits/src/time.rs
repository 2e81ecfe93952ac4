//! Time Abstractions
//!
//! Injectable time source so signing and watermark logic can be tested with
//! fixed instants.

use chrono::{DateTime, Utc};

/// Time source trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// fn stamp(clock: &dyn Clock) -> String {
///     clock.unix_timestamp().to_string()
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in seconds
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant. Handy for request signing fixtures.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn from_unix(seconds: i64) -> Self {
        Self(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
