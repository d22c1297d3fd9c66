//! Millisecond durations for engine configuration.
//!
//! [`DurationMs`] serializes as a plain integer so tick periods and lease
//! lengths read naturally in JSON configuration (`"tick_period": 500`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in milliseconds with a stable JSON serialization format.
///
/// # Examples
///
/// ```
/// use twin_protocol::DurationMs;
///
/// let d = DurationMs::from_millis(1500);
/// assert_eq!(d.as_millis(), 1500);
///
/// let json = serde_json::to_string(&d).unwrap();
/// assert_eq!(json, "1500");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Create from seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Get the value in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this is the zero duration.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Convert to a wall-clock delta for deadline arithmetic.
    ///
    /// Returns `None` when the value does not fit chrono's range.
    pub fn to_time_delta(&self) -> Option<chrono::TimeDelta> {
        i64::try_from(self.0)
            .ok()
            .and_then(chrono::TimeDelta::try_milliseconds)
    }
}

impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Default for DurationMs {
    fn default() -> Self {
        Self::ZERO
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
