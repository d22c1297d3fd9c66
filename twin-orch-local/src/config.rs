//! Engine configuration.

use serde::{Deserialize, Serialize};
use twin_protocol::duration::DurationMs;
use twin_protocol::error::EngineError;

/// Tuning knobs for the orchestrator and its manifestor.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use twin_orch_local::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "tick_period": 250 }"#).unwrap();
/// assert_eq!(config.tick_period.as_millis(), 250);
/// assert_eq!(config.initial_delay.as_millis(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay before the first manifestor pass.
    pub initial_delay: DurationMs,
    /// Period between manifestor passes. Must be non-zero.
    pub tick_period: DurationMs,
    /// How long a twin may stay locked before its dispatch is
    /// dead-lettered. `None` keeps locks until the behaviour reports back.
    pub lock_lease: Option<DurationMs>,
    /// Run a manifestor pass as soon as work is enqueued or a twin is
    /// released, instead of waiting for the next tick.
    pub wake_on_enqueue: bool,
    /// How many dead letters are retained; the oldest is dropped first.
    pub dead_letter_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_delay: DurationMs::from_millis(1000),
            tick_period: DurationMs::from_millis(500),
            lock_lease: Some(DurationMs::from_secs(30)),
            wake_on_enqueue: true,
            dead_letter_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values make sense together.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tick_period.is_zero() {
            return Err(EngineError::InvalidConfig(
                "tick_period must be greater than zero".into(),
            ));
        }
        if let Some(lease) = self.lock_lease {
            if lease.is_zero() {
                return Err(EngineError::InvalidConfig(
                    "lock_lease must be greater than zero; omit it to disable leasing".into(),
                ));
            }
            if lease.to_time_delta().is_none() {
                return Err(EngineError::InvalidConfig(format!(
                    "lock_lease of {lease} is out of range"
                )));
            }
        }
        Ok(())
    }

    /// Set the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: impl Into<DurationMs>) -> Self {
        self.initial_delay = delay.into();
        self
    }

    /// Set the tick period.
    #[must_use]
    pub fn with_tick_period(mut self, period: impl Into<DurationMs>) -> Self {
        self.tick_period = period.into();
        self
    }

    /// Set or clear the lock lease.
    #[must_use]
    pub fn with_lock_lease(mut self, lease: Option<DurationMs>) -> Self {
        self.lock_lease = lease;
        self
    }

    /// Enable or disable wake-on-enqueue.
    #[must_use]
    pub fn with_wake_on_enqueue(mut self, wake: bool) -> Self {
        self.wake_on_enqueue = wake;
        self
    }

    /// Set the dead-letter capacity.
    #[must_use]
    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_lease, Some(DurationMs::from_millis(30_000)));
        assert!(config.wake_on_enqueue);
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let err = EngineConfig::default()
            .with_tick_period(DurationMs::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("tick_period"));
    }

    #[test]
    fn zero_lease_is_rejected_but_none_is_fine() {
        let zero = EngineConfig::default().with_lock_lease(Some(DurationMs::ZERO));
        assert!(zero.validate().is_err());
        let none = EngineConfig::default().with_lock_lease(None);
        assert!(none.validate().is_ok());
    }

    #[test]
    fn json_round_trips_with_null_lease() {
        let config = EngineConfig::from_json(r#"{"lock_lease": null, "wake_on_enqueue": false}"#)
            .unwrap();
        assert_eq!(config.lock_lease, None);
        assert!(!config.wake_on_enqueue);
        assert_eq!(config.dead_letter_capacity, 1024);
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        let err = EngineConfig::from_json("{").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
