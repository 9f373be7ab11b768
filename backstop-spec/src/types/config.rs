//! Retry and coalescing configuration.
//!
//! Durations are (de)serialized as integer milliseconds (`*_ms` keys) so a
//! feature can ship its tuning as plain JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retry configuration for one `RetryCoordinator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per key, counting the first one.
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles per attempt.
    #[serde(rename = "base_delay_ms", with = "duration_ms")]
    pub base_delay: Duration,
    /// Upper bound for the un-jittered delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Optional deadline for a single attempt. An attempt running past it is
    /// abandoned and counted as a transient failure.
    #[serde(
        rename = "attempt_timeout_ms",
        with = "option_duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            attempt_timeout: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::DelayOrder {
                base_ms: self.base_delay.as_millis(),
                max_ms: self.max_delay.as_millis(),
            });
        }
        if self.attempt_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Upper bound for `quiet_period` and `min_interval`.
pub const MAX_COALESCE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Debounce-with-floor configuration for a refresh channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Default debounce delay applied to each notification.
    #[serde(rename = "quiet_period_ms", with = "duration_ms")]
    pub quiet_period: Duration,
    /// Hard floor between two fires on the same channel.
    #[serde(rename = "min_interval_ms", with = "duration_ms")]
    pub min_interval: Duration,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(1000),
            min_interval: Duration::from_millis(4000),
        }
    }
}

impl CoalesceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub const fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Reject a quiet period longer than the floor, and windows too long
    /// to add to a clock instant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("quiet_period", self.quiet_period),
            ("min_interval", self.min_interval),
        ] {
            if value > MAX_COALESCE_WINDOW {
                return Err(ConfigError::WindowTooLong {
                    field,
                    ms: value.as_millis(),
                });
            }
        }
        if self.quiet_period > self.min_interval {
            return Err(ConfigError::QuietPeriodOrder {
                quiet_ms: self.quiet_period.as_millis(),
                min_interval_ms: self.min_interval.as_millis(),
            });
        }
        Ok(())
    }

    /// Longest a burst may keep a channel armed before it must fire.
    pub fn max_wait(&self, delay: Duration) -> Duration {
        delay.max(self.min_interval)
    }
}

/// Both configurations for one feature, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackstopOptions {
    pub retry: RetryConfig,
    pub coalesce: CoalesceConfig,
}

impl BackstopOptions {
    /// Parse and validate options from a JSON document. Missing keys take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.retry.validate()?;
        options.coalesce.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => {
                serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_delays() {
        let cfg = RetryConfig::new()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(1));
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DelayOrder {
                base_ms: 10_000,
                max_ms: 1_000
            })
        );
        assert_eq!(
            RetryConfig::new().with_max_attempts(0).validate(),
            Err(ConfigError::ZeroAttempts)
        );
    }

    #[test]
    fn options_from_partial_json() {
        let options = BackstopOptions::from_json(
            r#"{ "retry": { "max_attempts": 5, "base_delay_ms": 250, "attempt_timeout_ms": 2000 },
                 "coalesce": { "min_interval_ms": 8000 } }"#,
        )
        .unwrap();
        assert_eq!(options.retry.max_attempts, 5);
        assert_eq!(options.retry.base_delay, Duration::from_millis(250));
        assert_eq!(options.retry.max_delay, Duration::from_secs(30));
        assert_eq!(options.retry.attempt_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.coalesce.min_interval, Duration::from_secs(8));
        assert_eq!(options.coalesce.quiet_period, Duration::from_secs(1));
    }

    #[test]
    fn options_reject_invalid_retry_config() {
        let err = BackstopOptions::from_json(r#"{ "retry": { "max_attempts": 0 } }"#).unwrap_err();
        assert_eq!(err, ConfigError::ZeroAttempts);
        assert!(matches!(
            BackstopOptions::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn coalesce_config_bounds() {
        assert!(CoalesceConfig::default().validate().is_ok());
        let inverted = CoalesceConfig::new()
            .with_quiet_period(Duration::from_secs(5))
            .with_min_interval(Duration::from_secs(4));
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::QuietPeriodOrder {
                quiet_ms: 5_000,
                min_interval_ms: 4_000
            })
        );
        let huge = CoalesceConfig::new().with_min_interval(Duration::MAX);
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::WindowTooLong {
                field: "min_interval",
                ..
            })
        ));
    }

    #[test]
    fn options_reject_invalid_coalesce_config() {
        let err = BackstopOptions::from_json(
            r#"{ "coalesce": { "quiet_period_ms": 9000, "min_interval_ms": 4000 } }"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::QuietPeriodOrder {
                quiet_ms: 9_000,
                min_interval_ms: 4_000
            }
        );
        let huge = r#"{ "coalesce": { "min_interval_ms": 18446744073709551615 } }"#;
        assert!(matches!(
            BackstopOptions::from_json(huge),
            Err(ConfigError::WindowTooLong { .. })
        ));
    }

    #[test]
    fn max_wait_is_at_least_the_floor() {
        let cfg = CoalesceConfig::default();
        assert_eq!(cfg.max_wait(Duration::from_millis(200)), Duration::from_secs(4));
        assert_eq!(cfg.max_wait(Duration::from_secs(6)), Duration::from_secs(6));
    }
}
