//! Health checker configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// HealthCheckSpec tunes how often the operator checks a database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckSpec {
    /// How often, in seconds, to perform the health check.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub period_seconds: Option<i32>,
    /// Number of seconds after which a check times out.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub timeout_seconds: Option<i32>,
    /// Consecutive failures after which the database is reported unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub failure_threshold: Option<i32>,
    /// Disables the write check.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_write_check: bool,
}

/// HealthCheckDefaults are the values a kind fills in for unset health checker fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthCheckDefaults {
    /// Default for [`HealthCheckSpec::period_seconds`].
    pub period_seconds: i32,
    /// Default for [`HealthCheckSpec::timeout_seconds`].
    pub timeout_seconds: i32,
    /// Default for [`HealthCheckSpec::failure_threshold`].
    pub failure_threshold: i32,
}

impl HealthCheckDefaults {
    /// Defaults used by most kinds.
    pub const STANDARD: Self = Self::new(10, 10, 1);

    /// Builds a set of defaults.
    pub const fn new(period_seconds: i32, timeout_seconds: i32, failure_threshold: i32) -> Self {
        Self {
            period_seconds,
            timeout_seconds,
            failure_threshold,
        }
    }
}

impl HealthCheckSpec {
    /// Fills every unset field from `defaults`.
    pub fn set_defaults(&mut self, defaults: HealthCheckDefaults) {
        self.period_seconds.get_or_insert(defaults.period_seconds);
        self.timeout_seconds.get_or_insert(defaults.timeout_seconds);
        self.failure_threshold.get_or_insert(defaults.failure_threshold);
    }
}

/// Creates the health checker if missing and fills its unset fields.
pub fn set_health_checker_defaults(hc: &mut Option<HealthCheckSpec>, defaults: HealthCheckDefaults) {
    hc.get_or_insert_with(HealthCheckSpec::default)
        .set_defaults(defaults);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_unset_only() {
        let mut hc = Some(HealthCheckSpec {
            period_seconds: Some(45),
            ..Default::default()
        });
        set_health_checker_defaults(&mut hc, HealthCheckDefaults::new(30, 10, 3));
        assert_eq!(
            hc,
            Some(HealthCheckSpec {
                period_seconds: Some(45),
                timeout_seconds: Some(10),
                failure_threshold: Some(3),
                disable_write_check: false,
            })
        );
    }

    #[test]
    fn creates_missing() {
        let mut hc = None;
        set_health_checker_defaults(&mut hc, HealthCheckDefaults::STANDARD);
        let hc = hc.unwrap();
        assert!(hc.period_seconds.is_some());
        assert!(hc.timeout_seconds.is_some());
        assert!(hc.failure_threshold.is_some());
    }

    #[test]
    fn rejects_zero() {
        let hc = HealthCheckSpec {
            period_seconds: Some(0),
            ..Default::default()
        };
        assert!(hc.validate().is_err());
    }
}
