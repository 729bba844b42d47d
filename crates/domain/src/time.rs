//! Time and timestamp helpers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// UTC timestamp used for event times and run bookkeeping.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Unit in which delay durations and join timeouts are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Number of seconds in one unit.
    #[must_use]
    pub fn seconds(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }

    /// Convert `value` units into a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonPositiveDuration`] when `value` is zero,
    /// negative or not finite, and [`ValidationError::DurationOverflow`] when
    /// the result does not fit in a [`Duration`].
    pub fn to_duration(self, value: f64) -> Result<Duration, ValidationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::NonPositiveDuration { value });
        }
        Duration::try_from_secs_f64(value * self.seconds()).map_err(|_| {
            ValidationError::DurationOverflow {
                value,
                unit: self.to_string(),
            }
        })
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
        })
    }
}

impl FromStr for TimeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Self::Hours),
            _ => Err(ValidationError::UnknownTimeUnit {
                unit: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeUnit> for String {
    fn from(unit: TimeUnit) -> Self {
        unit.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_convert_minutes_to_duration() {
        let d = TimeUnit::Minutes.to_duration(1.5).unwrap();
        assert_eq!(d, Duration::from_secs(90));
    }

    #[test]
    fn should_reject_zero_and_negative_durations() {
        assert!(matches!(
            TimeUnit::Seconds.to_duration(0.0),
            Err(ValidationError::NonPositiveDuration { .. })
        ));
        assert!(matches!(
            TimeUnit::Hours.to_duration(-2.0),
            Err(ValidationError::NonPositiveDuration { .. })
        ));
        assert!(TimeUnit::Seconds.to_duration(f64::NAN).is_err());
    }

    #[test]
    fn should_reject_duration_overflow() {
        let result = TimeUnit::Hours.to_duration(f64::MAX / 2.0);
        assert!(matches!(
            result,
            Err(ValidationError::DurationOverflow { .. })
        ));
    }

    #[test]
    fn should_parse_units_case_insensitively() {
        assert_eq!("Seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!(" MINUTES ".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
        assert_eq!("h".parse::<TimeUnit>().unwrap(), TimeUnit::Hours);
        assert!("fortnights".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn should_deserialize_unit_aliases_from_json() {
        let unit: TimeUnit = serde_json::from_str("\"min\"").unwrap();
        assert_eq!(unit, TimeUnit::Minutes);
        assert!(serde_json::from_str::<TimeUnit>("\"weeks\"").is_err());
    }
}
