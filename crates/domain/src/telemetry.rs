//! Telemetry values, comparators, and the latest-value snapshot that
//! conditions read from.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A single telemetry reading or a literal a rule compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl TelemetryValue {
    /// Numeric view of the value, parsing numeric strings.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Number(n) => n.fmt(f),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for TelemetryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for TelemetryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Comparison applied between an observed value and a rule literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[default]
    #[serde(rename = "==", alias = "eq", alias = "=")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
}

impl Comparator {
    /// Evaluate `observed <op> expected`.
    ///
    /// Numeric comparison is used when both sides have a numeric view.
    /// Otherwise only equality and inequality can hold, compared textually.
    #[must_use]
    pub fn compare(self, observed: &TelemetryValue, expected: &TelemetryValue) -> bool {
        if let (Some(a), Some(b)) = (observed.as_number(), expected.as_number()) {
            return match self {
                Self::Eq => (a - b).abs() < f64::EPSILON,
                Self::Ne => (a - b).abs() >= f64::EPSILON,
                Self::Gt => a > b,
                Self::Gte => a >= b,
                Self::Lt => a < b,
                Self::Lte => a <= b,
            };
        }
        let equal = observed.as_text() == expected.as_text();
        match self {
            Self::Eq => equal,
            Self::Ne => !equal,
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => false,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        })
    }
}

/// An inbound reading from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub device_id: String,
    pub variable: String,
    pub value: TelemetryValue,
    pub received_at: Timestamp,
}

impl TelemetryEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        device_id: impl Into<String>,
        variable: impl Into<String>,
        value: impl Into<TelemetryValue>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            variable: variable.into(),
            value: value.into(),
            received_at: crate::time::now(),
        }
    }
}

/// Latest known value per telemetry variable.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    values: HashMap<String, TelemetryValue>,
}

impl TelemetrySnapshot {
    /// Record `event` as the latest value of its variable.
    pub fn record(&mut self, event: &TelemetryEvent) {
        self.values
            .insert(event.variable.clone(), event.value.clone());
    }

    /// Latest value of `variable`, if any was ever recorded.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&TelemetryValue> {
        self.values.get(variable)
    }
}
