//! Typed identifier newtypes backed by UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Rule`](crate::rule::Rule).
    RuleId
);

define_id!(
    /// Unique identifier for one execution of a rule.
    RunId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_read_rule_id_from_bare_json_string() {
        let json = serde_json::json!("0b3e6a52-54c2-4a1e-9a8e-1d2f7c4e9b10");
        let id: RuleId = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(id.to_string(), "0b3e6a52-54c2-4a1e-9a8e-1d2f7c4e9b10");
        assert_eq!(serde_json::to_value(id).unwrap(), json);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = RunId::from_str("not-a-uuid");
        assert!(result.is_err());
    }
}
