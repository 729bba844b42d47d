//! Mode table — translates human-readable actuator modes into the values
//! devices understand on the wire.
//!
//! | Mode(s)             | Protocol value |
//! |---------------------|----------------|
//! | `on`                | `true`         |
//! | `off`               | `false`        |
//! | `timers_on`, `timers` | `3`          |
//! | `timers_off`        | `2`            |
//! | `ciclos`, `cycles`  | `5`            |
//! | `pid`               | `6`            |
//! | `pi`                | `7`            |
//! | `p`                 | `8`            |
//! | `pwm`, `pwd`        | `9`            |
//!
//! Lookups are case-insensitive and ignore surrounding whitespace. An
//! unknown mode never fails: it maps to `false` and carries an
//! [`UnknownModeWarning`] for the caller to report.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value sent to an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for ProtocolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => value.fmt(f),
            Self::Int(value) => value.fmt(f),
        }
    }
}

struct ModeEntry {
    aliases: &'static [&'static str],
    value: ProtocolValue,
    label: &'static str,
}

const MODE_TABLE: &[ModeEntry] = &[
    ModeEntry {
        aliases: &["on"],
        value: ProtocolValue::Bool(true),
        label: "On",
    },
    ModeEntry {
        aliases: &["off"],
        value: ProtocolValue::Bool(false),
        label: "Off",
    },
    ModeEntry {
        aliases: &["timers_on", "timers"],
        value: ProtocolValue::Int(3),
        label: "Timers",
    },
    ModeEntry {
        aliases: &["timers_off"],
        value: ProtocolValue::Int(2),
        label: "Timers off",
    },
    ModeEntry {
        aliases: &["ciclos", "cycles"],
        value: ProtocolValue::Int(5),
        label: "Cycles",
    },
    ModeEntry {
        aliases: &["pid"],
        value: ProtocolValue::Int(6),
        label: "PID",
    },
    ModeEntry {
        aliases: &["pi"],
        value: ProtocolValue::Int(7),
        label: "PI",
    },
    ModeEntry {
        aliases: &["p"],
        value: ProtocolValue::Int(8),
        label: "P",
    },
    ModeEntry {
        aliases: &["pwm", "pwd"],
        value: ProtocolValue::Int(9),
        label: "PWM",
    },
];

fn lookup(mode: &str) -> Option<&'static ModeEntry> {
    let normalized = mode.trim().to_ascii_lowercase();
    MODE_TABLE
        .iter()
        .find(|entry| entry.aliases.contains(&normalized.as_str()))
}

/// A mode string that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actuator mode {mode:?}, defaulting to false")]
pub struct UnknownModeWarning {
    pub mode: String,
}

/// Result of mapping a mode: the value to send plus an optional warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeMapping {
    pub value: ProtocolValue,
    pub warning: Option<UnknownModeWarning>,
}

/// Map `mode` to its protocol value.
///
/// Unknown modes map to `false` with [`ModeMapping::warning`] set.
#[must_use]
pub fn to_protocol_value(mode: &str) -> ModeMapping {
    match lookup(mode) {
        Some(entry) => ModeMapping {
            value: entry.value,
            warning: None,
        },
        None => ModeMapping {
            value: ProtocolValue::Bool(false),
            warning: Some(UnknownModeWarning {
                mode: mode.to_string(),
            }),
        },
    }
}

/// Whether `mode` is present in the table.
#[must_use]
pub fn is_valid_mode(mode: &str) -> bool {
    lookup(mode).is_some()
}

/// Display label for `mode`, if known.
#[must_use]
pub fn label(mode: &str) -> Option<&'static str> {
    lookup(mode).map(|entry| entry.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: &[(&str, ProtocolValue)] = &[
        ("on", ProtocolValue::Bool(true)),
        ("off", ProtocolValue::Bool(false)),
        ("timers_on", ProtocolValue::Int(3)),
        ("timers", ProtocolValue::Int(3)),
        ("timers_off", ProtocolValue::Int(2)),
        ("ciclos", ProtocolValue::Int(5)),
        ("cycles", ProtocolValue::Int(5)),
        ("pid", ProtocolValue::Int(6)),
        ("pi", ProtocolValue::Int(7)),
        ("p", ProtocolValue::Int(8)),
        ("pwm", ProtocolValue::Int(9)),
        ("pwd", ProtocolValue::Int(9)),
    ];

    #[test]
    fn should_map_pid_in_uppercase_to_six() {
        let mapping = to_protocol_value("PID");
        assert_eq!(mapping.value, ProtocolValue::Int(6));
        assert!(mapping.warning.is_none());
    }

    #[test]
    fn should_map_every_table_entry_regardless_of_case_and_whitespace() {
        for (mode, expected) in EXPECTED {
            let variants = [
                (*mode).to_string(),
                mode.to_uppercase(),
                format!("  {mode}\t"),
                format!(" {} ", mode.to_uppercase()),
            ];
            for variant in &variants {
                let mapping = to_protocol_value(variant);
                assert_eq!(mapping.value, *expected, "mode {variant:?}");
                assert!(mapping.warning.is_none(), "mode {variant:?}");
                assert!(is_valid_mode(variant));
            }
        }
    }

    #[test]
    fn should_default_unknown_mode_to_false_with_warning() {
        let mapping = to_protocol_value("unknown");
        assert_eq!(mapping.value, ProtocolValue::Bool(false));
        assert_eq!(
            mapping.warning,
            Some(UnknownModeWarning {
                mode: "unknown".to_string()
            })
        );
        assert!(!is_valid_mode("unknown"));
    }

    #[test]
    fn should_not_accept_prefixes_of_known_modes() {
        assert!(!is_valid_mode("pw"));
        assert!(!is_valid_mode("timer"));
        assert!(!is_valid_mode(""));
    }

    #[test]
    fn should_return_labels_for_known_modes() {
        assert_eq!(label("pwd"), Some("PWM"));
        assert_eq!(label(" Ciclos "), Some("Cycles"));
        assert_eq!(label("bogus"), None);
    }

    #[test]
    fn should_serialize_protocol_values_as_bare_json() {
        assert_eq!(
            serde_json::to_string(&ProtocolValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(serde_json::to_string(&ProtocolValue::Int(6)).unwrap(), "6");
    }
}
