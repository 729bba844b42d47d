//! Topic layout and payload codec.
//!
//! ```text
//! {base}/telemetry/{device_id}/{variable}   <- JSON scalar (bare strings accepted)
//! {base}/actuators/{actuator_id}/set        -> {"value": <bool|int>}
//! ```

use serde::Serialize;

use ruleflow_domain::execution::Command;
use ruleflow_domain::mode::ProtocolValue;
use ruleflow_domain::telemetry::{TelemetryEvent, TelemetryValue};

use crate::error::MqttError;

/// Subscription filter matching every telemetry topic under `base`.
#[must_use]
pub fn telemetry_filter(base: &str) -> String {
    format!("{base}/telemetry/+/+")
}

#[must_use]
pub fn command_topic(base: &str, actuator_id: &str) -> String {
    format!("{base}/actuators/{actuator_id}/set")
}

/// Split a telemetry topic into `(device_id, variable)`.
#[must_use]
pub fn parse_telemetry_topic<'a>(base: &str, topic: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = topic.strip_prefix(base)?.strip_prefix("/telemetry/")?;
    let (device_id, variable) = rest.split_once('/')?;
    if device_id.is_empty() || variable.is_empty() || variable.contains('/') {
        return None;
    }
    Some((device_id, variable))
}

/// Decode a telemetry payload.
///
/// # Errors
///
/// Returns [`MqttError::UnsupportedPayload`] for JSON objects, arrays and
/// `null`, and [`MqttError::PayloadParse`] for payloads that are neither
/// JSON nor text.
pub fn parse_payload(payload: &[u8]) -> Result<TelemetryValue, MqttError> {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Bool(value)) => Ok(TelemetryValue::Bool(value)),
        Ok(serde_json::Value::String(value)) => Ok(TelemetryValue::Text(value)),
        Ok(serde_json::Value::Number(number)) => number
            .as_f64()
            .map(TelemetryValue::Number)
            .ok_or_else(|| MqttError::UnsupportedPayload {
                payload: number.to_string(),
            }),
        Ok(other) => Err(MqttError::UnsupportedPayload {
            payload: other.to_string(),
        }),
        Err(err) => match std::str::from_utf8(payload).map(str::trim) {
            Ok(text) if !text.is_empty() => Ok(TelemetryValue::Text(text.to_string())),
            _ => Err(MqttError::PayloadParse(err)),
        },
    }
}

/// Decode a telemetry message into an event.
///
/// # Errors
///
/// Returns [`MqttError::Topic`] when the topic is not a telemetry topic, or
/// the payload error of [`parse_payload`].
pub fn parse_telemetry(base: &str, topic: &str, payload: &[u8]) -> Result<TelemetryEvent, MqttError> {
    let (device_id, variable) =
        parse_telemetry_topic(base, topic).ok_or_else(|| MqttError::Topic {
            topic: topic.to_string(),
        })?;
    let value = parse_payload(payload)?;
    Ok(TelemetryEvent::new(device_id, variable, value))
}

#[derive(Serialize)]
struct CommandPayload {
    value: ProtocolValue,
}

/// Encode the body published to an actuator's `set` topic.
///
/// # Errors
///
/// Returns [`MqttError::PayloadEncode`] if serialization fails.
pub fn command_payload(command: &Command) -> Result<Vec<u8>, MqttError> {
    serde_json::to_vec(&CommandPayload {
        value: command.value,
    })
    .map_err(MqttError::PayloadEncode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_topics_under_base() {
        assert_eq!(telemetry_filter("farm"), "farm/telemetry/+/+");
        assert_eq!(command_topic("farm", "pump-1"), "farm/actuators/pump-1/set");
    }

    #[test]
    fn should_parse_telemetry_topic() {
        assert_eq!(
            parse_telemetry_topic("farm/east", "farm/east/telemetry/greenhouse/temp"),
            Some(("greenhouse", "temp"))
        );
    }

    #[test]
    fn should_reject_foreign_or_malformed_topics() {
        assert_eq!(parse_telemetry_topic("farm", "other/telemetry/a/b"), None);
        assert_eq!(parse_telemetry_topic("farm", "farm/actuators/a/set"), None);
        assert_eq!(parse_telemetry_topic("farm", "farm/telemetry/a"), None);
        assert_eq!(parse_telemetry_topic("farm", "farm/telemetry/a/b/c"), None);
        assert_eq!(parse_telemetry_topic("farm", "farm/telemetry//temp"), None);
    }

    #[test]
    fn should_parse_scalar_payloads() {
        assert_eq!(parse_payload(b"31.5").unwrap(), TelemetryValue::Number(31.5));
        assert_eq!(parse_payload(b"true").unwrap(), TelemetryValue::Bool(true));
        assert_eq!(
            parse_payload(br#""open""#).unwrap(),
            TelemetryValue::Text("open".into())
        );
    }

    #[test]
    fn should_accept_bare_string_payload() {
        assert_eq!(
            parse_payload(b" closed \n").unwrap(),
            TelemetryValue::Text("closed".into())
        );
    }

    #[test]
    fn should_reject_structured_or_empty_payloads() {
        assert!(matches!(
            parse_payload(br#"{"value": 1}"#),
            Err(MqttError::UnsupportedPayload { .. })
        ));
        assert!(matches!(
            parse_payload(b"null"),
            Err(MqttError::UnsupportedPayload { .. })
        ));
        assert!(matches!(parse_payload(b""), Err(MqttError::PayloadParse(_))));
    }

    #[test]
    fn should_build_event_from_message() {
        let event = parse_telemetry("farm", "farm/telemetry/greenhouse/humidity", b"35").unwrap();
        assert_eq!(event.device_id, "greenhouse");
        assert_eq!(event.variable, "humidity");
        assert_eq!(event.value, TelemetryValue::Number(35.0));
    }

    #[test]
    fn should_encode_command_values() {
        let pid = Command {
            actuator_id: "heater".into(),
            value: ProtocolValue::Int(6),
        };
        let off = Command {
            actuator_id: "fan".into(),
            value: ProtocolValue::Bool(false),
        };
        assert_eq!(command_payload(&pid).unwrap(), br#"{"value":6}"#.to_vec());
        assert_eq!(command_payload(&off).unwrap(), br#"{"value":false}"#.to_vec());
    }
}
