//! MQTT adapter error types.

use ruleflow_domain::error::{RuleflowError, TransportError};

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The MQTT client has not been initialised yet.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to parse an incoming MQTT payload as JSON.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),

    /// Failed to encode an outgoing command payload.
    #[error("failed to encode MQTT payload")]
    PayloadEncode(#[source] serde_json::Error),

    /// The payload is valid JSON but not a scalar reading.
    #[error("unsupported MQTT payload {payload}")]
    UnsupportedPayload { payload: String },

    /// A topic outside of the telemetry layout.
    #[error("unexpected MQTT topic {topic}")]
    Topic { topic: String },
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Client(err)
    }
}

impl From<MqttError> for TransportError {
    fn from(err: MqttError) -> Self {
        match err {
            MqttError::NotConnected => Self::NotConnected,
            other => Self::Other(Box::new(other)),
        }
    }
}

impl From<MqttError> for RuleflowError {
    fn from(err: MqttError) -> Self {
        Self::Transport(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_connected_error() {
        let err = MqttError::NotConnected;
        assert_eq!(err.to_string(), "MQTT client not connected");
    }

    #[test]
    fn should_convert_not_connected_to_transport_not_connected() {
        let err: TransportError = MqttError::NotConnected.into();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[test]
    fn should_wrap_other_errors_into_transport_other() {
        let err: TransportError = MqttError::Topic {
            topic: "elsewhere".into(),
        }
        .into();
        assert!(matches!(err, TransportError::Other(_)));
    }

    #[test]
    fn should_convert_into_ruleflow_transport_error() {
        let err: RuleflowError = MqttError::NotConnected.into();
        assert!(matches!(
            err,
            RuleflowError::Transport(TransportError::NotConnected)
        ));
    }

    #[test]
    fn should_display_payload_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err = MqttError::PayloadParse(json_err);
        assert_eq!(err.to_string(), "failed to parse MQTT payload");
    }
}
