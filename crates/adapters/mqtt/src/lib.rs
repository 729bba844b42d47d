//! # ruleflow-adapter-mqtt
//!
//! MQTT adapter — connects the rule engine to MQTT-based devices.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker
//! - Subscribe to device telemetry topics and forward readings to the engine
//! - Publish actuator commands (at-most-once, never retried)
//!
//! ## Dependency rule
//! Same as other adapters: depends on `ruleflow-app` and `ruleflow-domain`.

pub mod config;
pub mod error;
pub mod topic;

pub use config::MqttConfig;
pub use error::MqttError;

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use ruleflow_app::ports::DeviceTransport;
use ruleflow_domain::error::TransportError;
use ruleflow_domain::execution::Command;
use ruleflow_domain::telemetry::TelemetryEvent;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Create the command transport and the telemetry listener sharing one
/// broker connection.
///
/// Nothing touches the network until [`MqttTelemetry::run`] polls the
/// connection.
#[must_use]
pub fn connect(config: &MqttConfig) -> (MqttTransport, MqttTelemetry) {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(config.keep_alive());
    let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
    (
        MqttTransport {
            client: client.clone(),
            base_topic: config.base_topic.clone(),
        },
        MqttTelemetry {
            client,
            eventloop,
            base_topic: config.base_topic.clone(),
        },
    )
}

/// Publishes commands on `{base}/actuators/{id}/set`.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    base_topic: String,
}

impl DeviceTransport for MqttTransport {
    fn publish(&self, command: Command) -> impl Future<Output = Result<(), TransportError>> + Send {
        let client = self.client.clone();
        let topic = topic::command_topic(&self.base_topic, &command.actuator_id);
        let payload = topic::command_payload(&command);
        async move {
            client
                .publish(topic.as_str(), QoS::AtMostOnce, false, payload?)
                .await
                .map_err(MqttError::from)?;
            tracing::debug!(%topic, %command, "command published");
            Ok(())
        }
    }
}

/// Drives the broker connection and forwards telemetry readings.
pub struct MqttTelemetry {
    client: AsyncClient,
    eventloop: EventLoop,
    base_topic: String,
}

impl MqttTelemetry {
    /// Poll the connection until `sink` is closed.
    ///
    /// Subscribes on every (re)connection; connection errors are logged and
    /// retried after a short pause.
    pub async fn run(mut self, sink: mpsc::Sender<TelemetryEvent>) {
        let filter = topic::telemetry_filter(&self.base_topic);
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(%filter, "connected to MQTT broker");
                    if let Err(error) = self.client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                        tracing::warn!(%error, "unable to subscribe to telemetry");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(message))) => {
                    match topic::parse_telemetry(&self.base_topic, &message.topic, &message.payload)
                    {
                        Ok(event) => {
                            if sink.send(event).await.is_err() {
                                tracing::info!("telemetry consumer gone, stopping MQTT listener");
                                return;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(topic = %message.topic, %error, "ignoring MQTT message");
                        }
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "MQTT connection error, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_queue_command_without_broker() {
        let config = MqttConfig::default();
        let (transport, _telemetry) = connect(&config);

        let result = transport
            .publish(Command {
                actuator_id: "heater".into(),
                value: ruleflow_domain::mode::ProtocolValue::Int(6),
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_fail_once_connection_is_dropped() {
        let config = MqttConfig::default();
        let (transport, telemetry) = connect(&config);
        drop(telemetry);

        let result = transport
            .publish(Command {
                actuator_id: "heater".into(),
                value: ruleflow_domain::mode::ProtocolValue::Bool(true),
            })
            .await;

        assert!(matches!(result, Err(TransportError::Other(_))));
    }
}
