//! Device transport port — delivers actuator commands to devices.
//!
//! Delivery is at-most-once. The engine never retries a failed publish;
//! retries, if any, belong to the transport implementation.

use std::future::Future;

use ruleflow_domain::error::TransportError;
use ruleflow_domain::execution::Command;

/// Sends commands to actuators (MQTT broker, virtual devices, …).
pub trait DeviceTransport {
    /// Publish `command`, resolving once the transport accepted it.
    fn publish(&self, command: Command) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: DeviceTransport + Send + Sync> DeviceTransport for std::sync::Arc<T> {
    fn publish(&self, command: Command) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(command)
    }
}
