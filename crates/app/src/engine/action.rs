//! Action execution — maps an action's mode and hands the command to the
//! device transport.

use ruleflow_domain::error::TransportError;
use ruleflow_domain::execution::Command;
use ruleflow_domain::graph::{ActionData, Node, NodeData};
use ruleflow_domain::mode::to_protocol_value;

use crate::ports::DeviceTransport;

pub struct ActionExecutor<T> {
    transport: T,
}

impl<T: DeviceTransport> ActionExecutor<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Build the command for `action`.
    ///
    /// Unknown modes are logged and sent as `false`.
    #[must_use]
    pub fn command(action: &ActionData) -> Command {
        let mapping = to_protocol_value(&action.mode);
        if let Some(warning) = mapping.warning {
            tracing::warn!(actuator = %action.actuator_id, %warning, "unknown actuator mode");
        }
        Command {
            actuator_id: action.actuator_id.clone(),
            value: mapping.value,
        }
    }

    /// Publish the command of `node`.
    ///
    /// Disabled nodes and non-action nodes are skipped and return `None`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when the publish fails.
    pub async fn execute(&self, node: &Node) -> Result<Option<Command>, TransportError> {
        let NodeData::Action(action) = &node.data else {
            return Ok(None);
        };
        if node.disabled {
            return Ok(None);
        }
        let command = Self::command(action);
        self.transport.publish(command.clone()).await?;
        tracing::debug!(node = %node.id, %command, "command published");
        Ok(Some(command))
    }
}
