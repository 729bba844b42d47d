//! Execution events — what the engine reports while running rules.
//!
//! These records are the only coupling point between the engine and any
//! visualization layer. Presentation flags such as "executing" or
//! "waiting" are derived by observers from the event stream; the engine
//! keeps no rendering state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::id::{RuleId, RunId};
use crate::mode::ProtocolValue;
use crate::time::Timestamp;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Transition of a token through a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePhase {
    Entering,
    Executing,
    Waiting,
    Left,
}

/// Minimal per-node state handed to visualization observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverState {
    Executing,
    Waiting,
    Idle,
}

impl From<NodePhase> for ObserverState {
    fn from(phase: NodePhase) -> Self {
        match phase {
            NodePhase::Entering | NodePhase::Executing => Self::Executing,
            NodePhase::Waiting => Self::Waiting,
            NodePhase::Left => Self::Idle,
        }
    }
}

/// One node transition of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub run_id: RunId,
    pub node_id: NodeId,
    pub phase: NodePhase,
    pub at: Timestamp,
}

impl NodeEvent {
    #[must_use]
    pub fn observer_state(&self) -> ObserverState {
        self.phase.into()
    }
}

/// Command handed to a device transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub actuator_id: String,
    pub value: ProtocolValue,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.actuator_id, self.value)
    }
}

/// Everything the engine publishes to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RunStarted {
        run_id: RunId,
        rule_id: RuleId,
        trigger: NodeId,
        at: Timestamp,
    },
    Node(NodeEvent),
    CommandIssued {
        run_id: RunId,
        node_id: NodeId,
        command: Command,
        at: Timestamp,
    },
    RunFinished {
        run_id: RunId,
        rule_id: RuleId,
        status: RunStatus,
        at: Timestamp,
    },
}

impl EngineEvent {
    /// Run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::CommandIssued { run_id, .. }
            | Self::RunFinished { run_id, .. } => *run_id,
            Self::Node(event) => event.run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_phases_to_observer_states() {
        assert_eq!(
            ObserverState::from(NodePhase::Entering),
            ObserverState::Executing
        );
        assert_eq!(
            ObserverState::from(NodePhase::Executing),
            ObserverState::Executing
        );
        assert_eq!(
            ObserverState::from(NodePhase::Waiting),
            ObserverState::Waiting
        );
        assert_eq!(ObserverState::from(NodePhase::Left), ObserverState::Idle);
    }

    #[test]
    fn should_flag_only_final_statuses_as_terminal() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::TimedOut.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn should_serialize_node_event_with_type_tag() {
        let run_id = RunId::new();
        let event = EngineEvent::Node(NodeEvent {
            run_id,
            node_id: NodeId::from("j"),
            phase: NodePhase::Waiting,
            at: crate::time::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node");
        assert_eq!(json["phase"], "waiting");
        assert_eq!(json["node_id"], "j");
        assert_eq!(event.run_id(), run_id);
    }

    #[test]
    fn should_display_command() {
        let command = Command {
            actuator_id: "pump-1".to_string(),
            value: ProtocolValue::Int(6),
        };
        assert_eq!(command.to_string(), "pump-1=6");
    }
}
