//! Node — one step of a rule graph.

use std::borrow::Borrow;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::telemetry::{Comparator, TelemetryValue};
use crate::time::TimeUnit;

use super::GraphValidationError;

/// Identifier of a node, as assigned by the graph editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Discriminant of a node, matching the editor's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Trigger,
    Condition,
    Action,
    Delay,
    Join,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trigger => "trigger",
            Self::Condition => "condition",
            Self::Action => "action",
            Self::Delay => "delay",
            Self::Join => "join",
        })
    }
}

/// Node as exchanged with the graph editor, before its data is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// Fires a run when telemetry for `variable` satisfies the comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerData {
    pub variable: String,
    #[serde(default)]
    pub comparator: Comparator,
    pub value: TelemetryValue,
    /// Restrict the trigger to readings from one device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Routes the token to its `true` or `false` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionData {
    pub variable: String,
    pub comparator: Comparator,
    pub value: TelemetryValue,
}

/// How a join combines its two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinMode {
    #[serde(rename = "AND", alias = "and", alias = "And")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "Or")]
    Or,
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// Dual-input merge point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinData {
    pub mode: JoinMode,
    /// Timeout expressed in `timeout_unit`.
    pub timeout_seconds: f64,
    #[serde(default)]
    pub timeout_unit: TimeUnit,
}

impl JoinData {
    /// The timeout converted to a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the timeout is not a positive,
    /// representable duration.
    pub fn timeout(&self) -> Result<Duration, ValidationError> {
        self.timeout_unit.to_duration(self.timeout_seconds)
    }
}

/// Suspends the token for `duration` units.
///
/// The unit is kept as written by the editor and only interpreted when a
/// token reaches the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayData {
    pub duration: f64,
    #[serde(default = "default_delay_unit")]
    pub unit: String,
}

fn default_delay_unit() -> String {
    TimeUnit::Seconds.to_string()
}

impl DelayData {
    /// Parse the unit and convert to a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for unknown units and non-positive or
    /// overflowing durations.
    pub fn to_duration(&self) -> Result<Duration, ValidationError> {
        let unit: TimeUnit = self.unit.parse()?;
        unit.to_duration(self.duration)
    }
}

/// Issues a command to an actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    pub actuator_id: String,
    pub mode: String,
}

/// Typed payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Trigger(TriggerData),
    Condition(ConditionData),
    Join(JoinData),
    Delay(DelayData),
    Action(ActionData),
}

impl NodeData {
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Trigger(_) => NodeType::Trigger,
            Self::Condition(_) => NodeType::Condition,
            Self::Join(_) => NodeType::Join,
            Self::Delay(_) => NodeType::Delay,
            Self::Action(_) => NodeType::Action,
        }
    }
}

/// A parsed node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub data: NodeData,
    pub disabled: bool,
}

impl Node {
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    pub(crate) fn from_document(doc: NodeDocument) -> Result<Self, GraphValidationError> {
        let NodeDocument {
            id,
            node_type,
            data,
            disabled,
        } = doc;
        let parsed = match node_type {
            NodeType::Trigger => serde_json::from_value(data).map(NodeData::Trigger),
            NodeType::Condition => serde_json::from_value(data).map(NodeData::Condition),
            NodeType::Join => serde_json::from_value(data).map(NodeData::Join),
            NodeType::Delay => serde_json::from_value(data).map(NodeData::Delay),
            NodeType::Action => serde_json::from_value(data).map(NodeData::Action),
        };
        let data = parsed.map_err(|source| GraphValidationError::InvalidNodeData {
            node: id.clone(),
            node_type,
            source,
        })?;
        Ok(Self { id, data, disabled })
    }

    pub(crate) fn to_document(&self) -> NodeDocument {
        let data = match &self.data {
            NodeData::Trigger(d) => serde_json::to_value(d),
            NodeData::Condition(d) => serde_json::to_value(d),
            NodeData::Join(d) => serde_json::to_value(d),
            NodeData::Delay(d) => serde_json::to_value(d),
            NodeData::Action(d) => serde_json::to_value(d),
        };
        NodeDocument {
            id: self.id.clone(),
            node_type: self.node_type(),
            data: data.unwrap_or_default(),
            disabled: self.disabled,
        }
    }
}
