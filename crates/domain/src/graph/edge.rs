//! Edge — a directed connection between two node handles.

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Fixed handle identifiers of ported nodes.
pub mod handle {
    pub const CONDITION_TRUE: &str = "true";
    pub const CONDITION_FALSE: &str = "false";
    pub const JOIN_INPUT_TOP: &str = "input-top";
    pub const JOIN_INPUT_BOTTOM: &str = "input-bottom";
    pub const JOIN_OUTPUT_TRUE: &str = "output-true";
    pub const JOIN_OUTPUT_FALSE: &str = "output-false";
}

/// Edge as exchanged with the graph editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDocument {
    pub id: String,
    pub source: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Position of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    /// Index for arena position `position`.
    ///
    /// Only meaningful for the graph that produced the position.
    #[must_use]
    pub fn new(position: usize) -> Self {
        Self(position)
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Position of an edge in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIndex(pub(crate) usize);

/// Output side of an edge.
///
/// Single-output nodes ignore the editor's handle id; Condition and Join
/// outputs are a boolean branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourcePort {
    Out,
    Branch(bool),
}

/// One of the two inputs of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinInput {
    Top,
    Bottom,
}

impl JoinInput {
    #[must_use]
    pub fn handle(self) -> &'static str {
        match self {
            Self::Top => handle::JOIN_INPUT_TOP,
            Self::Bottom => handle::JOIN_INPUT_BOTTOM,
        }
    }

    #[must_use]
    pub fn from_handle(handle: &str) -> Option<Self> {
        match handle {
            handle::JOIN_INPUT_TOP => Some(Self::Top),
            handle::JOIN_INPUT_BOTTOM => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// Input side of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPort {
    In,
    Join(JoinInput),
}

/// A resolved edge whose endpoints are arena indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: NodeIndex,
    pub source_port: SourcePort,
    pub target: NodeIndex,
    pub target_port: TargetPort,
    pub(crate) source_handle: Option<String>,
    pub(crate) target_handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_deserialize_edge_with_handles() {
        let json = serde_json::json!({
            "id": "e1",
            "source": "cond",
            "sourceHandle": "true",
            "target": "join",
            "targetHandle": "input-top"
        });
        let edge: EdgeDocument = serde_json::from_value(json).unwrap();
        assert_eq!(edge.source_handle.as_deref(), Some("true"));
        assert_eq!(edge.target_handle.as_deref(), Some("input-top"));
    }

    #[test]
    fn should_deserialize_edge_without_handles() {
        let json = serde_json::json!({"id": "e1", "source": "a", "target": "b"});
        let edge: EdgeDocument = serde_json::from_value(json).unwrap();
        assert!(edge.source_handle.is_none());
        assert!(edge.target_handle.is_none());
    }

    #[test]
    fn should_map_join_handles_both_ways() {
        assert_eq!(JoinInput::from_handle("input-top"), Some(JoinInput::Top));
        assert_eq!(JoinInput::Bottom.handle(), "input-bottom");
        assert_eq!(JoinInput::from_handle("output-true"), None);
    }
}
