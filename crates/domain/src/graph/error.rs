//! Load-time graph validation errors.

use crate::error::ValidationError;

use super::{NodeId, NodeType};

/// A rule graph that cannot be executed. Raised when the rule is loaded;
/// a rejected graph never runs.
#[derive(Debug, thiserror::Error)]
pub enum GraphValidationError {
    #[error("graph has no trigger node")]
    NoTrigger,

    #[error("node id {node} is used more than once")]
    DuplicateNode { node: NodeId },

    #[error("edge id {edge} is used more than once")]
    DuplicateEdge { edge: String },

    #[error("data of {node_type} node {node} is invalid")]
    InvalidNodeData {
        node: NodeId,
        node_type: NodeType,
        #[source]
        source: serde_json::Error,
    },

    #[error("edge {edge} references unknown node {node}")]
    UnknownNode { edge: String, node: NodeId },

    #[error("edge {edge} leaves node {node} through invalid handle {handle:?}")]
    InvalidSourceHandle {
        edge: String,
        node: NodeId,
        handle: Option<String>,
    },

    #[error("edge {edge} enters node {node} through invalid handle {handle:?}")]
    InvalidTargetHandle {
        edge: String,
        node: NodeId,
        handle: Option<String>,
    },

    #[error("join {node} has more than one edge on {handle}")]
    JoinInputOverloaded { node: NodeId, handle: &'static str },

    #[error("condition {node} has more than one edge on its {handle} output")]
    ConditionBranchOverloaded { node: NodeId, handle: &'static str },

    #[error("join {node} has an invalid timeout")]
    InvalidJoinTimeout {
        node: NodeId,
        #[source]
        source: ValidationError,
    },

    #[error("action {node} must not have outgoing edges")]
    ActionHasOutgoing { node: NodeId },

    #[error("trigger {node} must not have incoming edges")]
    TriggerHasIncoming { node: NodeId },

    #[error("node {node} has no incoming edge")]
    MissingIncoming { node: NodeId },

    #[error("node {node} is not reachable from any trigger")]
    Unreachable { node: NodeId },
}
