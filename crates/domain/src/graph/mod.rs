//! Rule graph — trigger, condition, join, delay and action nodes wired by
//! edges.
//!
//! A [`GraphDocument`] is what the editor produces. [`Graph::validate`]
//! turns it into an immutable [`Graph`]: nodes and edges live in arenas
//! addressed by [`NodeIndex`] / [`EdgeIndex`], and an adjacency index keyed
//! by `(node, output port)` makes traversal lookups O(1). A validated graph
//! is never mutated and is shared by every run of its rule.

mod edge;
mod error;
mod node;

pub use edge::{
    Edge, EdgeDocument, EdgeIndex, JoinInput, NodeIndex, SourcePort, TargetPort, handle,
};
pub use error::GraphValidationError;
pub use node::{
    ActionData, ConditionData, DelayData, JoinData, JoinMode, Node, NodeData, NodeDocument,
    NodeId, NodeType, TriggerData,
};

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Nodes and edges as exchanged with the graph editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

/// A validated, immutable rule graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, NodeIndex>,
    outgoing: HashMap<(NodeIndex, SourcePort), Vec<EdgeIndex>>,
    triggers: Vec<NodeIndex>,
}

impl Graph {
    /// Validate an editor document and build the traversal indexes.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphValidationError`] found.
    pub fn validate(document: GraphDocument) -> Result<Self, GraphValidationError> {
        let GraphDocument {
            nodes: node_docs,
            edges: edge_docs,
        } = document;

        let mut nodes = Vec::with_capacity(node_docs.len());
        let mut index = HashMap::with_capacity(node_docs.len());
        for doc in node_docs {
            let node = Node::from_document(doc)?;
            if index.contains_key(&node.id) {
                return Err(GraphValidationError::DuplicateNode { node: node.id });
            }
            index.insert(node.id.clone(), NodeIndex(nodes.len()));
            nodes.push(node);
        }

        let mut edges = Vec::with_capacity(edge_docs.len());
        let mut edge_ids = HashSet::with_capacity(edge_docs.len());
        for doc in edge_docs {
            if !edge_ids.insert(doc.id.clone()) {
                return Err(GraphValidationError::DuplicateEdge { edge: doc.id });
            }
            edges.push(resolve_edge(&nodes, &index, doc)?);
        }

        let mut outgoing: HashMap<(NodeIndex, SourcePort), Vec<EdgeIndex>> = HashMap::new();
        let mut successors = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (position, edge) in edges.iter().enumerate() {
            outgoing
                .entry((edge.source, edge.source_port))
                .or_default()
                .push(EdgeIndex(position));
            successors[edge.source.0].push(edge.target);
            incoming[edge.target.0].push(edge.target_port);
        }

        let mut triggers = Vec::new();
        for (position, node) in nodes.iter().enumerate() {
            let node_index = NodeIndex(position);
            let inputs = &incoming[position];
            match &node.data {
                NodeData::Trigger(_) => {
                    if !inputs.is_empty() {
                        return Err(GraphValidationError::TriggerHasIncoming {
                            node: node.id.clone(),
                        });
                    }
                    triggers.push(node_index);
                    continue;
                }
                NodeData::Action(_) => {
                    if !successors[position].is_empty() {
                        return Err(GraphValidationError::ActionHasOutgoing {
                            node: node.id.clone(),
                        });
                    }
                }
                NodeData::Condition(_) => {
                    for (branch, name) in [
                        (true, handle::CONDITION_TRUE),
                        (false, handle::CONDITION_FALSE),
                    ] {
                        let count = outgoing
                            .get(&(node_index, SourcePort::Branch(branch)))
                            .map_or(0, Vec::len);
                        if count > 1 {
                            return Err(GraphValidationError::ConditionBranchOverloaded {
                                node: node.id.clone(),
                                handle: name,
                            });
                        }
                    }
                }
                NodeData::Join(join) => {
                    join.timeout()
                        .map_err(|source| GraphValidationError::InvalidJoinTimeout {
                            node: node.id.clone(),
                            source,
                        })?;
                    for input in [JoinInput::Top, JoinInput::Bottom] {
                        let count = inputs
                            .iter()
                            .filter(|port| **port == TargetPort::Join(input))
                            .count();
                        if count > 1 {
                            return Err(GraphValidationError::JoinInputOverloaded {
                                node: node.id.clone(),
                                handle: input.handle(),
                            });
                        }
                    }
                }
                NodeData::Delay(_) => {}
            }
            if inputs.is_empty() {
                return Err(GraphValidationError::MissingIncoming {
                    node: node.id.clone(),
                });
            }
        }

        if triggers.is_empty() {
            return Err(GraphValidationError::NoTrigger);
        }

        let mut reached = vec![false; nodes.len()];
        let mut queue: VecDeque<NodeIndex> = triggers.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if std::mem::replace(&mut reached[current.0], true) {
                continue;
            }
            queue.extend(successors[current.0].iter().copied());
        }
        if let Some(position) = reached.iter().position(|r| !r) {
            return Err(GraphValidationError::Unreachable {
                node: nodes[position].id.clone(),
            });
        }

        Ok(Self {
            nodes,
            edges,
            index,
            outgoing,
            triggers,
        })
    }

    /// Node stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not come from this graph.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    /// Arena position of the node with editor id `id`.
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Edges leaving `node` through `port`, in document order.
    pub fn outgoing(&self, node: NodeIndex, port: SourcePort) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&(node, port))
            .into_iter()
            .flatten()
            .map(|index| &self.edges[index.0])
    }

    /// All trigger nodes, in document order.
    pub fn triggers(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.triggers.iter().map(|index| (*index, self.node(*index)))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Convert back to the editor representation.
    #[must_use]
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.iter().map(Node::to_document).collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| EdgeDocument {
                    id: edge.id.clone(),
                    source: self.node(edge.source).id.clone(),
                    source_handle: edge.source_handle.clone(),
                    target: self.node(edge.target).id.clone(),
                    target_handle: edge.target_handle.clone(),
                })
                .collect(),
        }
    }
}

impl TryFrom<GraphDocument> for Graph {
    type Error = GraphValidationError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        Self::validate(document)
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        graph.to_document()
    }
}

fn resolve_edge(
    nodes: &[Node],
    index: &HashMap<NodeId, NodeIndex>,
    doc: EdgeDocument,
) -> Result<Edge, GraphValidationError> {
    let lookup = |id: &NodeId| {
        index
            .get(id)
            .copied()
            .ok_or_else(|| GraphValidationError::UnknownNode {
                edge: doc.id.clone(),
                node: id.clone(),
            })
    };
    let source = lookup(&doc.source)?;
    let target = lookup(&doc.target)?;

    let source_node = &nodes[source.0];
    let source_port = match (&source_node.data, doc.source_handle.as_deref()) {
        (NodeData::Condition(_), Some(handle::CONDITION_TRUE))
        | (NodeData::Join(_), Some(handle::JOIN_OUTPUT_TRUE)) => SourcePort::Branch(true),
        (NodeData::Condition(_), Some(handle::CONDITION_FALSE))
        | (NodeData::Join(_), Some(handle::JOIN_OUTPUT_FALSE)) => SourcePort::Branch(false),
        (NodeData::Condition(_) | NodeData::Join(_), other) => {
            return Err(GraphValidationError::InvalidSourceHandle {
                edge: doc.id.clone(),
                node: source_node.id.clone(),
                handle: other.map(str::to_string),
            });
        }
        _ => SourcePort::Out,
    };

    let target_node = &nodes[target.0];
    let target_port = match &target_node.data {
        NodeData::Join(_) => doc
            .target_handle
            .as_deref()
            .and_then(JoinInput::from_handle)
            .map(TargetPort::Join)
            .ok_or_else(|| GraphValidationError::InvalidTargetHandle {
                edge: doc.id.clone(),
                node: target_node.id.clone(),
                handle: doc.target_handle.clone(),
            })?,
        _ => TargetPort::In,
    };

    Ok(Edge {
        id: doc.id,
        source,
        source_port,
        target,
        target_port,
        source_handle: doc.source_handle,
        target_handle: doc.target_handle,
    })
}
