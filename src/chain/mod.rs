//! Chain assembly and execution

mod edge;
mod engine;
mod node;


pub use edge::Edge;
pub use engine::{topological_sort, Chain};
pub use node::{Action, ActionError, DataMap, FnAction, IrMap, Node, NodeType};

use thiserror::Error;

/// Errors from chain construction and execution.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The edge set contains a cycle.
    #[error("a cycle exists in the graph")]
    NotDag,

    /// An edge references a node id absent from the node mapping.
    #[error("missing node from an edge: {0}")]
    MissingNode(String),

    /// Inputs contained keys the node does not declare.
    #[error("invalid keys passed to node '{node_id}': {keys:?}")]
    UnknownInputs { node_id: String, keys: Vec<String> },

    /// A required IR key was not produced by any upstream node.
    #[error("missing value for {0}")]
    MissingIntermediate(String),

    /// The node's underlying callable failed; `trace` carries the full
    /// diagnostic.
    #[error("node '{node_id}' failed: {message}")]
    NodeExecution {
        node_id: String,
        message: String,
        trace: String,
    },
}
