//! Edge: a directed, named-value connection between two nodes

use serde::{Deserialize, Serialize};

/// A directed connection in a chain. Each entry of `connections` pairs a
/// source output name with the target field it feeds; several pairs between
/// the same two nodes are allowed. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src_node_id: String,
    pub trg_node_id: String,
    pub connections: Vec<(String, String)>,
}

impl Edge {
    pub fn new<A, B>(
        src_node_id: impl Into<String>,
        trg_node_id: impl Into<String>,
        connections: impl IntoIterator<Item = (A, B)>,
    ) -> Self
    where
        A: Into<String>,
        B: Into<String>,
    {
        Edge {
            src_node_id: src_node_id.into(),
            trg_node_id: trg_node_id.into(),
            connections: connections
                .into_iter()
                .map(|(src, trg)| (src.into(), trg.into()))
                .collect(),
        }
    }
}
