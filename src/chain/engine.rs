//! Chain: DAG validation, topological order and the sequential executor

use super::edge::Edge;
use super::node::{DataMap, IrMap, Node};
use super::ChainError;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error};

/// Convert the edge list to an adjacency list, preserving edge insertion
/// order. Queue ties in the sort resolve in this order, which keeps the IR
/// map construction reproducible.
fn edges_to_adjacency(edges: &[Edge]) -> IndexMap<String, Vec<String>> {
    let mut adjacency: IndexMap<String, Vec<String>> = IndexMap::new();
    for edge in edges {
        adjacency
            .entry(edge.src_node_id.clone())
            .or_default()
            .push(edge.trg_node_id.clone());
    }
    adjacency
}

/// Kahn's algorithm over the edge set.
///
/// Node ids that appear only as edge targets are terminal; they count toward
/// the expected order length separately. An order shorter than expected
/// means an unremovable cycle.
pub fn topological_sort(edges: &[Edge]) -> Result<Vec<String>, ChainError> {
    let adjacency = edges_to_adjacency(edges);
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for targets in adjacency.values() {
        for target in targets {
            *in_degree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = adjacency
        .keys()
        .map(String::as_str)
        .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut terminal_count = 0usize;
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        let neighbours = adjacency.get(id).map(Vec::as_slice).unwrap_or_default();
        if neighbours.is_empty() {
            terminal_count += 1;
        }
        for neighbour in neighbours {
            if let Some(degree) = in_degree.get_mut(neighbour.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(neighbour.as_str());
                }
            }
        }
    }

    if order.len() != adjacency.len() + terminal_count {
        return Err(ChainError::NotDag);
    }
    Ok(order)
}

/// A validated DAG of nodes with a cached topological order.
///
/// Read-only once constructed. Concurrent executions against the same chain
/// are safe: each run owns its IR map, and nodes never hold run state.
#[derive(Debug, Clone)]
pub struct Chain {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
    topo_order: Vec<String>,
}

impl Chain {
    /// Validate the edge set and cache the execution order. Fails with
    /// [`ChainError::NotDag`] on cycles and [`ChainError::MissingNode`] when
    /// an edge references an id absent from `nodes`.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, ChainError> {
        let nodes: IndexMap<String, Node> = nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        let topo_order = topological_sort(&edges)?;
        for node_id in &topo_order {
            if !nodes.contains_key(node_id.as_str()) {
                return Err(ChainError::MissingNode(node_id.clone()));
            }
        }
        Ok(Chain {
            nodes,
            edges,
            topo_order,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn topo_order(&self) -> &[String] {
        &self.topo_order
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The wire form sent to UI builders.
    pub fn to_value(&self) -> Value {
        json!({
            "nodes": self.nodes.values().collect::<Vec<_>>(),
            "edges": self.edges,
        })
    }

    /// Execute the chain sequentially in topological order.
    ///
    /// Each node reads its inputs from upstream IR entries named by its
    /// incoming edges, plus any key of `inputs` matching a declared field —
    /// shared inputs such as an API key fan out to every node declaring
    /// them, and are not consumed. Returns the last node's projected output
    /// together with the full IR map.
    pub async fn call(&self, inputs: &DataMap) -> Result<(DataMap, IrMap), ChainError> {
        let mut ir = IrMap::new();
        let mut last = DataMap::new();
        for node_id in &self.topo_order {
            let node = self
                .nodes
                .get(node_id.as_str())
                .ok_or_else(|| ChainError::MissingNode(node_id.clone()))?;
            debug!(node = %node_id, "processing node");

            let mut data = DataMap::new();
            for edge in self.edges.iter().filter(|e| e.trg_node_id == *node_id) {
                for (src_output, trg_field) in &edge.connections {
                    let key = format!("{}/{}", edge.src_node_id, src_output);
                    debug!(key = %key, "reading intermediate");
                    let value = ir
                        .get(&key)
                        .ok_or_else(|| ChainError::MissingIntermediate(key.clone()))?;
                    data.insert(trg_field.clone(), value.clone());
                }
            }
            for (key, value) in inputs {
                if node.has_field(key) {
                    data.insert(key.clone(), value.clone());
                }
            }

            let outputs = match node.call(&data).await {
                Ok(outputs) => outputs,
                Err(err) => {
                    if let ChainError::NodeExecution { trace, .. } = &err {
                        error!(node = %node_id, trace = %trace, "node execution failed");
                    }
                    return Err(err);
                }
            };
            for (name, value) in &outputs {
                ir.insert(format!("{node_id}/{name}"), value.clone());
            }
            last = outputs;
        }
        Ok((last, ir))
    }
}
