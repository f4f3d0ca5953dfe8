//! Per-run execution context: node outputs keyed by node id.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::graph::Edge;
use crate::types::NodeId;

/// The output of an upstream node, as seen by a downstream handler.
#[derive(Debug, Clone)]
pub struct PriorOutput {
    pub node_id: NodeId,
    /// `target_handle` of the edge that delivered this output, when the
    /// edge names an input slot (e.g. condition operands).
    pub target_handle: Option<String>,
    pub output: Value,
}

/// Mutable per-run store mapping node id -> produced output.
///
/// Exclusively owned by its run; created at run start, dropped at run
/// end. Writes are once-per-node: in the supported acyclic, non-fan-in
/// graphs a node executes at most once per run.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    outputs: HashMap<NodeId, Value>,
    /// Node ids in production order, oldest first.
    order: Vec<NodeId>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node's output. Rejects a second write for the same node.
    pub fn set(&mut self, node_id: NodeId, output: Value) -> Result<(), EngineError> {
        if self.outputs.contains_key(&node_id) {
            return Err(EngineError::DuplicateOutput(node_id));
        }
        self.order.push(node_id.clone());
        self.outputs.insert(node_id, output);
        Ok(())
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Assemble the ordered prior outputs for a node from its incoming
    /// edges: one entry per incoming edge whose source has produced an
    /// output, ordered by production time with the most recent last.
    pub fn prior_outputs(&self, incoming: &[Edge]) -> Vec<PriorOutput> {
        let mut prior = Vec::new();
        for produced in &self.order {
            for edge in incoming.iter().filter(|e| &e.from == produced) {
                if let Some(output) = self.outputs.get(produced) {
                    prior.push(PriorOutput {
                        node_id: produced.clone(),
                        target_handle: edge.target_handle.clone(),
                        output: output.clone(),
                    });
                }
            }
        }
        prior
    }
}
