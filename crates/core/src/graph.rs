//! Workflow graph model: wire format, typed node configs, and the
//! validated index the walker traverses.

use petgraph::graph::DiGraph;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::{NodeId, NodeType};

/// A node as authored by the editor. `config` is a free-form bag here;
/// it is parsed into a typed [`NodeConfig`] when the index is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub config: Value,
}

/// A directed connection between two nodes.
///
/// `source_handle` tags condition branches (`"true"`/`"false"`);
/// `target_handle` names an input slot on the target (`"value1"`/`"value2"`
/// for condition operands).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// The persisted workflow definition handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Accepts a JSON number or string and normalizes it to a string, so
/// editor-authored configs may write `"amount": 1.5` or `"amount": "1.5"`.
fn amount_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "amount must be a number or string, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    /// Alias for `recipient`.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "amount_opt")]
    pub amount: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapConfig {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub from_token: Option<String>,
    #[serde(default)]
    pub to_token: Option<String>,
    #[serde(default, deserialize_with = "amount_opt")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default)]
    pub left_value: Option<Value>,
    #[serde(default)]
    pub right_value: Option<Value>,
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub prompt: Option<String>,
    /// When set, the system prompt instructs delegation to this agent.
    #[serde(default)]
    pub agent_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(default)]
    pub mcp_server: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Agent-backed tools are submitted to this endpoint instead of a
    /// directly-integrated server.
    #[serde(default)]
    pub agent_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingConfig {
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default, deserialize_with = "amount_opt")]
    pub amount: Option<String>,
    #[serde(default)]
    pub validator_address: Option<String>,
    /// Only "delegate" is supported; absent means delegate.
    #[serde(default)]
    pub operation: Option<String>,
    /// Optional staking-contract override passed through to the chain service.
    #[serde(default)]
    pub contract_address: Option<String>,
}

/// Typed view of a node's config bag, parsed once at index-build time so
/// malformed settings surface as `InvalidGraph` before any side effect.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Trigger,
    Transfer(TransferConfig),
    Swap(SwapConfig),
    Condition(ConditionConfig),
    Ai(AiConfig),
    ExternalTool(ToolConfig),
    Staking(StakingConfig),
}

impl NodeConfig {
    fn parse(node: &Node) -> Result<Self, EngineError> {
        // Editors may omit config entirely for nodes without settings.
        let bag = match &node.config {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };

        let bad = |e: serde_json::Error| EngineError::InvalidGraph {
            message: format!("node '{}' has invalid {} config: {e}", node.id, node.node_type),
        };

        match node.node_type {
            NodeType::Trigger => Ok(NodeConfig::Trigger),
            NodeType::Transfer => serde_json::from_value(bag).map(NodeConfig::Transfer).map_err(bad),
            NodeType::Swap => serde_json::from_value(bag).map(NodeConfig::Swap).map_err(bad),
            NodeType::Condition => serde_json::from_value(bag).map(NodeConfig::Condition).map_err(bad),
            NodeType::Ai => serde_json::from_value(bag).map(NodeConfig::Ai).map_err(bad),
            NodeType::ExternalTool => serde_json::from_value(bag).map(NodeConfig::ExternalTool).map_err(bad),
            NodeType::Staking => serde_json::from_value(bag).map(NodeConfig::Staking).map_err(bad),
        }
    }
}

/// A node with its config already validated and typed.
#[derive(Debug, Clone)]
pub struct IndexedNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub label: String,
    pub config: NodeConfig,
}

/// Validated lookup structures for one workflow graph.
///
/// Built once before traversal begins; the walker never re-validates.
/// Immutable and safe to share across concurrent runs.
#[derive(Debug)]
pub struct GraphIndex {
    nodes: HashMap<NodeId, IndexedNode>,
    outgoing: HashMap<NodeId, Vec<Edge>>,
    incoming: HashMap<NodeId, Vec<Edge>>,
    trigger: NodeId,
}

impl GraphIndex {
    /// Validate the graph and build the traversal index.
    ///
    /// Fails with `InvalidGraph` when there is not exactly one trigger
    /// node, an edge references an unknown node, the trigger has an
    /// incoming edge, node ids collide, the graph contains a cycle, or a
    /// node's config bag does not parse for its type.
    pub fn build(graph: &WorkflowGraph) -> Result<Self, EngineError> {
        let invalid = |message: String| EngineError::InvalidGraph { message };

        let mut nodes: HashMap<NodeId, IndexedNode> = HashMap::new();
        for node in &graph.nodes {
            let indexed = IndexedNode {
                id: node.id.clone(),
                node_type: node.node_type,
                label: if node.label.is_empty() {
                    node.id.0.clone()
                } else {
                    node.label.clone()
                },
                config: NodeConfig::parse(node)?,
            };
            if nodes.insert(node.id.clone(), indexed).is_some() {
                return Err(invalid(format!("duplicate node id '{}'", node.id)));
            }
        }

        let triggers: Vec<&Node> = graph
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Trigger)
            .collect();
        let trigger = match triggers.as_slice() {
            [single] => single.id.clone(),
            [] => return Err(invalid("no trigger node found".to_string())),
            many => {
                return Err(invalid(format!(
                    "expected exactly one trigger node, found {}",
                    many.len()
                )))
            }
        };

        let mut outgoing: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        let mut incoming: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        for edge in &graph.edges {
            if !nodes.contains_key(&edge.from) {
                return Err(invalid(format!(
                    "edge '{}' references unknown source node '{}'",
                    edge.id, edge.from
                )));
            }
            if !nodes.contains_key(&edge.to) {
                return Err(invalid(format!(
                    "edge '{}' references unknown target node '{}'",
                    edge.id, edge.to
                )));
            }
            if edge.to == trigger {
                return Err(invalid(format!(
                    "trigger node '{}' must not have incoming edges",
                    trigger
                )));
            }
            outgoing.entry(edge.from.clone()).or_default().push(edge.clone());
            incoming.entry(edge.to.clone()).or_default().push(edge.clone());
        }

        Self::check_acyclic(graph)?;

        Ok(Self {
            nodes,
            outgoing,
            incoming,
            trigger,
        })
    }

    fn check_acyclic(graph: &WorkflowGraph) -> Result<(), EngineError> {
        let mut dag: DiGraph<&NodeId, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for node in &graph.nodes {
            indices.insert(&node.id, dag.add_node(&node.id));
        }
        for edge in &graph.edges {
            // Endpoints were validated above.
            dag.add_edge(indices[&edge.from], indices[&edge.to], ());
        }
        if petgraph::algo::is_cyclic_directed(&dag) {
            return Err(EngineError::InvalidGraph {
                message: "workflow graph contains a cycle".to_string(),
            });
        }
        Ok(())
    }

    pub fn trigger_id(&self) -> &NodeId {
        &self.trigger
    }

    pub fn node(&self, id: &NodeId) -> Option<&IndexedNode> {
        self.nodes.get(id)
    }

    /// Outgoing edges of a node, in edge-list order.
    pub fn outgoing(&self, id: &NodeId) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of a node, in edge-list order.
    pub fn incoming(&self, id: &NodeId) -> &[Edge] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, node_type: NodeType, config: Value) -> Node {
        Node {
            id: NodeId::new(id),
            node_type,
            label: id.to_string(),
            config,
        }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            id: format!("{from}-{to}"),
            from: NodeId::new(from),
            to: NodeId::new(to),
            source_handle: None,
            target_handle: None,
        }
    }

    #[test]
    fn builds_index_for_valid_graph() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("start", NodeType::Trigger, Value::Null),
                node(
                    "send",
                    NodeType::Transfer,
                    json!({"chain": "somnia", "recipient": "0xAA", "amount": 1.5}),
                ),
            ],
            edges: vec![edge("start", "send")],
        };

        let index = GraphIndex::build(&graph).unwrap();
        assert_eq!(index.trigger_id(), &NodeId::new("start"));
        assert_eq!(index.outgoing(&NodeId::new("start")).len(), 1);
        assert_eq!(index.incoming(&NodeId::new("send")).len(), 1);

        // numeric amount normalized to a string at parse time
        let send = index.node(&NodeId::new("send")).unwrap();
        match &send.config {
            NodeConfig::Transfer(c) => assert_eq!(c.amount.as_deref(), Some("1.5")),
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn rejects_graph_without_trigger() {
        let graph = WorkflowGraph {
            nodes: vec![node("a", NodeType::Transfer, json!({}))],
            edges: vec![],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("no trigger node"));
    }

    #[test]
    fn rejects_graph_with_two_triggers() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("t1", NodeType::Trigger, Value::Null),
                node("t2", NodeType::Trigger, Value::Null),
            ],
            edges: vec![],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("exactly one trigger"));
    }

    #[test]
    fn rejects_edge_to_unknown_node() {
        let graph = WorkflowGraph {
            nodes: vec![node("start", NodeType::Trigger, Value::Null)],
            edges: vec![edge("start", "ghost")],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("unknown target node 'ghost'"));
    }

    #[test]
    fn rejects_incoming_edge_on_trigger() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("start", NodeType::Trigger, Value::Null),
                node("a", NodeType::Ai, json!({"prompt": "hi"})),
            ],
            edges: vec![edge("start", "a"), edge("a", "start")],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("must not have incoming edges"));
    }

    #[test]
    fn rejects_cycle() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("start", NodeType::Trigger, Value::Null),
                node("a", NodeType::Ai, json!({"prompt": "x"})),
                node("b", NodeType::Ai, json!({"prompt": "y"})),
            ],
            edges: vec![edge("start", "a"), edge("a", "b"), edge("b", "a")],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("start", NodeType::Trigger, Value::Null),
                node("start", NodeType::Trigger, Value::Null),
            ],
            edges: vec![],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("duplicate node id"));
    }

    #[test]
    fn rejects_malformed_config_at_build_time() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("start", NodeType::Trigger, Value::Null),
                node("send", NodeType::Transfer, json!({"amount": {"nested": true}})),
            ],
            edges: vec![edge("start", "send")],
        };
        let err = GraphIndex::build(&graph).unwrap_err();
        assert!(err.to_string().contains("invalid transfer config"));
    }

    #[test]
    fn graph_wire_format_round_trips() {
        let raw = json!({
            "nodes": [
                {"id": "start", "type": "trigger", "label": "Start"},
                {"id": "check", "type": "condition",
                 "config": {"leftValue": 1, "rightValue": 2, "operator": "<"}}
            ],
            "edges": [
                {"id": "e1", "from": "start", "to": "check",
                 "sourceHandle": null, "targetHandle": "value1"}
            ]
        });
        let graph: WorkflowGraph = serde_json::from_value(raw).unwrap();
        assert_eq!(graph.edges[0].target_handle.as_deref(), Some("value1"));
        GraphIndex::build(&graph).unwrap();
    }
}
