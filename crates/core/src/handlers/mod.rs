//! Node handlers: one per node type, all behind a common execute contract.

pub mod ai;
pub mod condition;
pub mod staking;
pub mod swap;
pub mod tool;
pub mod transfer;
pub mod trigger;

pub use ai::AiHandler;
pub use condition::ConditionHandler;
pub use staking::StakingHandler;
pub use swap::SwapHandler;
pub use tool::ToolHandler;
pub use transfer::TransferHandler;
pub use trigger::TriggerHandler;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::IndexedNode;
use crate::services::Services;
use crate::types::{NodeType, SignerIdentity};

/// Everything a handler may reach for besides the node itself: the
/// engine config, the injected collaborators, and the run's signer.
#[derive(Clone)]
pub struct HandlerCtx {
    pub config: Arc<EngineConfig>,
    pub services: Arc<Services>,
    pub signer: SignerIdentity,
}

/// Common execution contract for all node types.
///
/// `prior` is the ordered list of outputs of all nodes with an edge into
/// this node, most-recently-produced last. Handlers never mutate node
/// config or prior outputs; a successful execution yields the node's
/// structured output.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError>;
}

/// Select the handler for a node type.
pub fn handler_for(node_type: NodeType) -> &'static dyn NodeHandler {
    match node_type {
        NodeType::Trigger => &TriggerHandler,
        NodeType::Transfer => &TransferHandler,
        NodeType::Swap => &SwapHandler,
        NodeType::Condition => &ConditionHandler,
        NodeType::Ai => &AiHandler,
        NodeType::ExternalTool => &ToolHandler,
        NodeType::Staking => &StakingHandler,
    }
}

/// Walker dispatched a node to a handler whose config variant does not
/// match; only reachable through an index-construction bug.
pub(crate) fn config_mismatch(node: &IndexedNode, expected: &str) -> EngineError {
    EngineError::InvalidGraph {
        message: format!(
            "node '{}' has type {} but no {expected} config",
            node.id, node.node_type
        ),
    }
}
