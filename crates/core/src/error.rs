//! Engine error taxonomy.

use crate::types::NodeId;

/// Errors raised by the execution engine.
///
/// Everything a node handler or the walker can fail with is enumerated
/// here; failures from external collaborators arrive as `anyhow::Error`
/// and are wrapped in `Service` (non-retried reads) or folded into
/// `OperationFailed` (retried writes).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Structural defect detected before execution starts.
    #[error("invalid workflow graph: {message}")]
    InvalidGraph { message: String },

    /// A node lacks a required field and no prior-output fallback resolved it.
    #[error("node '{node_id}' is missing required config '{field}'")]
    MissingConfig { node_id: NodeId, field: String },

    /// A config value names an operation the engine does not implement.
    #[error("node '{node_id}' requested unsupported operation '{operation}'")]
    UnsupportedOperation { node_id: NodeId, operation: String },

    /// Unknown external-tool server/tool combination.
    #[error("unsupported tool '{tool}' on server '{server}'")]
    UnsupportedTool { server: String, tool: String },

    /// A retried remote operation exhausted its attempts.
    #[error("remote operation failed after {attempts} attempts: {message}")]
    OperationFailed { attempts: u32, message: String },

    /// A node produced a second output within one run. The context
    /// enforces this even if the walker's execute-at-most-once guard is
    /// bypassed.
    #[error("node '{0}' already produced an output in this run")]
    DuplicateOutput(NodeId),

    /// A non-retried collaborator call failed (quote, chat, tool, storage).
    #[error("{context}: {cause:#}")]
    Service {
        context: String,
        cause: anyhow::Error,
    },
}

impl EngineError {
    pub fn missing_config(node_id: &NodeId, field: impl Into<String>) -> Self {
        Self::MissingConfig {
            node_id: node_id.clone(),
            field: field.into(),
        }
    }

    pub fn service(context: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Service {
            context: context.into(),
            cause,
        }
    }
}
