use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a workflow node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a workflow node, which selects the handler used to execute it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Trigger,
    Transfer,
    Swap,
    Condition,
    Ai,
    ExternalTool,
    Staking,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeType::Trigger => "trigger",
            NodeType::Transfer => "transfer",
            NodeType::Swap => "swap",
            NodeType::Condition => "condition",
            NodeType::Ai => "ai",
            NodeType::ExternalTool => "external-tool",
            NodeType::Staking => "staking",
        };
        write!(f, "{name}")
    }
}

/// Status of a workflow run. Transitions are monotonic:
/// Pending -> Running -> (Completed | Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Ordering rank used to reject status regressions.
    pub fn rank(self) -> u8 {
        match self {
            RunStatus::Pending => 0,
            RunStatus::Running => 1,
            RunStatus::Completed | RunStatus::Failed => 2,
        }
    }
}

/// Status of a single executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

/// The identity a run executes under. Node handlers hand it to the
/// external chain services, which own key material and signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub address: String,
}

impl SignerIdentity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// One entry in a run's step trace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub node_label: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
    pub id: RunId,
    pub workflow_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_wire_names() {
        let parsed: NodeType = serde_json::from_str("\"external-tool\"").unwrap();
        assert_eq!(parsed, NodeType::ExternalTool);
        assert_eq!(serde_json::to_string(&NodeType::Ai).unwrap(), "\"ai\"");
        assert_eq!(NodeType::ExternalTool.to_string(), "external-tool");
    }

    #[test]
    fn run_status_rank_is_monotonic() {
        assert!(RunStatus::Pending.rank() < RunStatus::Running.rank());
        assert!(RunStatus::Running.rank() < RunStatus::Completed.rank());
        assert_eq!(RunStatus::Completed.rank(), RunStatus::Failed.rank());
    }
}
