//! Execution recorder: the run's persisted step trace and status.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::EngineError;
use crate::graph::IndexedNode;
use crate::services::RunStore;
use crate::types::{RunId, RunStatus, StepRecord, StepStatus};

/// Accumulates a run's step trace through the persistence collaborator
/// and reports the final run status. One recorder per run; no sharing.
pub struct ExecutionRecorder {
    run_id: RunId,
    workflow_id: String,
    store: Arc<dyn RunStore>,
}

impl ExecutionRecorder {
    pub fn new(run_id: RunId, workflow_id: impl Into<String>, store: Arc<dyn RunStore>) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            store,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    fn store_err(&self, source: anyhow::Error) -> EngineError {
        EngineError::service(format!("run store failure for run '{}'", self.run_id), source)
    }

    /// Transition the run from pending to running.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.store
            .update_status(self.run_id, RunStatus::Running)
            .await
            .map_err(|e| self.store_err(e))?;
        info!(run_id = %self.run_id, workflow_id = %self.workflow_id, "run started");
        Ok(())
    }

    pub async fn record_success(
        &self,
        node: &IndexedNode,
        started_at: DateTime<Utc>,
        output: &Value,
    ) -> Result<(), EngineError> {
        let completed_at = Utc::now();
        info!(
            run_id = %self.run_id,
            node_id = %node.id,
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "node succeeded"
        );
        self.store
            .append_step(
                self.run_id,
                StepRecord {
                    node_id: node.id.clone(),
                    node_type: node.node_type,
                    node_label: node.label.clone(),
                    status: StepStatus::Success,
                    started_at,
                    completed_at,
                    output: Some(output.clone()),
                    error: None,
                },
            )
            .await
            .map_err(|e| self.store_err(e))
    }

    pub async fn record_failure(
        &self,
        node: &IndexedNode,
        started_at: DateTime<Utc>,
        err: &EngineError,
    ) -> Result<(), EngineError> {
        let completed_at = Utc::now();
        error!(
            run_id = %self.run_id,
            node_id = %node.id,
            error = %err,
            "node failed"
        );
        self.store
            .append_step(
                self.run_id,
                StepRecord {
                    node_id: node.id.clone(),
                    node_type: node.node_type,
                    node_label: node.label.clone(),
                    status: StepStatus::Failed,
                    started_at,
                    completed_at,
                    output: None,
                    error: Some(err.to_string()),
                },
            )
            .await
            .map_err(|e| self.store_err(e))
    }

    /// Finalize the run: completed when every visited node succeeded,
    /// failed with the first node's error otherwise. Returns the failure
    /// so callers awaiting the run see the same outcome that was recorded.
    pub async fn finish(&self, failure: Option<EngineError>) -> Result<(), EngineError> {
        match failure {
            None => {
                self.store
                    .finalize_run(self.run_id, RunStatus::Completed, None)
                    .await
                    .map_err(|e| self.store_err(e))?;
                info!(run_id = %self.run_id, "run completed");
                Ok(())
            }
            Some(err) => {
                // Best effort; the run's failure must not be masked by a
                // store fault here.
                if let Err(store_err) = self
                    .store
                    .finalize_run(self.run_id, RunStatus::Failed, Some(err.to_string()))
                    .await
                {
                    error!(
                        run_id = %self.run_id,
                        error = %store_err,
                        "failed to persist run failure"
                    );
                }
                error!(run_id = %self.run_id, error = %err, "run failed");
                Err(err)
            }
        }
    }
}
