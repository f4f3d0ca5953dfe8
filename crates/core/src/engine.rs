//! Run orchestration: the public entry point of the engine.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::GraphIndex;
use crate::handlers::HandlerCtx;
use crate::recorder::ExecutionRecorder;
use crate::services::Services;
use crate::types::{ExecutionRun, RunId, SignerIdentity};
use crate::walker::GraphWalker;

/// The workflow execution engine.
///
/// Stateless across runs: each run owns its context and recorder, so
/// concurrent runs of the same or different workflows are independent.
pub struct ExecutionEngine {
    config: Arc<EngineConfig>,
    services: Arc<Services>,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, services: Services) -> Self {
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }

    /// Load, validate, and prepare a run without starting it.
    ///
    /// `InvalidGraph` surfaces here, before a run record exists, so a
    /// structurally broken workflow never produces a persisted run.
    async fn prepare(
        &self,
        workflow_id: &str,
        signer: SignerIdentity,
    ) -> Result<(RunId, GraphWalker), EngineError> {
        let graph = self
            .services
            .graphs
            .load_graph(workflow_id)
            .await
            .map_err(|e| {
                EngineError::service(format!("failed to load workflow '{workflow_id}'"), e)
            })?;
        let index = Arc::new(GraphIndex::build(&graph)?);

        let run = self
            .services
            .runs
            .create_run(workflow_id)
            .await
            .map_err(|e| EngineError::service("failed to create run record", e))?;

        let walker = GraphWalker::new(
            index,
            HandlerCtx {
                config: self.config.clone(),
                services: self.services.clone(),
                signer,
            },
            ExecutionRecorder::new(run.id, workflow_id, self.services.runs.clone()),
        );
        Ok((run.id, walker))
    }

    /// Start a run and return its id immediately; the walk proceeds on a
    /// background task. Callers poll [`Self::get_execution_details`] for
    /// completion; a started run cannot be cancelled.
    pub async fn execute(
        &self,
        workflow_id: &str,
        signer: SignerIdentity,
    ) -> Result<RunId, EngineError> {
        let (run_id, walker) = self.prepare(workflow_id, signer).await?;
        info!(run_id = %run_id, workflow_id, "run scheduled");

        tokio::spawn(async move {
            // Failures are already persisted by the recorder.
            if let Err(err) = walker.run().await {
                debug!(run_id = %run_id, error = %err, "background run finished with failure");
            }
        });

        Ok(run_id)
    }

    /// Run a workflow and wait for it to finish, returning the final
    /// persisted record. The record conveys failure through its status;
    /// this only errors when the engine itself could not start or record
    /// the run.
    pub async fn execute_blocking(
        &self,
        workflow_id: &str,
        signer: SignerIdentity,
    ) -> Result<ExecutionRun, EngineError> {
        let (run_id, walker) = self.prepare(workflow_id, signer).await?;
        // Node failures are recorded in the run; only surface engine faults.
        match walker.run().await {
            Ok(()) => {}
            Err(EngineError::Service { context, cause }) => {
                return Err(EngineError::Service { context, cause })
            }
            Err(_) => {}
        }
        self.get_execution_details(run_id).await
    }

    /// Read the persisted record of a run. Pure read: calling it twice
    /// without an intervening state change returns identical records.
    pub async fn get_execution_details(&self, run_id: RunId) -> Result<ExecutionRun, EngineError> {
        self.services
            .runs
            .get_run(run_id)
            .await
            .map_err(|e| EngineError::service(format!("failed to read run '{run_id}'"), e))
    }
}
