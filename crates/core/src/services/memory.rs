//! In-memory run store for tests and embedders without a database.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::RunStore;
use crate::types::{ExecutionRun, RunId, RunStatus, StepRecord};

#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<RunId, ExecutionRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, workflow_id: &str) -> Result<ExecutionRun> {
        let run = ExecutionRun {
            id: RunId::new(),
            workflow_id: workflow_id.to_string(),
            status: RunStatus::Pending,
            steps: Vec::new(),
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.runs.write().await.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_status(&self, run_id: RunId, status: RunStatus) -> Result<()> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| anyhow!("run '{run_id}' not found"))?;
        if status.rank() < run.status.rank() {
            bail!(
                "run '{run_id}' status cannot regress from {:?} to {:?}",
                run.status,
                status
            );
        }
        run.status = status;
        Ok(())
    }

    async fn append_step(&self, run_id: RunId, step: StepRecord) -> Result<()> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| anyhow!("run '{run_id}' not found"))?;
        run.steps.push(step);
        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| anyhow!("run '{run_id}' not found"))?;
        if status.rank() < run.status.rank() {
            bail!(
                "run '{run_id}' status cannot regress from {:?} to {:?}",
                run.status,
                status
            );
        }
        run.status = status;
        run.error = error;
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<ExecutionRun> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or_else(|| anyhow!("run '{run_id}' not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_lifecycle_round_trips() {
        let store = InMemoryRunStore::new();
        let run = store.create_run("wf-1").await.unwrap();
        assert_eq!(run.status, RunStatus::Pending);

        store.update_status(run.id, RunStatus::Running).await.unwrap();
        store
            .finalize_run(run.id, RunStatus::Completed, None)
            .await
            .unwrap();

        let fetched = store.get_run(run.id).await.unwrap();
        assert_eq!(fetched.status, RunStatus::Completed);
        assert!(fetched.finished_at.is_some());
    }

    #[tokio::test]
    async fn status_regressions_are_rejected() {
        let store = InMemoryRunStore::new();
        let run = store.create_run("wf-1").await.unwrap();
        store
            .finalize_run(run.id, RunStatus::Failed, Some("boom".into()))
            .await
            .unwrap();

        let err = store
            .update_status(run.id, RunStatus::Running)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot regress"));
    }

    #[tokio::test]
    async fn unknown_run_is_an_error() {
        let store = InMemoryRunStore::new();
        assert!(store.get_run(RunId::new()).await.is_err());
    }
}
