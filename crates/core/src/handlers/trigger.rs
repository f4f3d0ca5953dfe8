//! Trigger handler: the fixed entry point of every run.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::IndexedNode;

/// No-op handler; always succeeds with a fixed acknowledgement payload.
/// A trigger has no required config.
pub struct TriggerHandler;

#[async_trait]
impl NodeHandler for TriggerHandler {
    async fn execute(
        &self,
        _ctx: &HandlerCtx,
        _node: &IndexedNode,
        _prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        Ok(json!({
            "triggered": true,
            "message": "workflow execution started",
            "startedAt": Utc::now().to_rfc3339(),
        }))
    }
}
