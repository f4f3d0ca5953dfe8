//! Graph walker: depth-first traversal driving node execution.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::graph::GraphIndex;
use crate::handlers::{handler_for, HandlerCtx};
use crate::recorder::ExecutionRecorder;
use crate::types::NodeType;

/// Walks a validated graph from its trigger node, executing one node at
/// a time and feeding outputs forward.
///
/// Traversal is an explicit worklist rather than recursion: children are
/// pushed in reverse edge-list order so the first outgoing edge's entire
/// subtree executes before the next sibling. Condition nodes follow
/// exactly the one outgoing edge whose `sourceHandle` matches the
/// evaluated branch; a missing matching edge simply ends that branch.
/// The first node failure aborts the run.
///
/// A node executes at most once. Fan-in targets (a condition fed through
/// both operand handles, say) are pushed once per incoming edge; every
/// pop that still finds an unproduced input defers, and the pop following
/// the last input's source executes the node with all operands in place.
pub struct GraphWalker {
    index: Arc<GraphIndex>,
    handler_ctx: HandlerCtx,
    recorder: ExecutionRecorder,
}

impl GraphWalker {
    pub fn new(index: Arc<GraphIndex>, handler_ctx: HandlerCtx, recorder: ExecutionRecorder) -> Self {
        Self {
            index,
            handler_ctx,
            recorder,
        }
    }

    /// Execute the run to completion. The outcome is persisted through
    /// the recorder before this returns; the returned error mirrors what
    /// was recorded for callers that await the run directly.
    pub async fn run(self) -> Result<(), EngineError> {
        self.recorder.start().await?;

        let mut context = ExecutionContext::new();
        let mut stack = vec![self.index.trigger_id().clone()];
        let mut failure: Option<EngineError> = None;

        while let Some(node_id) = stack.pop() {
            if context.get(&node_id).is_some() {
                continue;
            }
            if let Some(waiting_on) = self
                .index
                .incoming(&node_id)
                .iter()
                .find(|e| context.get(&e.from).is_none())
            {
                // Another incoming edge will push this node again once
                // its source has produced an output. If that source sits
                // on a pruned branch the node is never executed, like a
                // condition branch with nothing wired to it.
                debug!(
                    run_id = %self.recorder.run_id(),
                    node_id = %node_id,
                    waiting_on = %waiting_on.from,
                    "deferring node until its remaining inputs are produced"
                );
                continue;
            }

            // The index validated every edge endpoint.
            let Some(node) = self.index.node(&node_id) else {
                failure = Some(EngineError::InvalidGraph {
                    message: format!("node '{node_id}' disappeared from the index"),
                });
                break;
            };

            let prior = context.prior_outputs(self.index.incoming(&node_id));
            let started_at = Utc::now();
            info!(
                run_id = %self.recorder.run_id(),
                node_id = %node.id,
                node_type = %node.node_type,
                "executing node"
            );

            let result = handler_for(node.node_type)
                .execute(&self.handler_ctx, node, &prior)
                .await
                .and_then(|output| {
                    context.set(node_id.clone(), output.clone())?;
                    Ok(output)
                });

            match result {
                Ok(output) => {
                    if let Err(store_err) =
                        self.recorder.record_success(node, started_at, &output).await
                    {
                        failure = Some(store_err);
                        break;
                    }
                    if node.node_type == NodeType::Condition {
                        self.push_condition_branch(&mut stack, &node_id, &output);
                    } else {
                        // reverse push keeps edge-list order depth-first
                        for edge in self.index.outgoing(&node_id).iter().rev() {
                            stack.push(edge.to.clone());
                        }
                    }
                }
                Err(err) => {
                    // The node's own error names the run's failure even
                    // when the step append also fails.
                    if let Err(store_err) =
                        self.recorder.record_failure(node, started_at, &err).await
                    {
                        warn!(
                            run_id = %self.recorder.run_id(),
                            error = %store_err,
                            "failed to persist step failure"
                        );
                    }
                    failure = Some(err);
                    break;
                }
            }
        }

        self.recorder.finish(failure).await
    }

    fn push_condition_branch(
        &self,
        stack: &mut Vec<crate::types::NodeId>,
        node_id: &crate::types::NodeId,
        output: &Value,
    ) {
        let met = output
            .get("conditionMet")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let wanted = if met { "true" } else { "false" };

        let branch = self
            .index
            .outgoing(node_id)
            .iter()
            .find(|e| e.source_handle.as_deref() == Some(wanted));
        match branch {
            Some(edge) => stack.push(edge.to.clone()),
            // Not an error: the branch simply has nothing wired to it.
            None => warn!(
                run_id = %self.recorder.run_id(),
                node_id = %node_id,
                branch = wanted,
                "condition branch has no outgoing edge; traversal stops here"
            ),
        }
    }
}
