//! Condition handler: numeric comparison steering branch selection.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};
use crate::resolve::{inherit_chain, numeric_projection};

/// Reserved incoming-edge handles feeding the two operands.
const LEFT_HANDLE: &str = "value1";
const RIGHT_HANDLE: &str = "value2";

pub struct ConditionHandler;

/// Resolve one operand: an explicit config value wins, otherwise the
/// output of the node wired into the reserved handle, otherwise zero.
fn operand(explicit: Option<&Value>, handle: &str, prior: &[PriorOutput]) -> f64 {
    if let Some(value) = explicit.filter(|v| !v.is_null()) {
        return numeric_projection(value);
    }
    prior
        .iter()
        .rev()
        .find(|p| p.target_handle.as_deref() == Some(handle))
        .map(|p| numeric_projection(&p.output))
        .unwrap_or(0.0)
}

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn execute(
        &self,
        _ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::Condition(cfg) = &node.config else {
            return Err(config_mismatch(node, "condition"));
        };

        let operator = cfg
            .operator
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::missing_config(&node.id, "operator"))?;

        let value1 = operand(cfg.left_value.as_ref(), LEFT_HANDLE, prior);
        let value2 = operand(cfg.right_value.as_ref(), RIGHT_HANDLE, prior);

        let condition_met = match operator {
            "==" => value1 == value2,
            "!=" => value1 != value2,
            ">" => value1 > value2,
            ">=" => value1 >= value2,
            "<" => value1 < value2,
            "<=" => value1 <= value2,
            other => {
                return Err(EngineError::UnsupportedOperation {
                    node_id: node.id.clone(),
                    operation: other.to_string(),
                })
            }
        };

        let mut output = json!({
            "conditionMet": condition_met,
            "value1": value1,
            "operator": operator,
            "value2": value2,
        });
        // Pass chain context through so downstream nodes can still infer it.
        if let Some(chain) = inherit_chain(prior) {
            output["chain"] = json!(chain);
        }
        Ok(output)
    }
}
