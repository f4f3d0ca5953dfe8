//! External-tool handler: agent-backed and directly-integrated tools.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};

/// Server/tool pairs the engine dispatches directly, without an agent.
const DIRECT_TOOLS: &[(&str, &str)] = &[
    ("defi", "token_price"),
    ("defi", "wallet_balance"),
];

pub struct ToolHandler;

#[async_trait]
impl NodeHandler for ToolHandler {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        _prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::ExternalTool(cfg) = &node.config else {
            return Err(config_mismatch(node, "external-tool"));
        };

        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let tool = non_empty(&cfg.tool)
            .ok_or_else(|| EngineError::missing_config(&node.id, "tool"))?;
        let parameters = cfg.parameters.clone().unwrap_or_else(|| json!({}));

        // Agent-backed tools are submitted as a structured request message
        // to the agent endpoint; the agent decides how to fulfil them.
        if let Some(agent) = non_empty(&cfg.agent_address) {
            debug!(node_id = %node.id, agent = %agent, tool = %tool, "sending agent tool request");
            let result = ctx
                .services
                .tools
                .send_agent_request(&agent, &tool, &parameters)
                .await
                .map_err(|e| {
                    EngineError::service(
                        format!("agent tool request failed for node '{}'", node.id),
                        e,
                    )
                })?;
            return Ok(json!({
                "server": agent,
                "tool": tool,
                "viaAgent": true,
                "output": result,
            }));
        }

        let server = non_empty(&cfg.mcp_server)
            .ok_or_else(|| EngineError::missing_config(&node.id, "mcpServer"))?;

        if !DIRECT_TOOLS.contains(&(server.as_str(), tool.as_str())) {
            return Err(EngineError::UnsupportedTool { server, tool });
        }

        debug!(node_id = %node.id, server = %server, tool = %tool, "invoking tool");
        let result = ctx
            .services
            .tools
            .invoke(&server, &tool, &parameters)
            .await
            .map_err(|e| {
                EngineError::service(format!("tool invocation failed for node '{}'", node.id), e)
            })?;

        Ok(json!({
            "server": server,
            "tool": tool,
            "viaAgent": false,
            "output": result,
        }))
    }
}
