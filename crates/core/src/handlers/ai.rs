//! AI handler: LLM completion with prior-output context, optionally
//! delegated to a named external agent.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};

const SYSTEM_PROMPT: &str = "You are a workflow automation assistant. Answer \
the user's request directly, using the provided results of earlier workflow \
steps when they are relevant.";

fn delegation_prompt(agent_address: &str) -> String {
    format!(
        "You are a workflow automation assistant. Delegate the user's request \
to the external agent at address {agent_address} and report that agent's \
response verbatim."
    )
}

/// Render prior outputs as contextual text appended to the user prompt.
fn render_context(prior: &[PriorOutput]) -> String {
    let mut text = String::from("\n\nResults of earlier workflow steps:\n");
    for p in prior {
        text.push_str(&format!("- {}: {}\n", p.node_id, p.output));
    }
    text
}

pub struct AiHandler;

#[async_trait]
impl NodeHandler for AiHandler {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::Ai(cfg) = &node.config else {
            return Err(config_mismatch(node, "ai"));
        };

        let prompt = cfg
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::missing_config(&node.id, "prompt"))?;

        let agent = cfg
            .agent_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let system_prompt = match agent {
            Some(address) => delegation_prompt(address),
            None => SYSTEM_PROMPT.to_string(),
        };

        let mut user_prompt = prompt.to_string();
        if !prior.is_empty() {
            user_prompt.push_str(&render_context(prior));
        }

        let text = ctx
            .services
            .chat
            .complete(&system_prompt, &user_prompt)
            .await
            .map_err(|e| {
                EngineError::service(format!("chat completion failed for node '{}'", node.id), e)
            })?;

        Ok(json!({
            "text": text,
            "prompt": prompt,
            "delegated": agent.is_some(),
            "agentAddress": agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AiConfig;
    use crate::test_utils::{handler_ctx_with, FakeServices};
    use crate::types::{NodeId, NodeType};
    use serde_json::json;

    fn ai_node(cfg: AiConfig) -> IndexedNode {
        IndexedNode {
            id: NodeId::new("ask"),
            node_type: NodeType::Ai,
            label: "ask".to_string(),
            config: NodeConfig::Ai(cfg),
        }
    }

    #[tokio::test]
    async fn missing_prompt_fails() {
        let node = ai_node(AiConfig::default());
        let err = AiHandler
            .execute(&handler_ctx_with(FakeServices::new()), &node, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingConfig { field, .. } if field == "prompt"));
    }

    #[tokio::test]
    async fn prior_outputs_are_rendered_into_the_user_prompt() {
        let fakes = FakeServices::new();
        let ctx = handler_ctx_with(fakes.clone());
        let node = ai_node(AiConfig {
            prompt: Some("summarize".to_string()),
            agent_address: None,
        });
        let prior = vec![PriorOutput {
            node_id: NodeId::new("swap"),
            target_handle: None,
            output: json!({"amountReceived": "5"}),
        }];

        let out = AiHandler.execute(&ctx, &node, &prior).await.unwrap();
        assert_eq!(out["delegated"], json!(false));

        let prompts = fakes.chat_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1.contains("summarize"));
        assert!(prompts[0].1.contains("amountReceived"));
    }

    #[tokio::test]
    async fn agent_address_rewrites_the_system_prompt() {
        let fakes = FakeServices::new();
        let ctx = handler_ctx_with(fakes.clone());
        let node = ai_node(AiConfig {
            prompt: Some("do the thing".to_string()),
            agent_address: Some("0xagent".to_string()),
        });

        let out = AiHandler.execute(&ctx, &node, &[]).await.unwrap();
        assert_eq!(out["delegated"], json!(true));
        assert_eq!(out["agentAddress"], json!("0xagent"));

        let prompts = fakes.chat_prompts();
        assert!(prompts[0].0.contains("0xagent"));
    }
}
