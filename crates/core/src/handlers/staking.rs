//! Staking handler: validator delegation.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};
use crate::resolve::{inherit_chain, resolve_amount};
use crate::retry::with_retry;

const DELEGATE: &str = "delegate";

pub struct StakingHandler;

#[async_trait]
impl NodeHandler for StakingHandler {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::Staking(cfg) = &node.config else {
            return Err(config_mismatch(node, "staking"));
        };

        let operation = cfg
            .operation
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DELEGATE);
        if operation != DELEGATE {
            return Err(EngineError::UnsupportedOperation {
                node_id: node.id.clone(),
                operation: operation.to_string(),
            });
        }

        let validator = cfg
            .validator_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::missing_config(&node.id, "validatorAddress"))?;
        let amount = resolve_amount(cfg.amount.as_deref(), prior)
            .ok_or_else(|| EngineError::missing_config(&node.id, "amount"))?;

        debug!(node_id = %node.id, validator, amount = %amount, "delegating stake");

        let chain_service = &ctx.services.chain;
        let receipt = with_retry(&ctx.config.retry, "delegate", || {
            chain_service.delegate_stake(
                validator,
                &amount,
                &ctx.signer,
                cfg.contract_address.as_deref(),
            )
        })
        .await?;

        let mut output = json!({
            "txHash": receipt.tx_hash,
            "blockNumber": receipt.block_number,
            "gasUsed": receipt.gas_used,
            "validatorAddress": validator,
            "operation": DELEGATE,
            "amount": amount,
            // downstream transfer/staking nodes chain off the staked amount
            "amountReceived": amount,
        });
        if let Some(chain) = cfg.chain.clone().or_else(|| inherit_chain(prior)) {
            output["chain"] = json!(chain);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StakingConfig;
    use crate::test_utils::{handler_ctx_with, FakeServices};
    use crate::types::{NodeId, NodeType};

    fn staking_node(cfg: StakingConfig) -> IndexedNode {
        IndexedNode {
            id: NodeId::new("stake"),
            node_type: NodeType::Staking,
            label: "stake".to_string(),
            config: NodeConfig::Staking(cfg),
        }
    }

    #[tokio::test]
    async fn delegation_produces_normalized_output() {
        let fakes = FakeServices::new();
        let ctx = handler_ctx_with(fakes.clone());
        let node = staking_node(StakingConfig {
            chain: Some("somnia".to_string()),
            amount: Some("2.5".to_string()),
            validator_address: Some("0xval".to_string()),
            operation: None,
            contract_address: None,
        });

        let out = StakingHandler.execute(&ctx, &node, &[]).await.unwrap();
        assert_eq!(out["validatorAddress"], json!("0xval"));
        assert_eq!(out["amountReceived"], json!("2.5"));
        assert_eq!(out["chain"], json!("somnia"));
        assert!(out["txHash"].as_str().unwrap().starts_with("0x"));
        assert_eq!(fakes.calls(), vec!["delegate_stake".to_string()]);
    }

    #[tokio::test]
    async fn non_delegate_operation_is_unsupported() {
        let ctx = handler_ctx_with(FakeServices::new());
        let node = staking_node(StakingConfig {
            operation: Some("undelegate".to_string()),
            validator_address: Some("0xval".to_string()),
            amount: Some("1".to_string()),
            ..StakingConfig::default()
        });

        let err = StakingHandler.execute(&ctx, &node, &[]).await.unwrap_err();
        assert!(
            matches!(err, EngineError::UnsupportedOperation { operation, .. } if operation == "undelegate")
        );
    }

    #[tokio::test]
    async fn amount_falls_back_to_prior_outputs() {
        let ctx = handler_ctx_with(FakeServices::new());
        let node = staking_node(StakingConfig {
            validator_address: Some("0xval".to_string()),
            ..StakingConfig::default()
        });
        let prior = vec![PriorOutput {
            node_id: NodeId::new("swap"),
            target_handle: None,
            output: json!({"amountReceived": "7", "chain": "ethereum"}),
        }];

        let out = StakingHandler.execute(&ctx, &node, &prior).await.unwrap();
        assert_eq!(out["amountReceived"], json!("7"));
        assert_eq!(out["chain"], json!("ethereum"));
    }
}
