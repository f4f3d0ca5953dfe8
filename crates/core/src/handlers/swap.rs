//! Swap handler: asset swaps via a simple router on test networks, or
//! the quote/approve/swap flow everywhere else.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};
use crate::resolve::{inherit_chain, resolve_amount};
use crate::retry::with_retry;
use crate::services::TokenInfo;

pub struct SwapHandler;

/// Prefix a retried sub-step's exhaustion error with the sub-step name,
/// so the trace identifies which of quote/approve/swap failed.
fn sub_step(name: &str, err: EngineError) -> EngineError {
    match err {
        EngineError::OperationFailed { attempts, message } => EngineError::OperationFailed {
            attempts,
            message: format!("{name} step failed: {message}"),
        },
        other => other,
    }
}

#[async_trait]
impl NodeHandler for SwapHandler {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::Swap(cfg) = &node.config else {
            return Err(config_mismatch(node, "swap"));
        };

        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let from_token = non_empty(&cfg.from_token)
            .ok_or_else(|| EngineError::missing_config(&node.id, "fromToken"))?;
        let to_token = non_empty(&cfg.to_token)
            .ok_or_else(|| EngineError::missing_config(&node.id, "toToken"))?;
        let chain = non_empty(&cfg.chain)
            .or_else(|| inherit_chain(prior))
            .ok_or_else(|| EngineError::missing_config(&node.id, "chain"))?;
        let amount = resolve_amount(cfg.amount.as_deref(), prior)
            .ok_or_else(|| EngineError::missing_config(&node.id, "amount"))?;

        let profile = ctx.config.chain(&chain);
        let chain_service = &ctx.services.chain;

        let mut output = Map::new();
        let amount_received;

        if profile.simple_router {
            debug!(node_id = %node.id, chain = %chain, "swapping via simple router");
            let receipt = with_retry(&ctx.config.retry, "swap", || {
                chain_service.simple_swap(&chain, &from_token, &to_token, &amount, &ctx.signer)
            })
            .await
            .map_err(|e| sub_step("swap", e))?;

            // The simple router reports no fill amount; pass the input through.
            amount_received = amount.clone();
            output.insert("swapTxHash".into(), json!(receipt.tx_hash));
            output.insert("blockNumber".into(), json!(receipt.block_number));
            output.insert("gasUsed".into(), json!(receipt.gas_used));
        } else {
            debug!(node_id = %node.id, chain = %chain, "swapping via quote/approve/swap");
            let quote = chain_service
                .swap_quote(&chain, &from_token, &to_token, &amount, &ctx.signer)
                .await
                .map_err(|e| {
                    EngineError::service(format!("quote step failed for node '{}'", node.id), e)
                })?;

            if quote.needs_approval {
                let approval = with_retry(&ctx.config.retry, "approve", || {
                    chain_service.approve_allowance(
                        &chain,
                        &from_token,
                        &quote.allowance_target,
                        &amount,
                        &ctx.signer,
                    )
                })
                .await
                .map_err(|e| sub_step("approve", e))?;
                output.insert("approveTxHash".into(), json!(approval.tx_hash));
            }

            let receipt = with_retry(&ctx.config.retry, "swap", || {
                chain_service.execute_swap(&chain, &from_token, &to_token, &amount, &ctx.signer)
            })
            .await
            .map_err(|e| sub_step("swap", e))?;

            amount_received = quote.buy_amount.clone();
            output.insert("swapTxHash".into(), json!(receipt.tx_hash));
            output.insert("blockNumber".into(), json!(receipt.block_number));
            output.insert("gasUsed".into(), json!(receipt.gas_used));
        }

        // Metadata is cosmetic; a lookup failure must not fail the node.
        let info = chain_service
            .token_metadata(&chain, &to_token)
            .await
            .unwrap_or_else(|_| TokenInfo {
                symbol: to_token.clone(),
                decimals: 18,
            });

        output.insert("tokenReceived".into(), json!(to_token));
        output.insert("tokenSymbol".into(), json!(info.symbol));
        output.insert("amountReceived".into(), json!(amount_received));
        output.insert("decimals".into(), json!(info.decimals));
        output.insert("chain".into(), json!(chain));
        Ok(Value::Object(output))
    }
}
