//! Transfer handler: native and token value transfers.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{config_mismatch, HandlerCtx, NodeHandler};
use crate::config::ChainProfile;
use crate::context::PriorOutput;
use crate::error::EngineError;
use crate::graph::{IndexedNode, NodeConfig};
use crate::resolve::resolve_amount;
use crate::retry::with_retry;

/// Token strings always treated as the native currency, chain-independent.
const NATIVE_ALIASES: [&str; 2] = ["eth", "stt"];

/// Whether a configured token means "send the chain's native currency".
/// True only for an empty/absent token, the chain's native placeholder
/// address, and the well-known native aliases. A token matching the
/// chain's display symbol is not special-cased: that symbol may be a
/// legitimate ERC20 ticker elsewhere.
pub(crate) fn is_native_token(token: Option<&str>, profile: &ChainProfile) -> bool {
    let token = token.unwrap_or("").trim();
    if token.is_empty() {
        return true;
    }
    token.eq_ignore_ascii_case(&profile.native_placeholder)
        || NATIVE_ALIASES.iter().any(|a| token.eq_ignore_ascii_case(a))
}

/// ERC20-style transfers need an actual contract address.
pub(crate) fn is_token_address(token: &str) -> bool {
    let hex = match token.strip_prefix("0x") {
        Some(rest) => rest,
        None => return false,
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct TransferHandler;

#[async_trait]
impl NodeHandler for TransferHandler {
    async fn execute(
        &self,
        ctx: &HandlerCtx,
        node: &IndexedNode,
        prior: &[PriorOutput],
    ) -> Result<Value, EngineError> {
        let NodeConfig::Transfer(cfg) = &node.config else {
            return Err(config_mismatch(node, "transfer"));
        };

        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let chain = non_empty(&cfg.chain)
            .ok_or_else(|| EngineError::missing_config(&node.id, "chain"))?;
        let recipient = non_empty(&cfg.recipient)
            .or_else(|| non_empty(&cfg.to))
            .ok_or_else(|| EngineError::missing_config(&node.id, "recipient"))?;
        let amount = resolve_amount(cfg.amount.as_deref(), prior)
            .ok_or_else(|| EngineError::missing_config(&node.id, "amount"))?;

        let profile = ctx.config.chain(&chain);
        let native = is_native_token(cfg.token.as_deref(), &profile);
        let token = if native {
            None
        } else {
            let token = cfg.token.as_deref().unwrap_or("").trim().to_string();
            if !is_token_address(&token) {
                return Err(EngineError::missing_config(&node.id, "token"));
            }
            Some(token)
        };

        debug!(
            node_id = %node.id,
            chain = %chain,
            native,
            amount = %amount,
            "broadcasting transfer"
        );

        let chain_service = &ctx.services.chain;
        let receipt = with_retry(&ctx.config.retry, "transfer", || async {
            match &token {
                None => {
                    chain_service
                        .transfer_native(&chain, &recipient, &amount, &ctx.signer)
                        .await
                }
                Some(token) => {
                    chain_service
                        .transfer_token(&chain, token, &recipient, &amount, &ctx.signer)
                        .await
                }
            }
        })
        .await?;

        let token_received = token.clone().unwrap_or_else(|| profile.native_symbol.clone());
        Ok(json!({
            "txHash": receipt.tx_hash,
            "blockNumber": receipt.block_number,
            "gasUsed": receipt.gas_used,
            "recipient": recipient,
            "amount": amount,
            "token": token_received,
            "chain": chain,
            "amountReceived": amount,
            "tokenReceived": token_received,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_detection() {
        let somnia = ChainProfile {
            native_symbol: "STT".to_string(),
            native_placeholder: crate::config::NATIVE_PLACEHOLDER.to_string(),
            simple_router: true,
        };
        assert!(is_native_token(None, &somnia));
        assert!(is_native_token(Some(""), &somnia));
        assert!(is_native_token(Some("ETH"), &somnia));
        assert!(is_native_token(Some("stt"), &somnia));
        assert!(is_native_token(
            Some(crate::config::NATIVE_PLACEHOLDER),
            &somnia
        ));
        assert!(!is_native_token(
            Some("0x1111111111111111111111111111111111111111"),
            &somnia
        ));

        // a ticker colliding with the chain's display symbol stays an
        // ordinary token
        let omi = ChainProfile {
            native_symbol: "OMI".to_string(),
            native_placeholder: crate::config::NATIVE_PLACEHOLDER.to_string(),
            simple_router: false,
        };
        assert!(!is_native_token(Some("OMI"), &omi));
        assert!(is_native_token(None, &omi));
    }

    #[test]
    fn token_address_shape() {
        assert!(is_token_address(
            "0x1111111111111111111111111111111111111111"
        ));
        assert!(!is_token_address("0x1234"));
        assert!(!is_token_address("USDC"));
    }
}
