//! External collaborator boundary.
//!
//! The engine never talks to a chain, an LLM, or a database directly;
//! every remote operation it needs is expressed as one of these traits
//! and injected as an `Arc<dyn …>`.

pub mod memory;

pub use memory::InMemoryRunStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::graph::WorkflowGraph;
use crate::types::{ExecutionRun, RunId, RunStatus, SignerIdentity, StepRecord};

/// Receipt of a broadcast, mined transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

/// A signed quote for the three-step EVM swap flow.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    /// Amount of the destination token the quote promises.
    pub buy_amount: String,
    /// Contract that must hold the allowance before the swap executes.
    pub allowance_target: String,
    /// False when the current allowance already covers the sell amount,
    /// in which case the approval step is skipped.
    pub needs_approval: bool,
}

/// Token metadata used to shape normalized swap outputs.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

/// Blockchain operations. Implementations own RPC clients, signing, and
/// nonce management; the engine only sequences and retries the calls.
#[async_trait]
pub trait ChainService: Send + Sync {
    async fn transfer_native(
        &self,
        chain: &str,
        recipient: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<TxReceipt>;

    async fn transfer_token(
        &self,
        chain: &str,
        token: &str,
        recipient: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<TxReceipt>;

    /// Read-only; not retried by the engine.
    async fn swap_quote(
        &self,
        chain: &str,
        from_token: &str,
        to_token: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<SwapQuote>;

    async fn approve_allowance(
        &self,
        chain: &str,
        token: &str,
        spender: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<TxReceipt>;

    async fn execute_swap(
        &self,
        chain: &str,
        from_token: &str,
        to_token: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<TxReceipt>;

    /// Single-call swap used on test networks with a simplified router.
    async fn simple_swap(
        &self,
        chain: &str,
        from_token: &str,
        to_token: &str,
        amount: &str,
        signer: &SignerIdentity,
    ) -> Result<TxReceipt>;

    async fn delegate_stake(
        &self,
        validator_address: &str,
        amount: &str,
        signer: &SignerIdentity,
        contract_override: Option<&str>,
    ) -> Result<TxReceipt>;

    /// Read-only; not retried by the engine.
    async fn token_metadata(&self, chain: &str, token: &str) -> Result<TokenInfo>;
}

/// LLM completion service used by AI nodes.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// External tool invocation used by external-tool nodes.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Call a directly-integrated server/tool pair.
    async fn invoke(&self, server: &str, tool: &str, parameters: &Value) -> Result<Value>;

    /// Submit a structured request to an external agent endpoint.
    async fn send_agent_request(
        &self,
        agent_address: &str,
        tool: &str,
        parameters: &Value,
    ) -> Result<Value>;
}

/// Source of persisted workflow definitions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn load_graph(&self, workflow_id: &str) -> Result<WorkflowGraph>;
}

/// Persistence collaborator for run records and step traces.
///
/// Status updates must be monotonic; implementations reject regressions
/// (a finalized run never goes back to running).
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, workflow_id: &str) -> Result<ExecutionRun>;

    async fn update_status(&self, run_id: RunId, status: RunStatus) -> Result<()>;

    async fn append_step(&self, run_id: RunId, step: StepRecord) -> Result<()>;

    async fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<()>;

    async fn get_run(&self, run_id: RunId) -> Result<ExecutionRun>;
}

/// The full set of collaborators a run needs, bundled for injection.
#[derive(Clone)]
pub struct Services {
    pub chain: Arc<dyn ChainService>,
    pub chat: Arc<dyn ChatService>,
    pub tools: Arc<dyn ToolService>,
    pub graphs: Arc<dyn GraphStore>,
    pub runs: Arc<dyn RunStore>,
}
