//! Scripted fake collaborators for unit and integration tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::graph::{Edge, Node, WorkflowGraph};
use crate::handlers::HandlerCtx;
use crate::services::{
    ChainService, ChatService, GraphStore, InMemoryRunStore, RunStore, Services, SwapQuote,
    TokenInfo, ToolService, TxReceipt,
};
use crate::types::{
    ExecutionRun, NodeId, NodeType, RunId, RunStatus, SignerIdentity, StepRecord,
};

/// Chain service that mints deterministic receipts and records every
/// call, with an optional scripted failure count for transfers.
#[derive(Default)]
pub struct FakeChainService {
    calls: Mutex<Vec<String>>,
    tx_counter: AtomicU64,
    transfer_failures: AtomicU32,
    failure_message: Mutex<String>,
    needs_approval: std::sync::atomic::AtomicBool,
}

impl FakeChainService {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn receipt(&self) -> TxReceipt {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        TxReceipt {
            tx_hash: format!("0xtx{n:04}"),
            block_number: 1000 + n,
            gas_used: 21_000,
        }
    }

    fn maybe_fail_transfer(&self) -> Result<()> {
        let remaining = self.transfer_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transfer_failures.fetch_sub(1, Ordering::SeqCst);
            bail!("{}", self.failure_message.lock().unwrap().clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ChainService for FakeChainService {
    async fn transfer_native(
        &self,
        _chain: &str,
        _recipient: &str,
        _amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<TxReceipt> {
        self.record("transfer_native");
        self.maybe_fail_transfer()?;
        Ok(self.receipt())
    }

    async fn transfer_token(
        &self,
        _chain: &str,
        _token: &str,
        _recipient: &str,
        _amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<TxReceipt> {
        self.record("transfer_token");
        self.maybe_fail_transfer()?;
        Ok(self.receipt())
    }

    async fn swap_quote(
        &self,
        _chain: &str,
        _from_token: &str,
        _to_token: &str,
        amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<SwapQuote> {
        self.record("swap_quote");
        // 1:1 fill keeps propagation assertions simple
        Ok(SwapQuote {
            buy_amount: amount.to_string(),
            allowance_target: "0xallowance".to_string(),
            needs_approval: self.needs_approval.load(Ordering::SeqCst),
        })
    }

    async fn approve_allowance(
        &self,
        _chain: &str,
        _token: &str,
        _spender: &str,
        _amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<TxReceipt> {
        self.record("approve_allowance");
        Ok(self.receipt())
    }

    async fn execute_swap(
        &self,
        _chain: &str,
        _from_token: &str,
        _to_token: &str,
        _amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<TxReceipt> {
        self.record("execute_swap");
        Ok(self.receipt())
    }

    async fn simple_swap(
        &self,
        _chain: &str,
        _from_token: &str,
        _to_token: &str,
        _amount: &str,
        _signer: &SignerIdentity,
    ) -> Result<TxReceipt> {
        self.record("simple_swap");
        Ok(self.receipt())
    }

    async fn delegate_stake(
        &self,
        _validator_address: &str,
        _amount: &str,
        _signer: &SignerIdentity,
        _contract_override: Option<&str>,
    ) -> Result<TxReceipt> {
        self.record("delegate_stake");
        Ok(self.receipt())
    }

    async fn token_metadata(&self, _chain: &str, token: &str) -> Result<TokenInfo> {
        self.record("token_metadata");
        Ok(TokenInfo {
            symbol: token.to_uppercase(),
            decimals: 18,
        })
    }
}

/// Chat service that echoes a canned reply and records the prompts.
#[derive(Default)]
pub struct FakeChatService {
    reply: Mutex<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatService for FakeChatService {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let reply = self.reply.lock().unwrap().clone();
        Ok(if reply.is_empty() {
            "fake completion".to_string()
        } else {
            reply
        })
    }
}

/// Tool service returning one canned result for every invocation.
#[derive(Default)]
pub struct FakeToolService {
    result: Mutex<Value>,
}

#[async_trait]
impl ToolService for FakeToolService {
    async fn invoke(&self, _server: &str, _tool: &str, _parameters: &Value) -> Result<Value> {
        Ok(self.result.lock().unwrap().clone())
    }

    async fn send_agent_request(
        &self,
        _agent_address: &str,
        _tool: &str,
        _parameters: &Value,
    ) -> Result<Value> {
        Ok(self.result.lock().unwrap().clone())
    }
}

/// Graph store backed by a map of pre-registered workflows.
#[derive(Default)]
pub struct StaticGraphStore {
    graphs: Mutex<HashMap<String, WorkflowGraph>>,
}

#[async_trait]
impl GraphStore for StaticGraphStore {
    async fn load_graph(&self, workflow_id: &str) -> Result<WorkflowGraph> {
        self.graphs
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| anyhow!("workflow '{workflow_id}' not found"))
    }
}

/// Run store whose step appends always fail; run creation, status
/// updates, and reads delegate to an in-memory store.
#[derive(Default)]
pub struct FailingStepStore {
    inner: InMemoryRunStore,
}

#[async_trait]
impl RunStore for FailingStepStore {
    async fn create_run(&self, workflow_id: &str) -> Result<ExecutionRun> {
        self.inner.create_run(workflow_id).await
    }

    async fn update_status(&self, run_id: RunId, status: RunStatus) -> Result<()> {
        self.inner.update_status(run_id, status).await
    }

    async fn append_step(&self, _run_id: RunId, _step: StepRecord) -> Result<()> {
        bail!("step log unavailable")
    }

    async fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.inner.finalize_run(run_id, status, error).await
    }

    async fn get_run(&self, run_id: RunId) -> Result<ExecutionRun> {
        self.inner.get_run(run_id).await
    }
}

/// The full fake collaborator set, with builder-style scripting.
#[derive(Clone, Default)]
pub struct FakeServices {
    pub chain: Arc<FakeChainService>,
    pub chat: Arc<FakeChatService>,
    pub tools: Arc<FakeToolService>,
    pub graphs: Arc<StaticGraphStore>,
    pub runs: Arc<InMemoryRunStore>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(self, workflow_id: &str, graph: WorkflowGraph) -> Self {
        self.graphs
            .graphs
            .lock()
            .unwrap()
            .insert(workflow_id.to_string(), graph);
        self
    }

    /// Script the next `count` transfer broadcasts to fail with `message`.
    pub fn with_transfer_failures(self, count: u32, message: &str) -> Self {
        self.chain.transfer_failures.store(count, Ordering::SeqCst);
        *self.chain.failure_message.lock().unwrap() = message.to_string();
        self
    }

    pub fn with_swap_approval_needed(self) -> Self {
        self.chain.needs_approval.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_chat_reply(self, reply: &str) -> Self {
        *self.chat.reply.lock().unwrap() = reply.to_string();
        self
    }

    pub fn with_tool_result(self, result: Value) -> Self {
        *self.tools.result.lock().unwrap() = result;
        self
    }

    /// Chain-service call names, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.chain.calls.lock().unwrap().clone()
    }

    /// (system prompt, user prompt) pairs seen by the chat service.
    pub fn chat_prompts(&self) -> Vec<(String, String)> {
        self.chat.prompts.lock().unwrap().clone()
    }

    pub fn services(&self) -> Services {
        Services {
            chain: self.chain.clone(),
            chat: self.chat.clone(),
            tools: self.tools.clone(),
            graphs: self.graphs.clone(),
            runs: self.runs.clone(),
        }
    }
}

pub fn handler_ctx() -> HandlerCtx {
    handler_ctx_with(FakeServices::new())
}

pub fn handler_ctx_with(fakes: FakeServices) -> HandlerCtx {
    HandlerCtx {
        config: Arc::new(EngineConfig::default()),
        services: Arc::new(fakes.services()),
        signer: SignerIdentity::new("0xsigner"),
    }
}

// Graph builders shared by the integration tests.

pub fn node(id: &str, node_type: NodeType, config: Value) -> Node {
    Node {
        id: NodeId::new(id),
        node_type,
        label: id.to_string(),
        config,
    }
}

pub fn trigger(id: &str) -> Node {
    node(id, NodeType::Trigger, json!(null))
}

pub fn edge(from: &str, to: &str) -> Edge {
    Edge {
        id: format!("{from}->{to}"),
        from: NodeId::new(from),
        to: NodeId::new(to),
        source_handle: None,
        target_handle: None,
    }
}

pub fn edge_with_handles(
    from: &str,
    to: &str,
    source_handle: Option<&str>,
    target_handle: Option<&str>,
) -> Edge {
    Edge {
        id: format!("{from}->{to}"),
        from: NodeId::new(from),
        to: NodeId::new(to),
        source_handle: source_handle.map(String::from),
        target_handle: target_handle.map(String::from),
    }
}
