// Core workflow execution engine for Arcflow.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod recorder;
pub mod resolve;
pub mod retry;
pub mod services;
pub mod test_utils;
pub mod types;
pub mod walker;

pub use config::EngineConfig;
pub use engine::ExecutionEngine;
pub use error::EngineError;
pub use graph::{GraphIndex, WorkflowGraph};
pub use types::*;
