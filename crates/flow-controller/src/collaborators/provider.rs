//! Model provider contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::tools::{ToolCall, ToolDefinition};
use crate::error::CollaboratorError;

/// A completion request bound to one message chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub msg_chain_id: i64,
    pub prompt: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Tool outputs gathered since the previous completion
    #[serde(default)]
    pub observations: Vec<String>,
}

impl ModelRequest {
    pub fn new(msg_chain_id: i64, prompt: impl Into<String>) -> Self {
        Self {
            msg_chain_id,
            prompt: prompt.into(),
            tools: Vec::new(),
            observations: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelDecision {
    /// Final answer for the subtask
    Respond { content: String },
    /// Tools to invoke before asking again
    CallTools { calls: Vec<ToolCall> },
}

/// Language model backend for a flow.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ModelRequest) -> Result<ModelDecision, CollaboratorError>;
}
