//! Agent Runtime - tool-calling assistant for dimensional data modeling
//!
//! This crate drives a conversation in which a hosted language model designs
//! stage, dimension and fact tables by calling tools over an in-memory
//! table registry.
//!
//! # Architecture
//!
//! The agent follows an assistant/tools loop:
//! 1. **Assistant** (`llm`, `openai`) - send the transcript and tool specs to the model
//! 2. **Tool Dispatch** (`tools`, `catalog`) - run every requested tool by name
//! 3. **Guardrails** (`guardrails`) - accept, warn about or reject new tables
//!    according to the design rules
//! 4. **Checkpointing** (`conversation`) - keep each thread's transcript in memory
//!
//! The loop ends when the model answers without requesting a tool.
//!
//! # Key Types
//!
//! - `AgentRuntime` - Main orchestrator (see `runtime` module)
//! - `LlmClient` - Pluggable trait for OpenAI-compatible endpoints
//! - `ToolRegistry` - Named tools with an error-to-message fallback
//!
//! # Safety Principle
//!
//! The model proposes tables; it never writes to the registry directly. Every
//! write goes through `add_table_with_columns`, which validates the layer, the
//! column types and the design rules before appending.

pub mod catalog;
pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod runtime;
pub mod tools;

pub use conversation::{ConversationStore, Message, Role, ToolCall};
pub use guardrails::{GuardrailDecision, GuardrailPolicy};
pub use llm::{AssistantTurn, CompletionRequest, LlmClient};
pub use openai::OpenAiCompatibleClient;
pub use runtime::{AgentError, AgentReply, AgentRuntime, RuntimeSettings};
pub use tools::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry, ToolSpec};
