use std::fmt;

use async_trait::async_trait;
use dimodel_core::{DomainError, TableRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{
    AddTableTool, DesignPrinciplesTool, DimensionAndFactTablesTool, SourceTablesTool,
    StageTablesTool,
};
use crate::conversation::ToolCall;
use crate::guardrails::GuardrailPolicy;

/// What a tool may touch while it runs.
pub struct ToolContext<'a> {
    pub registry: &'a mut TableRegistry,
    pub guardrails: &'a GuardrailPolicy,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid input for `{tool}`: {message}")]
    InvalidInput { tool: String, message: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{message}")]
    Rejected { reason_code: &'static str, message: String },
    #[error("could not encode tool output: {0}")]
    Output(#[from] serde_json::Error),
}

impl ToolError {
    pub fn invalid_input(tool: &str, error: impl fmt::Display) -> Self {
        Self::InvalidInput { tool: tool.to_string(), message: error.to_string() }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Domain(error) => error.reason_code(),
            Self::Rejected { reason_code, .. } => *reason_code,
            Self::Output(_) => "output_encoding",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read by the model when it picks the next tool.
    fn description(&self) -> &'static str;

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, context: &mut ToolContext<'_>, input: Value)
        -> Result<Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// The five data-model tools, in the order they are offered to the model.
    pub fn data_model() -> Self {
        let mut registry = Self::default();
        registry.register(SourceTablesTool);
        registry.register(StageTablesTool);
        registry.register(DimensionAndFactTablesTool);
        registry.register(DesignPrinciplesTool);
        registry.register(AddTableTool);
        registry
    }

    /// Registers `tool`, replacing any tool with the same name in place.
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        match self.tools.iter().position(|existing| existing.name() == tool.name()) {
            Some(index) => self.tools[index] = Box::new(tool),
            None => self.tools.push(Box::new(tool)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|tool| tool.name() == name).map(|tool| &**tool)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(
        &self,
        context: &mut ToolContext<'_>,
        name: &str,
        input: Value,
    ) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(context, input).await
    }

    /// Runs a model-requested call. Failures are folded into an error outcome
    /// addressed back to the model instead of ending the conversation.
    pub async fn dispatch(&self, context: &mut ToolContext<'_>, call: &ToolCall) -> ToolOutcome {
        debug!(
            event_name = "agent.tool.dispatched",
            tool_name = %call.name,
            call_id = %call.id,
            "dispatching tool call"
        );

        match self.execute(context, &call.name, call.arguments.clone()).await {
            Ok(output) => ToolOutcome {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content: render_output(&output),
                is_error: false,
            },
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool_name = %call.name,
                    call_id = %call.id,
                    reason_code = error.reason_code(),
                    error = %error,
                    "tool call failed"
                );
                ToolOutcome {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content: fallback_message(&error),
                    is_error: true,
                }
            }
        }
    }
}

pub fn fallback_message(error: &ToolError) -> String {
    format!("Error: {error}\n please fix your mistakes.")
}

/// Strings pass through unchanged; any other JSON is compact-encoded.
pub fn render_output(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
