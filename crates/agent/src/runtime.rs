use dimodel_core::config::AgentConfig;
use dimodel_core::TableRegistry;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationStore, Message};
use crate::guardrails::GuardrailPolicy;
use crate::llm::{AssistantTurn, CompletionRequest, LlmClient};
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry, ToolSpec};

pub const SYSTEM_PROMPT: &str = "You are a helpful customer support assistant for Dimensional \
Data Modeling. Use the provided tools to search for tables and columns to answer the user's \
questions. If a search comes up empty, expand your search before giving up.";

pub const EMPTY_RESPONSE_NUDGE: &str = "Respond with a real output.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub max_steps: u32,
    pub max_empty_retries: u32,
    pub system_prompt: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { max_steps: 25, max_empty_retries: 3, system_prompt: SYSTEM_PROMPT.to_string() }
    }
}

impl From<&AgentConfig> for RuntimeSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            max_empty_retries: config.max_empty_retries,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("language model call failed: {0:#}")]
    Llm(anyhow::Error),
    #[error("model returned no output after {attempts} attempts")]
    EmptyResponse { attempts: u32 },
    #[error("conversation exceeded {limit} assistant steps")]
    StepLimitExceeded { limit: u32 },
}

/// Result of one user message.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub thread_id: String,
    pub text: String,
    /// Messages appended to the thread by this exchange, user message first.
    pub messages: Vec<Message>,
    pub tool_outcomes: Vec<ToolOutcome>,
}

pub struct AgentRuntime<L> {
    llm: L,
    tools: ToolRegistry,
    tool_specs: Vec<ToolSpec>,
    registry: TableRegistry,
    guardrails: GuardrailPolicy,
    conversations: ConversationStore,
    settings: RuntimeSettings,
}

impl<L> AgentRuntime<L>
where
    L: LlmClient,
{
    /// Runtime over the seeded source tables and the five data-model tools.
    pub fn new(llm: L, guardrails: GuardrailPolicy, settings: RuntimeSettings) -> Self {
        Self::with_registry(llm, TableRegistry::seeded(), guardrails, settings)
    }

    pub fn with_registry(
        llm: L,
        registry: TableRegistry,
        guardrails: GuardrailPolicy,
        settings: RuntimeSettings,
    ) -> Self {
        let tools = ToolRegistry::data_model();
        let tool_specs = tools.specs();
        Self {
            llm,
            tools,
            tool_specs,
            registry,
            guardrails,
            conversations: ConversationStore::default(),
            settings,
        }
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn llm(&self) -> &L {
        &self.llm
    }

    pub async fn handle_message(
        &mut self,
        thread_id: &str,
        text: &str,
    ) -> Result<AgentReply, AgentError> {
        let mut transcript = self.conversations.load(thread_id);
        if transcript.is_empty() {
            transcript.push(Message::system(self.settings.system_prompt.clone()));
        }
        let exchange_start = transcript.len();
        transcript.push(Message::user(text));

        info!(
            event_name = "agent.message.received",
            thread_id,
            history_len = exchange_start,
            "handling user message"
        );

        let mut tool_outcomes = Vec::new();
        let mut steps = 0u32;

        let final_text = loop {
            if steps >= self.settings.max_steps {
                warn!(
                    event_name = "agent.step_limit.exceeded",
                    thread_id,
                    limit = self.settings.max_steps,
                    "assistant step limit reached"
                );
                return Err(AgentError::StepLimitExceeded { limit: self.settings.max_steps });
            }
            steps += 1;

            let turn = self.next_turn(thread_id, &transcript).await?;
            let calls = turn.tool_calls.clone();
            let content = turn.content.clone();
            transcript.push(turn.into_message());

            if calls.is_empty() {
                break content;
            }

            let mut context =
                ToolContext { registry: &mut self.registry, guardrails: &self.guardrails };
            for call in &calls {
                let outcome = self.tools.dispatch(&mut context, call).await;
                transcript.push(Message::tool(
                    outcome.call_id.clone(),
                    outcome.tool_name.clone(),
                    outcome.content.clone(),
                ));
                tool_outcomes.push(outcome);
            }
            // Tool writes are already in the registry; keep the thread in step with them.
            self.conversations.save(thread_id, transcript.clone());
        };

        let messages = transcript[exchange_start..].to_vec();
        self.conversations.save(thread_id, transcript);

        info!(
            event_name = "agent.message.answered",
            thread_id,
            steps,
            tool_calls = tool_outcomes.len(),
            "assistant answered"
        );

        Ok(AgentReply { thread_id: thread_id.to_string(), text: final_text, messages, tool_outcomes })
    }

    /// Asks the model for the next turn. An empty turn is retried with a
    /// nudge that is sent to the model but never stored in the transcript.
    async fn next_turn(
        &self,
        thread_id: &str,
        transcript: &[Message],
    ) -> Result<AssistantTurn, AgentError> {
        let turn = self.complete(transcript).await?;
        if !turn.is_empty() {
            return Ok(turn);
        }

        let mut nudged = transcript.to_vec();
        nudged.push(Message::user(EMPTY_RESPONSE_NUDGE));
        for attempt in 1..=self.settings.max_empty_retries {
            debug!(event_name = "agent.llm.empty_response", thread_id, attempt, "re-prompting model");
            let turn = self.complete(&nudged).await?;
            if !turn.is_empty() {
                return Ok(turn);
            }
        }

        Err(AgentError::EmptyResponse { attempts: self.settings.max_empty_retries + 1 })
    }

    async fn complete(&self, messages: &[Message]) -> Result<AssistantTurn, AgentError> {
        self.llm
            .complete(CompletionRequest { messages, tools: &self.tool_specs })
            .await
            .map_err(AgentError::Llm)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use dimodel_core::Layer;
    use serde_json::json;

    use super::{AgentError, AgentRuntime, RuntimeSettings, EMPTY_RESPONSE_NUDGE, SYSTEM_PROMPT};
    use crate::conversation::{Message, Role, ToolCall};
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::{AssistantTurn, CompletionRequest, LlmClient};

    /// Replays canned turns and records every transcript it was shown.
    #[derive(Default)]
    struct ScriptedLlm {
        turns: Mutex<VecDeque<AssistantTurn>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<AssistantTurn>) -> Self {
            Self { turns: Mutex::new(turns.into()), seen: Mutex::default() }
        }

        fn seen(&self) -> Vec<Vec<Message>> {
            self.seen.lock().expect("seen lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantTurn> {
            assert_eq!(request.tools.len(), 5);
            self.seen.lock().expect("seen lock").push(request.messages.to_vec());
            self.turns
                .lock()
                .expect("turn lock")
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> AssistantTurn {
        AssistantTurn::calls(vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }])
    }

    fn runtime(turns: Vec<AssistantTurn>) -> AgentRuntime<ScriptedLlm> {
        AgentRuntime::new(ScriptedLlm::new(turns), GuardrailPolicy::default(), RuntimeSettings::default())
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let mut agent = runtime(vec![
            call("call_1", "get_stage_tables_with_columns", json!({})),
            AssistantTurn::text("There are no stage tables yet."),
        ]);

        let reply = agent.handle_message("t1", "Which stage tables exist?").await.expect("reply");

        assert_eq!(reply.text, "There are no stage tables yet.");
        assert_eq!(reply.tool_outcomes.len(), 1);
        assert_eq!(reply.tool_outcomes[0].content, "[]");
        let roles = reply.messages.iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);

        let seen = agent.llm().seen();
        assert_eq!(seen[0][0], Message::system(SYSTEM_PROMPT));
        assert_eq!(seen[1].last().map(|message| message.role), Some(Role::Tool));
    }

    #[tokio::test]
    async fn add_table_call_updates_registry() {
        let columns = json!([
            {"name": "id", "data_type": "IntegerType", "nullable": false},
            {"name": "name", "data_type": "StringType"}
        ]);
        let mut agent = runtime(vec![
            call(
                "call_1",
                "add_table_with_columns",
                json!({"layer_name": "dimension", "table_name": "dim_customer", "columns": columns}),
            ),
            AssistantTurn::text("Created dim_customer."),
        ]);

        let reply = agent.handle_message("t1", "Build a customer dimension").await.expect("reply");

        assert!(!reply.tool_outcomes[0].is_error);
        assert!(agent.registry().find(Layer::Dimension, "dim_customer").is_some());
    }

    #[tokio::test]
    async fn tool_error_is_fed_back_to_model() {
        let mut agent = runtime(vec![
            call(
                "call_1",
                "add_table_with_columns",
                json!({"layer_name": "gold", "table_name": "x", "columns": []}),
            ),
            AssistantTurn::text("Sorry, gold is not a layer."),
        ]);

        let reply = agent.handle_message("t1", "add a gold table").await.expect("reply");

        let outcome = &reply.tool_outcomes[0];
        assert!(outcome.is_error);
        assert!(outcome.content.starts_with("Error: "));
        assert!(outcome.content.ends_with("\n please fix your mistakes."));
        assert_eq!(agent.llm().seen()[1].last().map(|m| m.content.clone()), Some(outcome.content.clone()));
    }

    #[tokio::test]
    async fn failed_exchange_keeps_completed_tool_steps() {
        let mut agent = runtime(vec![call(
            "call_1",
            "add_table_with_columns",
            json!({
                "layer_name": "dimension",
                "table_name": "dim_customer",
                "columns": [{"name": "id", "data_type": "IntegerType", "nullable": false}]
            }),
        )]);

        let result = agent.handle_message("t1", "Build a customer dimension").await;

        assert!(matches!(result, Err(AgentError::Llm(_))));
        assert_eq!(agent.registry().dimension_tables().len(), 1);
        let history = agent.conversations().load("t1");
        let roles = history.iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(history[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(history[3].content.contains("dim_customer created successfully"));
    }

    #[tokio::test]
    async fn empty_reply_is_nudged_without_persisting_nudge() {
        let mut agent = runtime(vec![AssistantTurn::default(), AssistantTurn::text("Here you go.")]);

        let reply = agent.handle_message("t1", "hello").await.expect("reply");

        assert_eq!(reply.text, "Here you go.");
        let seen = agent.llm().seen();
        assert_eq!(seen[1].last(), Some(&Message::user(EMPTY_RESPONSE_NUDGE)));
        assert!(reply.messages.iter().all(|message| message.content != EMPTY_RESPONSE_NUDGE));
    }

    #[tokio::test]
    async fn persistent_empty_replies_give_up() {
        let settings = RuntimeSettings { max_empty_retries: 1, ..RuntimeSettings::default() };
        let mut agent = AgentRuntime::new(
            ScriptedLlm::new(vec![AssistantTurn::default(), AssistantTurn::text("   ")]),
            GuardrailPolicy::default(),
            settings,
        );

        let result = agent.handle_message("t1", "hello").await;

        assert!(matches!(result, Err(AgentError::EmptyResponse { attempts: 2 })));
        assert!(agent.conversations().is_empty());
    }

    #[tokio::test]
    async fn step_limit_stops_tool_loops() {
        let settings = RuntimeSettings { max_steps: 2, ..RuntimeSettings::default() };
        let mut agent = AgentRuntime::new(
            ScriptedLlm::new(vec![
                call("c1", "dimensional_design_principles", json!({})),
                call("c2", "dimensional_design_principles", json!({})),
                AssistantTurn::text("never reached"),
            ]),
            GuardrailPolicy::default(),
            settings,
        );

        let result = agent.handle_message("t1", "loop forever").await;

        assert!(matches!(result, Err(AgentError::StepLimitExceeded { limit: 2 })));
    }

    #[tokio::test]
    async fn threads_keep_separate_history() {
        let mut agent = runtime(vec![
            AssistantTurn::text("first answer"),
            AssistantTurn::text("second answer"),
            AssistantTurn::text("other thread"),
        ]);

        agent.handle_message("a", "one").await.expect("first");
        agent.handle_message("a", "two").await.expect("second");
        agent.handle_message("b", "three").await.expect("third");

        let seen = agent.llm().seen();
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[2].len(), 2);
        assert_eq!(agent.conversations().thread_ids(), vec!["a", "b"]);
        assert_eq!(agent.conversations().load("a").len(), 5);
    }

    #[tokio::test]
    async fn llm_failure_surfaces() {
        let mut agent = runtime(Vec::new());

        let result = agent.handle_message("t1", "hello").await;

        assert!(matches!(result, Err(AgentError::Llm(_))));
    }
}
