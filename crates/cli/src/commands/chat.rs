use std::io::Write;

use dimodel_agent::{AgentRuntime, GuardrailPolicy, LlmClient, OpenAiCompatibleClient, RuntimeSettings};
use dimodel_core::config::{AppConfig, LoadOptions};
use tracing::info;
use uuid::Uuid;

use super::{CommandResult, EXIT_CONFIG, EXIT_FAILURE};

pub async fn run<I, W>(
    options: LoadOptions,
    questions: I,
    thread_id: Option<String>,
    out: &mut W,
) -> CommandResult
where
    I: IntoIterator<Item = String>,
    W: Write,
{
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let client = match OpenAiCompatibleClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("chat", "llm_configuration", format!("{error:#}"), EXIT_CONFIG)
        }
    };

    run_with_client(&config, client, questions, thread_id, out).await
}

/// Sends each question through one thread and writes every new message as it
/// arrives, cut at `agent.max_display_chars`.
pub async fn run_with_client<L, I, W>(
    config: &AppConfig,
    llm: L,
    questions: I,
    thread_id: Option<String>,
    out: &mut W,
) -> CommandResult
where
    L: LlmClient,
    I: IntoIterator<Item = String>,
    W: Write,
{
    let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut runtime = AgentRuntime::new(
        llm,
        GuardrailPolicy::new(config.agent.design_rules),
        RuntimeSettings::from(&config.agent),
    );

    info!(event_name = "cli.chat.started", thread_id = %thread_id, "chat session started");

    let mut answered = 0usize;
    for question in questions {
        let question = question.trim();
        if question.is_empty() {
            continue;
        }

        let reply = match runtime.handle_message(&thread_id, question).await {
            Ok(reply) => reply,
            Err(error) => {
                return CommandResult::failure("chat", "agent", error.to_string(), EXIT_FAILURE)
            }
        };

        for message in &reply.messages {
            if let Err(error) = writeln!(out, "{}", message.render(config.agent.max_display_chars)) {
                return CommandResult::failure("chat", "output", error.to_string(), EXIT_FAILURE);
            }
        }
        answered += 1;
    }

    let created = runtime.registry().stage_tables().len()
        + runtime.registry().dimension_tables().len()
        + runtime.registry().fact_tables().len();
    CommandResult::success(
        "chat",
        format!("thread {thread_id}: answered {answered} question(s), {created} table(s) created"),
    )
}
