use dimodel_agent::{GuardrailPolicy, ToolContext, ToolRegistry};
use dimodel_core::config::{AppConfig, DesignRuleMode, LoadOptions};
use dimodel_core::TableRegistry;
use serde_json::Value;

use super::{CommandResult, EXIT_CONFIG, EXIT_FAILURE, EXIT_USAGE};

/// Runs one tool against a freshly seeded registry.
pub async fn run(
    mut options: LoadOptions,
    tool: &str,
    input: Option<&str>,
    advisory: bool,
) -> CommandResult {
    if advisory {
        options.overrides.design_rules = Some(DesignRuleMode::Advisory);
    }

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("call", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let input = match input.map(serde_json::from_str::<Value>).transpose() {
        Ok(input) => input.unwrap_or_else(|| Value::Object(Default::default())),
        Err(error) => {
            return CommandResult::failure(
                "call",
                "invalid_input",
                format!("--input is not valid JSON: {error}"),
                EXIT_USAGE,
            )
        }
    };

    let tools = ToolRegistry::data_model();
    let mut registry = TableRegistry::seeded();
    let guardrails = GuardrailPolicy::new(config.agent.design_rules);
    let mut context = ToolContext { registry: &mut registry, guardrails: &guardrails };

    match tools.execute(&mut context, tool, input).await {
        Ok(output) => {
            CommandResult::success_with_data("call", format!("tool `{tool}` completed"), Some(output))
        }
        Err(error) => {
            CommandResult::failure("call", error.reason_code(), error.to_string(), EXIT_FAILURE)
        }
    }
}
