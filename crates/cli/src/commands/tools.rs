use dimodel_agent::ToolRegistry;

use super::{CommandResult, EXIT_FAILURE};

pub fn run() -> CommandResult {
    let registry = ToolRegistry::data_model();

    match serde_json::to_value(registry.specs()) {
        Ok(specs) => CommandResult::success_with_data(
            "tools",
            format!("{} tools registered", registry.len()),
            Some(specs),
        ),
        Err(error) => CommandResult::failure("tools", "serialization", error.to_string(), EXIT_FAILURE),
    }
}
