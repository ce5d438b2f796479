use std::env;
use std::fs;
use std::path::Path;

use dimodel_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = match &config.llm.api_key {
        Some(key) => redact_token(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field {
            key: "llm.provider",
            env_keys: &["DIMODEL_LLM_PROVIDER"],
            value: label(&config.llm.provider),
        },
        Field { key: "llm.api_key", env_keys: &["DIMODEL_LLM_API_KEY"], value: api_key },
        Field {
            key: "llm.base_url",
            env_keys: &["DIMODEL_LLM_BASE_URL"],
            value: config.llm.base_url.clone(),
        },
        Field { key: "llm.model", env_keys: &["DIMODEL_LLM_MODEL"], value: config.llm.model.clone() },
        Field {
            key: "llm.timeout_secs",
            env_keys: &["DIMODEL_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        Field {
            key: "llm.max_retries",
            env_keys: &["DIMODEL_LLM_MAX_RETRIES"],
            value: config.llm.max_retries.to_string(),
        },
        Field {
            key: "agent.max_steps",
            env_keys: &["DIMODEL_AGENT_MAX_STEPS"],
            value: config.agent.max_steps.to_string(),
        },
        Field {
            key: "agent.max_empty_retries",
            env_keys: &["DIMODEL_AGENT_MAX_EMPTY_RETRIES"],
            value: config.agent.max_empty_retries.to_string(),
        },
        Field {
            key: "agent.design_rules",
            env_keys: &["DIMODEL_AGENT_DESIGN_RULES"],
            value: label(&config.agent.design_rules),
        },
        Field {
            key: "agent.max_display_chars",
            env_keys: &["DIMODEL_AGENT_MAX_DISPLAY_CHARS"],
            value: config.agent.max_display_chars.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["DIMODEL_LOGGING_LEVEL", "DIMODEL_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["DIMODEL_LOGGING_FORMAT", "DIMODEL_LOG_FORMAT"],
            value: label(&config.logging.format),
        },
    ]
}

/// Serialized name of a config enum, e.g. `openai` or `advisory`.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => "<unknown>".to_string(),
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env_value_present(key)) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

/// Blank variables are ignored by the loader, so they are not a source either.
fn env_value_present(key: &str) -> bool {
    env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn redaction_keeps_only_key_prefix() {
        assert_eq!(redact_token("sk-proj-abcdef"), "sk-***");
        assert_eq!(redact_token("ollama"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }
}
