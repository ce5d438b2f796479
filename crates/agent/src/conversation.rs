use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    fn banner(&self) -> &'static str {
        match self {
            Self::System => "System Message",
            Self::User => "Human Message",
            Self::Assistant => "Ai Message",
            Self::Tool => "Tool Message",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None, tool_name: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls, ..Self::plain(Role::Assistant, content) }
    }

    pub fn tool(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// Human-readable rendering for transcripts, cut at `max_chars` characters.
    pub fn render(&self, max_chars: usize) -> String {
        let mut body = format!("================ {} ================\n", self.role.banner());
        if let Some(tool_name) = &self.tool_name {
            body.push_str(&format!("Name: {tool_name}\n\n"));
        }
        body.push_str(&self.content);
        for call in &self.tool_calls {
            body.push_str(&format!("\nTool Call: {} ({})\n Args: {}", call.name, call.id, call.arguments));
        }
        truncate(&body, max_chars)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut = text.chars().take(max_chars).collect::<String>();
    cut.push_str(" ... (truncated)");
    cut
}

/// Per-thread transcripts kept for the life of the process.
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    threads: HashMap<String, Vec<Message>>,
}

impl ConversationStore {
    pub fn load(&self, thread_id: &str) -> Vec<Message> {
        self.threads.get(thread_id).cloned().unwrap_or_default()
    }

    pub fn save(&mut self, thread_id: &str, messages: Vec<Message>) {
        self.threads.insert(thread_id.to_string(), messages);
    }

    pub fn clear(&mut self, thread_id: &str) -> bool {
        self.threads.remove(thread_id).is_some()
    }

    pub fn thread_ids(&self) -> Vec<&str> {
        let mut ids = self.threads.keys().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConversationStore, Message, Role, ToolCall};

    #[test]
    fn store_keeps_threads_apart() {
        let mut store = ConversationStore::default();
        store.save("thread-a", vec![Message::user("show stage tables")]);
        store.save("thread-b", vec![Message::user("design a KPI")]);

        assert_eq!(store.load("thread-a")[0].content, "show stage tables");
        assert_eq!(store.thread_ids(), vec!["thread-a", "thread-b"]);
        assert!(store.load("thread-c").is_empty());

        assert!(store.clear("thread-a"));
        assert!(!store.clear("thread-a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tool_message_records_call_id_and_name() {
        let message = Message::tool("call-1", "get_stage_tables_with_columns", "[]");

        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(message.tool_name.as_deref(), Some("get_stage_tables_with_columns"));
    }

    #[test]
    fn render_truncates_long_content() {
        let message = Message::user("x".repeat(40));
        let rendered = message.render(20);

        assert!(rendered.ends_with(" ... (truncated)"));
        assert_eq!(rendered.chars().count(), 20 + " ... (truncated)".len());
    }

    #[test]
    fn render_lists_tool_calls() {
        let message = Message::assistant(
            "",
            vec![ToolCall {
                id: "call-7".to_string(),
                name: "dimensional_design_principles".to_string(),
                arguments: json!({}),
            }],
        );
        let rendered = message.render(1500);

        assert!(rendered.starts_with("================ Ai Message"));
        assert!(rendered.contains("Tool Call: dimensional_design_principles (call-7)"));
    }
}
