use super::errors::ModelError;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Echoed back on the matching tool result.
    pub id: String,
    pub name: String,
    /// Serialized arguments exactly as the provider sent them.
    pub raw_arguments: String,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant turn that only requests tools.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content)
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }
}

/// A function definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    /// Never absent; empty when the tool has no description.
    pub description: String,
    pub parameters: Value,
}

/// Everything needed for a model request.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub provider: ProviderKind,
    pub model: &'a str,
    pub messages: &'a [Message],
    /// `None` forces a text-only answer.
    pub tools: Option<&'a [FunctionSchema]>,
}

/// A provider reply normalized to text plus tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelReply, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_serialize_with_role_tag() {
        let msg = Message::tool_result("call_1", "found 3 results");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "tool", "tool_call_id": "call_1", "content": "found 3 results"})
        );

        let msg = Message::assistant("hi");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "hi"})
        );
    }

    #[test]
    fn tool_call_turn_has_no_content() {
        let msg = Message::tool_calls(vec![ToolCall {
            id: "1".into(),
            name: "search".into(),
            raw_arguments: "{}".into(),
        }]);
        assert_eq!(msg.role(), "assistant");
        assert_eq!(msg.content(), None);
    }
}
