//! Anthropic Messages API adapter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{arguments_value, send_json};
use crate::model::{FunctionSchema, Message, ModelError, ModelReply, ModelRequest, ToolCall};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Build a Messages API request.
///
/// Without tools the API rejects `tool_use` and `tool_result` blocks, so
/// earlier tool traffic is replayed as plain text instead.
fn build_request(
    model: &str,
    max_tokens: u32,
    messages: &[Message],
    tools: Option<&[FunctionSchema]>,
) -> ApiRequest {
    let as_text = tools.is_none();
    let mut names: HashMap<&str, &str> = HashMap::new();
    let mut system = Vec::new();
    let mut api_messages: Vec<ApiMessage> = Vec::new();
    let mut after_tool_result = false;

    for message in messages {
        let is_tool_result = matches!(message, Message::Tool { .. });
        match message {
            Message::System { content } => system.push(content.as_str()),
            Message::User { content } => api_messages.push(ApiMessage {
                role: "user",
                content: ApiContent::Text(content.clone()),
            }),
            Message::Assistant {
                content,
                tool_calls,
            } if tool_calls.is_empty() => api_messages.push(ApiMessage {
                role: "assistant",
                content: ApiContent::Text(content.clone().unwrap_or_default()),
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let text = content
                    .iter()
                    .filter(|t| !t.is_empty())
                    .map(|t| ApiContentBlock::Text { text: t.clone() });
                for call in tool_calls {
                    names.insert(call.id.as_str(), call.name.as_str());
                }
                let calls = tool_calls.iter().map(|call| {
                    let input = arguments_value(&call.raw_arguments);
                    if as_text {
                        ApiContentBlock::Text {
                            text: format!("[called {}({input})]", call.name),
                        }
                    } else {
                        ApiContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input,
                        }
                    }
                });
                api_messages.push(ApiMessage {
                    role: "assistant",
                    content: ApiContent::Blocks(text.chain(calls).collect()),
                });
            }
            Message::Tool {
                tool_call_id,
                content,
            } => {
                let block = if as_text {
                    let name = names.get(tool_call_id.as_str()).copied().unwrap_or("tool");
                    ApiContentBlock::Text {
                        text: format!("[{name} result: {content}]"),
                    }
                } else {
                    ApiContentBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: content.clone(),
                    }
                };
                // Results of one round travel together in a single user turn.
                match api_messages.last_mut() {
                    Some(ApiMessage {
                        content: ApiContent::Blocks(blocks),
                        ..
                    }) if after_tool_result => blocks.push(block),
                    _ => api_messages.push(ApiMessage {
                        role: "user",
                        content: ApiContent::Blocks(vec![block]),
                    }),
                }
            }
        }
        after_tool_result = is_tool_result;
    }

    let tools = tools
        .unwrap_or_default()
        .iter()
        .map(|schema| ApiTool {
            name: schema.name.clone(),
            description: schema.description.clone(),
            input_schema: schema.parameters.clone(),
        })
        .collect();

    ApiRequest {
        model: model.to_string(),
        max_tokens,
        messages: api_messages,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        tools,
    }
}

fn parse_response(response: ApiResponse) -> ModelReply {
    let mut text: Option<String> = None;
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ApiResponseBlock::Text { text: t } => text.get_or_insert_with(String::new).push_str(&t),
            ApiResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                raw_arguments: input.to_string(),
            }),
            ApiResponseBlock::Unknown => {}
        }
    }

    ModelReply { text, tool_calls }
}

pub(super) async fn call(
    client: &reqwest::Client,
    api_key: &str,
    max_tokens: u32,
    request: ModelRequest<'_>,
) -> Result<ModelReply, ModelError> {
    let body = build_request(request.model, max_tokens, request.messages, request.tools);
    let req = client
        .post(ANTHROPIC_API_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("accept", "application/json");

    let response: ApiResponse = send_json(req, &body).await?;
    Ok(parse_response(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            raw_arguments: args.into(),
        }
    }

    #[test]
    fn system_goes_to_top_level_field() {
        let messages = [Message::system("be helpful"), Message::user("hi")];
        let body = serde_json::to_value(build_request("m", 1024, &messages, None)).unwrap();

        assert_eq!(body["system"], "be helpful");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
        assert!(body.get("tools").is_none());
    }

    fn search_schema() -> FunctionSchema {
        FunctionSchema {
            name: "search".into(),
            description: String::new(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn tool_results_merge_into_one_user_turn() {
        let tools = [search_schema()];
        let messages = [
            Message::system("sys"),
            Message::user("q"),
            Message::tool_calls(vec![
                tool_call("a", "search", r#"{"q":"ears"}"#),
                tool_call("b", "list", "oops"),
            ]),
            Message::tool_result("a", "result a"),
            Message::tool_result("b", "result b"),
        ];
        let body =
            serde_json::to_value(build_request("m", 1024, &messages, Some(&tools))).unwrap();
        let msgs = body["messages"].as_array().unwrap();

        assert_eq!(msgs.len(), 3);
        assert_eq!(
            msgs[1]["content"],
            json!([
                {"type": "tool_use", "id": "a", "name": "search", "input": {"q": "ears"}},
                {"type": "tool_use", "id": "b", "name": "list", "input": {}}
            ])
        );
        assert_eq!(
            msgs[2],
            json!({"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "a", "content": "result a"},
                {"type": "tool_result", "tool_use_id": "b", "content": "result b"}
            ]})
        );
    }

    #[test]
    fn tool_traffic_becomes_text_without_tools() {
        let messages = [
            Message::system("sys"),
            Message::user("q"),
            Message::tool_calls(vec![tool_call("a", "search", r#"{"q":"ears"}"#)]),
            Message::tool_result("a", "3 hits"),
        ];
        let body = serde_json::to_value(build_request("m", 1024, &messages, None)).unwrap();

        assert!(body.get("tools").is_none());
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "q"},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "[called search({\"q\":\"ears\"})]"}
                ]},
                {"role": "user", "content": [
                    {"type": "text", "text": "[search result: 3 hits]"}
                ]}
            ])
        );
        let raw = body.to_string();
        assert!(!raw.contains("tool_use"));
        assert!(!raw.contains("tool_result"));
    }

    #[test]
    fn tools_use_input_schema() {
        let tools = [search_schema()];
        let body = serde_json::to_value(build_request("m", 1024, &[], Some(&tools))).unwrap();
        assert_eq!(
            body["tools"],
            json!([{"name": "search", "description": "", "input_schema": {"type": "object"}}])
        );
    }

    #[test]
    fn response_with_text_and_tool_use() {
        let response: ApiResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {"q": "ears"}},
                {"type": "thinking", "thinking": "..."}
            ]
        }))
        .unwrap();

        let reply = parse_response(response);
        assert_eq!(reply.text.as_deref(), Some("Let me look."));
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "toolu_1");
        assert_eq!(reply.tool_calls[0].raw_arguments, r#"{"q":"ears"}"#);
    }
}
