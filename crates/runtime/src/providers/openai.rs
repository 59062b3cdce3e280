//! OpenAI Chat Completions adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::send_json;
use crate::model::{FunctionSchema, Message, ModelError, ModelReply, ModelRequest, ToolCall};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ApiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON string of the arguments.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ApiFunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn plain<'a>(role: &'static str, content: &'a str) -> ApiMessage<'a> {
    ApiMessage {
        role,
        content: Some(content),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

fn message_to_api(message: &Message) -> ApiMessage<'_> {
    match message {
        Message::System { content } => plain("system", content),
        Message::User { content } => plain("user", content),
        Message::Assistant {
            content,
            tool_calls,
        } => ApiMessage {
            role: "assistant",
            content: content.as_deref(),
            tool_calls: tool_calls
                .iter()
                .map(|call| ApiToolCall {
                    id: call.id.clone(),
                    call_type: function_type(),
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.raw_arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: None,
        },
        Message::Tool {
            tool_call_id,
            content,
        } => ApiMessage {
            role: "tool",
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id),
        },
    }
}

fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    tools: Option<&'a [FunctionSchema]>,
) -> ApiRequest<'a> {
    let tools: Vec<ApiTool<'a>> = tools
        .unwrap_or_default()
        .iter()
        .map(|schema| ApiTool {
            tool_type: "function",
            function: ApiFunctionDef {
                name: &schema.name,
                description: &schema.description,
                parameters: &schema.parameters,
            },
        })
        .collect();

    ApiRequest {
        model,
        max_tokens,
        messages: messages.iter().map(message_to_api).collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        tools,
    }
}

fn parse_response(response: ApiResponse) -> Result<ModelReply, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            raw_arguments: call.function.arguments,
        })
        .collect();

    Ok(ModelReply {
        text: choice.message.content,
        tool_calls,
    })
}

pub(super) async fn call(
    client: &reqwest::Client,
    api_key: &str,
    max_tokens: u32,
    request: ModelRequest<'_>,
) -> Result<ModelReply, ModelError> {
    let body = build_request(request.model, max_tokens, request.messages, request.tools);
    let req = client.post(OPENAI_API_URL).bearer_auth(api_key);

    let response: ApiResponse = send_json(req, &body).await?;
    parse_response(response)
}
