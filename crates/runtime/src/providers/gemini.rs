//! Google Gemini generateContent adapter.
//!
//! Gemini function calls carry no id. Ids are synthesized per reply
//! (`call_<n>`) and function responses recover the tool name from the
//! assistant turn that issued the matching id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{arguments_value, send_json};
use crate::model::{FunctionSchema, Message, ModelError, ModelReply, ModelRequest, ToolCall};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn text_part(text: &str) -> ApiPart {
    ApiPart {
        text: Some(text.to_string()),
        ..Default::default()
    }
}

fn build_request(
    max_tokens: u32,
    messages: &[Message],
    tools: Option<&[FunctionSchema]>,
) -> ApiRequest {
    let mut system = Vec::new();
    let mut contents: Vec<ApiContent> = Vec::new();
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut after_tool_result = false;

    for message in messages {
        let is_tool_result = matches!(message, Message::Tool { .. });
        match message {
            Message::System { content } => system.push(text_part(content)),
            Message::User { content } => contents.push(ApiContent {
                role: Some("user".into()),
                parts: vec![text_part(content)],
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts: Vec<ApiPart> = content
                    .iter()
                    .filter(|t| !t.is_empty() || tool_calls.is_empty())
                    .map(|t| text_part(t))
                    .collect();
                for call in tool_calls {
                    call_names.insert(&call.id, &call.name);
                    parts.push(ApiPart {
                        function_call: Some(ApiFunctionCall {
                            name: call.name.clone(),
                            args: arguments_value(&call.raw_arguments),
                        }),
                        ..Default::default()
                    });
                }
                if parts.is_empty() {
                    parts.push(text_part(""));
                }
                contents.push(ApiContent {
                    role: Some("model".into()),
                    parts,
                });
            }
            Message::Tool {
                tool_call_id,
                content,
            } => {
                let name = call_names
                    .get(tool_call_id.as_str())
                    .copied()
                    .unwrap_or(tool_call_id.as_str());
                let part = ApiPart {
                    function_response: Some(ApiFunctionResponse {
                        name: name.to_string(),
                        response: json!({ "result": content }),
                    }),
                    ..Default::default()
                };
                match contents.last_mut() {
                    Some(last) if after_tool_result => last.parts.push(part),
                    _ => contents.push(ApiContent {
                        role: Some("user".into()),
                        parts: vec![part],
                    }),
                }
            }
        }
        after_tool_result = is_tool_result;
    }

    let declarations: Vec<ApiFunctionDeclaration> = tools
        .unwrap_or_default()
        .iter()
        .map(|schema| ApiFunctionDeclaration {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters.clone(),
        })
        .collect();

    ApiRequest {
        system_instruction: (!system.is_empty()).then_some(ApiContent {
            role: None,
            parts: system,
        }),
        contents,
        tools: if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ApiTool {
                function_declarations: declarations,
            }]
        },
        generation_config: ApiGenerationConfig {
            max_output_tokens: max_tokens,
        },
    }
}

fn parse_response(response: ApiResponse) -> Result<ModelReply, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("response has no candidates".into()))?;

    let mut reply = ModelReply::default();
    for part in candidate.content.unwrap_or_default().parts {
        if let Some(text) = part.text {
            reply.text.get_or_insert_with(String::new).push_str(&text);
        }
        if let Some(call) = part.function_call {
            let id = format!("call_{}", reply.tool_calls.len());
            reply.tool_calls.push(ToolCall {
                id,
                name: call.name,
                raw_arguments: call.args.to_string(),
            });
        }
    }
    Ok(reply)
}

pub(super) async fn call(
    client: &reqwest::Client,
    api_key: &str,
    max_tokens: u32,
    request: ModelRequest<'_>,
) -> Result<ModelReply, ModelError> {
    let body = build_request(max_tokens, request.messages, request.tools);
    let url = format!("{GEMINI_API_BASE}/{}:generateContent", request.model);
    let req = client.post(url).header("x-goog-api-key", api_key);

    let response: ApiResponse = send_json(req, &body).await?;
    parse_response(response)
}
