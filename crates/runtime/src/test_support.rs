//! Scripted backend and tool host for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::model::{Backend, FunctionSchema, Message, ModelError, ModelReply, ModelRequest, ToolCall};
use crate::providers::ProviderKind;
use crate::tools::{ToolDescriptor, ToolError, ToolHost};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Option<Vec<FunctionSchema>>,
}

/// Replays queued replies and records every request.
///
/// The last reply repeats once the queue is down to one entry.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::repeating(ModelReply {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
        })
    }

    pub fn repeating(reply: ModelReply) -> Self {
        Self::new(vec![Ok(reply)])
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Backend for ScriptedBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            provider: request.provider,
            model: request.model.to_string(),
            messages: request.messages.to_vec(),
            tools: request.tools.map(<[_]>::to_vec),
        });

        let mut replies = self.replies.lock().unwrap();
        let next = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        next.unwrap_or_else(|| Err(ModelError::InvalidResponse("script exhausted".into())))
    }
}

/// Tool host with canned results and a call log.
pub struct StubToolHost {
    connected: bool,
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, Result<String, ToolError>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl StubToolHost {
    pub fn connected() -> Self {
        Self {
            connected: true,
            tools: Vec::new(),
            results: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::connected()
        }
    }

    pub fn with_tool(mut self, name: &str, description: Option<&str>) -> Self {
        self.tools.push(ToolDescriptor {
            name: name.to_string(),
            description: description.map(String::from),
            parameter_schema: serde_json::json!({"type": "object", "properties": {}}),
        });
        self
    }

    pub fn with_result(mut self, name: &str, result: Result<String, ToolError>) -> Self {
        self.results.insert(name.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolHost for StubToolHost {
    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        if self.connected {
            self.tools.clone()
        } else {
            Vec::new()
        }
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(format!("{name} result")))
    }
}

pub fn tool_call(id: &str, name: &str, raw_arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        raw_arguments: raw_arguments.to_string(),
    }
}

pub fn tool_reply(calls: Vec<ToolCall>) -> ModelReply {
    ModelReply {
        text: None,
        tool_calls: calls,
    }
}
