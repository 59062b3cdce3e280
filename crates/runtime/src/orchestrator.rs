//! Bounded tool-calling loop between a model and a tool host.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::invoker::{ModelInvoker, ModelTurnResult};
use crate::model::{Backend, FunctionSchema, ToolCall};
use crate::tools::{ToolError, ToolHost};
use crate::transcript::Transcript;
use crate::Result;

/// Default number of tool-executing rounds before the forced final call.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Tool result text used when no tool host session is available.
pub const NOT_CONNECTED_RESULT: &str = "Error: MCP client not connected";

/// Outcome of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationResult {
    pub final_text: String,
    /// Model invocations made, including a forced final call.
    pub iterations_used: usize,
    /// Whether the run hit the iteration bound.
    pub exhausted: bool,
    /// Names of the tools the model asked for, in call order.
    pub tools_used: Vec<String>,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
    Exhausted,
}

/// Drives model invocations and tool executions until a final answer.
pub struct Orchestrator<'a, B, H> {
    invoker: &'a ModelInvoker<B>,
    tools: &'a H,
    max_iterations: usize,
}

impl<'a, B: Backend, H: ToolHost> Orchestrator<'a, B, H> {
    pub fn new(invoker: &'a ModelInvoker<B>, tools: &'a H) -> Self {
        Self {
            invoker,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the loop to completion.
    ///
    /// Tool failures are folded into the transcript. Only an unknown
    /// provider key or a model failure is returned as an error, and the
    /// provider key is checked before anything is sent.
    pub async fn run(
        &self,
        provider_key: &str,
        mut transcript: Transcript,
        tool_schemas: &[FunctionSchema],
    ) -> Result<OrchestrationResult> {
        self.invoker.resolve(provider_key)?;
        let offered = (!tool_schemas.is_empty()).then_some(tool_schemas);

        let mut rounds = 0;
        let mut invocations = 0;
        let mut tools_used = Vec::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel if rounds >= self.max_iterations => LoopState::Exhausted,
                LoopState::AwaitingModel => {
                    invocations += 1;
                    debug!(provider = provider_key, iteration = invocations, "awaiting model");
                    match self
                        .invoker
                        .invoke(provider_key, transcript.messages(), offered)
                        .await?
                    {
                        ModelTurnResult::FinalAnswer { text } => LoopState::Done(text),
                        ModelTurnResult::ToolRequest { calls } => {
                            transcript.push_tool_calls(calls.clone());
                            LoopState::ExecutingTools(calls)
                        }
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    debug!(calls = calls.len(), round = rounds + 1, "executing tool calls");
                    for call in &calls {
                        let content = self.execute(call).await;
                        transcript.push_tool_result(&call.id, content);
                        tools_used.push(call.name.clone());
                    }
                    rounds += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Done(final_text) => {
                    info!(iterations = invocations, tools = tools_used.len(), "orchestration complete");
                    return Ok(OrchestrationResult {
                        final_text,
                        iterations_used: invocations,
                        exhausted: false,
                        tools_used,
                    });
                }
                LoopState::Exhausted => {
                    warn!(
                        max_iterations = self.max_iterations,
                        "iteration bound reached, forcing a final answer"
                    );
                    invocations += 1;
                    let final_text = self
                        .invoker
                        .invoke_text_only(provider_key, transcript.messages())
                        .await?;
                    return Ok(OrchestrationResult {
                        final_text,
                        iterations_used: invocations,
                        exhausted: true,
                        tools_used,
                    });
                }
            };
        }
    }

    /// Execute one call, always producing result text.
    async fn execute(&self, call: &ToolCall) -> String {
        let arguments = parse_arguments(call);

        if !self.tools.is_connected().await {
            warn!(tool = %call.name, "tool host not connected");
            return NOT_CONNECTED_RESULT.to_string();
        }

        debug!(tool = %call.name, "calling tool");
        match self.tools.call_tool(&call.name, arguments).await {
            Ok(text) => text,
            Err(ToolError::NotConnected) => NOT_CONNECTED_RESULT.to_string(),
            Err(e) => {
                error!(tool = %call.name, error = %e, "tool call failed");
                format!("Error calling tool: {e}")
            }
        }
    }
}

/// Decode raw arguments into an object, substituting `{}` when malformed.
fn parse_arguments(call: &ToolCall) -> Map<String, Value> {
    if call.raw_arguments.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(&call.raw_arguments) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool = %call.name, kind = json_kind(&other), "tool arguments are not an object");
            Map::new()
        }
        Err(e) => {
            warn!(tool = %call.name, error = %e, "failed to parse tool arguments");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
