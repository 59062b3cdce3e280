//! Requirements advisor runtime: model providers, the tool-calling loop and
//! the chat turn service.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Backend**: a trait over LLM provider APIs (Anthropic, OpenAI, Gemini).
//! - **ModelInvoker**: resolves a provider key and classifies each reply as a
//!   final answer or a tool request.
//! - **ToolHost**: the tool endpoint as seen by the loop.
//! - **Orchestrator**: runs model and tool rounds until a final answer or the
//!   iteration bound.
//! - **Advisor**: one chat turn end to end, with guardrails and history.
//!
//! # Example
//!
//! ```no_run
//! use mcp::ToolEndpoint;
//! use policy::Guardrails;
//! use runtime::{Advisor, ApiKeys, HttpBackend, ModelInvoker, ProviderRegistry, TurnRequest};
//! use storage::HistoryStore;
//!
//! # async fn example() -> runtime::Result<()> {
//! let keys = ApiKeys {
//!     anthropic: Some("sk-ant-api01-...".into()),
//!     ..Default::default()
//! };
//! let backend = HttpBackend::builder(keys).build()?;
//! let invoker = ModelInvoker::new(ProviderRegistry::default(), backend);
//! let advisor = Advisor::new(
//!     invoker,
//!     ToolEndpoint::new(),
//!     Guardrails::disabled(),
//!     HistoryStore::in_memory()?,
//! );
//!
//! let outcome = advisor
//!     .handle_turn(TurnRequest {
//!         message: "What is EARS notation?".into(),
//!         session_id: None,
//!         provider: "claude".into(),
//!         history: Vec::new(),
//!     })
//!     .await?;
//! println!("{}", outcome.response);
//! # Ok(())
//! # }
//! ```

mod advisor;
mod error;
mod invoker;
pub mod model;
mod orchestrator;
mod prompts;
pub mod providers;
pub mod tools;
mod transcript;

#[cfg(test)]
mod test_support;

pub use advisor::{
    Advisor, AdvisorSettings, DEFAULT_HISTORY_WINDOW, HistoryEntry, TurnOutcome, TurnRequest,
};
pub use error::{Error, Result};
pub use invoker::{ModelInvoker, ModelTurnResult};
pub use model::{
    Backend, FailureKind, FunctionSchema, Message, ModelError, ModelReply, ModelRequest, ToolCall,
};
pub use orchestrator::{
    DEFAULT_MAX_ITERATIONS, NOT_CONNECTED_RESULT, OrchestrationResult, Orchestrator,
};
pub use prompts::{REDIRECT_SYSTEM_MESSAGE, SYSTEM_MESSAGE};
pub use providers::{
    ApiKeys, HttpBackend, HttpBackendBuilder, ProviderEntry, ProviderKind, ProviderRegistry,
};
pub use tools::{EmptyToolHost, ToolDescriptor, ToolError, ToolHost, translate};
pub use transcript::Transcript;
