//! Provider-key resolution and reply classification.

use tracing::debug;

use crate::model::{Backend, FunctionSchema, Message, ModelReply, ModelRequest, ToolCall};
use crate::providers::{ProviderEntry, ProviderRegistry};
use crate::Result;

/// Outcome of one model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelTurnResult {
    FinalAnswer { text: String },
    ToolRequest { calls: Vec<ToolCall> },
}

impl From<ModelReply> for ModelTurnResult {
    /// Tool calls win over any text sent alongside them.
    fn from(reply: ModelReply) -> Self {
        if reply.tool_calls.is_empty() {
            Self::FinalAnswer {
                text: reply.text.unwrap_or_default(),
            }
        } else {
            Self::ToolRequest {
                calls: reply.tool_calls,
            }
        }
    }
}

/// Sends transcripts to the provider selected by key.
pub struct ModelInvoker<B> {
    registry: ProviderRegistry,
    backend: B,
}

impl<B: Backend> ModelInvoker<B> {
    pub fn new(registry: ProviderRegistry, backend: B) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve a provider key without touching the network.
    pub fn resolve(&self, provider_key: &str) -> Result<&ProviderEntry> {
        self.registry.resolve(provider_key)
    }

    /// Invoke the model and classify its reply.
    pub async fn invoke(
        &self,
        provider_key: &str,
        messages: &[Message],
        tools: Option<&[FunctionSchema]>,
    ) -> Result<ModelTurnResult> {
        let reply = self.call(provider_key, messages, tools).await?;
        Ok(reply.into())
    }

    /// Invoke the model with no tools and return whatever text it produced.
    pub async fn invoke_text_only(&self, provider_key: &str, messages: &[Message]) -> Result<String> {
        let reply = self.call(provider_key, messages, None).await?;
        Ok(reply.text.unwrap_or_default())
    }

    async fn call(
        &self,
        provider_key: &str,
        messages: &[Message],
        tools: Option<&[FunctionSchema]>,
    ) -> Result<ModelReply> {
        let entry = self.resolve(provider_key)?;
        debug!(provider = provider_key, model = %entry.model, "invoking model");

        let reply = self
            .backend
            .call(ModelRequest {
                provider: entry.kind,
                model: &entry.model,
                messages,
                tools,
            })
            .await?;
        Ok(reply)
    }
}
