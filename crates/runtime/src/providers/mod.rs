//! LLM provider adapters.
//!
//! Each adapter maps the shared transcript onto one provider's wire format
//! and normalizes the reply. [`HttpBackend`] dispatches on [`ProviderKind`].

mod anthropic;
mod gemini;
mod openai;
mod registry;

pub use registry::{ProviderEntry, ProviderKind, ProviderRegistry};

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::{Backend, ModelError, ModelReply, ModelRequest};

/// API keys per provider. Any of them may be missing.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub google: Option<String>,
}

impl ApiKeys {
    fn for_kind(&self, kind: ProviderKind) -> Result<&str, ModelError> {
        let key = match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Gemini => &self.google,
        };
        key.as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::MissingCredentials(kind.to_string()))
    }
}

/// Builder for creating an HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpBackendBuilder {
    keys: ApiKeys,
    max_tokens: u32,
    timeout: Duration,
}

impl HttpBackendBuilder {
    pub fn new(keys: ApiKeys) -> Self {
        Self {
            keys,
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpBackend, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(HttpBackend {
            client,
            keys: self.keys,
            max_tokens: self.max_tokens,
        })
    }
}

/// Backend that talks to the hosted provider APIs over HTTPS.
pub struct HttpBackend {
    client: reqwest::Client,
    keys: ApiKeys,
    max_tokens: u32,
}

impl HttpBackend {
    pub fn builder(keys: ApiKeys) -> HttpBackendBuilder {
        HttpBackendBuilder::new(keys)
    }
}

impl Backend for HttpBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let api_key = self.keys.for_kind(request.provider)?;
        debug!(
            provider = %request.provider,
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.map_or(0, <[_]>::len),
            "calling provider"
        );

        match request.provider {
            ProviderKind::Anthropic => {
                anthropic::call(&self.client, api_key, self.max_tokens, request).await
            }
            ProviderKind::OpenAi => openai::call(&self.client, api_key, self.max_tokens, request).await,
            ProviderKind::Gemini => gemini::call(&self.client, api_key, self.max_tokens, request).await,
        }
    }
}

/// Send a JSON request and decode a JSON reply, mapping HTTP failures.
async fn send_json<T: DeserializeOwned>(
    req: RequestBuilder,
    body: &impl Serialize,
) -> Result<T, ModelError> {
    let response = req
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| ModelError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ModelError::Api { status, body });
    }

    response
        .json()
        .await
        .map_err(|e| ModelError::InvalidResponse(e.to_string()))
}

/// Parse provider-supplied arguments, falling back to an empty object.
fn arguments_value(raw: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => serde_json::Value::Object(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let backend = HttpBackend::builder(ApiKeys::default()).build().unwrap();
        let messages = [Message::system("sys"), Message::user("hi")];
        let err = backend
            .call(ModelRequest {
                provider: ProviderKind::OpenAi,
                model: "gpt-4o",
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingCredentials(p) if p == "openai"));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let keys = ApiKeys {
            google: Some(String::new()),
            ..Default::default()
        };
        assert!(keys.for_kind(ProviderKind::Gemini).is_err());
    }

    #[test]
    fn arguments_fall_back_to_empty_object() {
        assert_eq!(arguments_value(r#"{"q":"ears"}"#)["q"], "ears");
        assert_eq!(arguments_value("not json"), serde_json::json!({}));
        assert_eq!(arguments_value("[1,2]"), serde_json::json!({}));
    }
}
