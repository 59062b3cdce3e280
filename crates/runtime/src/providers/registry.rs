//! Fixed mapping from provider keys to concrete models.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Wire protocol family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// A registered provider key and the model it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub key: &'static str,
    pub kind: ProviderKind,
    pub model: String,
}

const DEFAULT_ENTRIES: [(&str, ProviderKind, &str); 3] = [
    ("claude", ProviderKind::Anthropic, "claude-sonnet-4-20250514"),
    ("openai", ProviderKind::OpenAi, "gpt-4o"),
    ("gemini", ProviderKind::Gemini, "gemini-2.5-flash"),
];

/// Registry of the supported provider keys.
///
/// The key set is fixed; only the model ids can be overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ENTRIES
                .iter()
                .map(|&(key, kind, model)| ProviderEntry {
                    key,
                    kind,
                    model: model.to_string(),
                })
                .collect(),
        }
    }
}

impl ProviderRegistry {
    /// Default registry with model ids replaced per key.
    ///
    /// Fails if an override names a key outside the registry.
    pub fn with_models(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut registry = Self::default();
        for (key, model) in overrides {
            let entry = registry
                .entries
                .iter_mut()
                .find(|e| e.key == key.as_str())
                .ok_or_else(|| {
                    Error::Config(format!("unknown provider key in model overrides: {key}"))
                })?;
            entry.model = model.clone();
        }
        Ok(registry)
    }

    /// Look up a provider key.
    pub fn resolve(&self, key: &str) -> Result<&ProviderEntry> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| Error::UnsupportedProvider {
                key: key.to_string(),
                available: self
                    .supported_providers()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            })
    }

    pub fn supported_providers(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.key).collect()
    }

    pub fn model_for(&self, key: &str) -> Option<&str> {
        self.resolve(key).ok().map(|e| e.model.as_str())
    }
}
