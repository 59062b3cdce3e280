//! Tool catalog and result types.

use rmcp::model::{CallToolResult, RawContent, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within one endpoint's catalog.
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments, kept verbatim.
    pub parameter_schema: Value,
}

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            parameter_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// Text produced by a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Text blocks of the result joined by newlines.
    pub text: String,
    /// Set when the endpoint flagged the result as an error.
    pub is_error: bool,
}

impl From<CallToolResult> for ToolOutput {
    fn from(result: CallToolResult) -> Self {
        let text = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text,
            is_error: result.is_error.unwrap_or(false),
        }
    }
}
