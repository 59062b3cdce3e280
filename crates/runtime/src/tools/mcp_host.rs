//! MCP-backed tool host.

use super::{ToolDescriptor, ToolError, ToolHost};
use mcp::ToolEndpoint;
use serde_json::{Map, Value};
use tracing::warn;

impl ToolHost for ToolEndpoint {
    async fn is_connected(&self) -> bool {
        ToolEndpoint::is_connected(self).await
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        ToolEndpoint::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let output = ToolEndpoint::call_tool(self, name, arguments).await?;
        if output.is_error {
            warn!(tool = name, "tool returned an error result");
        }
        Ok(output.text)
    }
}
