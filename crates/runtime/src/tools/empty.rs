//! Empty tool host implementation.

use crate::tools::{ToolDescriptor, ToolError, ToolHost};
use serde_json::{Map, Value};

/// A tool host with no tools that never reports a connection.
///
/// Used when a turn must run without tools.
#[derive(Debug, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    async fn is_connected(&self) -> bool {
        false
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call_tool(&self, _name: &str, _arguments: Map<String, Value>) -> Result<String, ToolError> {
        Err(ToolError::NotConnected)
    }
}
