//! Tool host trait.

use crate::tools::{ToolDescriptor, ToolError};
use serde_json::{Map, Value};
use std::future::Future;

/// Trait for tool execution hosts.
///
/// This is the boundary between the orchestration loop and the remote
/// tool endpoint.
pub trait ToolHost: Send + Sync {
    /// Whether tools can be called at all right now.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Cached tool catalog. Empty when disconnected.
    fn list_tools(&self) -> impl Future<Output = Vec<ToolDescriptor>> + Send;

    /// Execute a tool and return its text output.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = Result<String, ToolError>> + Send;
}
