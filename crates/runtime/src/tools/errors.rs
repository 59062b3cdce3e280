use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("MCP client not connected")]
    NotConnected,
    #[error("{0}")]
    Execution(String),
}

impl From<mcp::Error> for ToolError {
    fn from(err: mcp::Error) -> Self {
        match err {
            mcp::Error::NotConnected => Self::NotConnected,
            other => Self::Execution(other.to_string()),
        }
    }
}
