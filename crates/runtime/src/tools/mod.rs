//! Tool hosts and tool-schema translation.

mod empty;
pub mod errors;
mod host;
mod mcp_host;
mod schema;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp::ToolDescriptor;
pub use schema::translate;
