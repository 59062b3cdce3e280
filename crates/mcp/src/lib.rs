//! Client for remote tool endpoints speaking the Model Context Protocol.
//!
//! A [`ToolEndpoint`] opens a streamable HTTP session, fetches the tool
//! catalog once at connect time and invokes tools by name.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use mcp::ToolEndpoint;
//!
//! # async fn example() -> mcp::Result<()> {
//! let endpoint = ToolEndpoint::new();
//! endpoint.connect("http://localhost:8001/mcp", &HashMap::new()).await?;
//!
//! for tool in endpoint.list_tools().await {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("query".into(), "EARS".into());
//! let output = endpoint.call_tool("search_requirements_guidance", args).await?;
//! println!("{}", output.text);
//!
//! endpoint.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod endpoint;
mod error;

pub use descriptor::{ToolDescriptor, ToolOutput};
pub use endpoint::{DEFAULT_TIMEOUT, EndpointConfig, ToolEndpoint};
pub use error::{Error, Result};
