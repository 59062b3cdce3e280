//! Provider-agnostic message types and the backend trait.

pub mod errors;
pub mod types;

pub use errors::{FailureKind, ModelError};
pub use types::{Backend, FunctionSchema, Message, ModelReply, ModelRequest, ToolCall};
