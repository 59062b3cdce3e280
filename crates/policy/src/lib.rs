//! Content guardrails for chat turns.
//!
//! Input checks run before the model sees a prompt: toxic prompts are
//! hard-blocked, off-topic prompts are flagged for redirect mode. Output
//! checks run on the final answer: PII is redacted and toxic terms masked.

mod error;
mod pii;
mod policy;

pub use error::{Error, Result};
pub use pii::{PiiEntity, PiiRedactor};
pub use policy::{BLOCKED_INPUT_MESSAGE, Direction, GuardrailConfig, Guardrails, Verdict};
