//! SQLite-backed conversation history for advisor sessions.
//!
//! This crate persists what the chat front door needs to remember between
//! turns: which sessions exist, when they were last active, and the user and
//! assistant messages exchanged in each. Tool traffic inside a turn is never
//! stored here; only the final exchange is.
//!
//! # Core Concepts
//!
//! ## HistoryStore
//!
//! The [`HistoryStore`] wraps a SQLite database and offers append, read and
//! expire operations keyed by [`SessionId`].
//!
//! ## Expiry
//!
//! Every saved message refreshes the owning session's `last_activity`.
//! [`HistoryStore::cleanup_expired`] deletes sessions idle for longer than the
//! given number of days, together with their messages.
//!
//! # Example
//!
//! ```no_run
//! use storage::{HistoryStore, Role, SessionId};
//!
//! let store = HistoryStore::open("sessions.db")?;
//! let session = SessionId::new();
//! store.get_or_create_session(&session)?;
//!
//! store.save_message(&session, Role::User, "What is EARS notation?")?;
//! store.save_message(&session, Role::Assistant, "EARS is ...")?;
//!
//! for message in store.history(&session)? {
//!     println!("{}: {}", message.role, message.content);
//! }
//!
//! let removed = store.cleanup_expired(30)?;
//! println!("removed {removed} idle sessions");
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::{MessageRecord, Role, SessionId, SessionSummary};
pub use store::HistoryStore;
