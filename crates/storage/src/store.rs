//! SQLite history store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::{Error, MessageRecord, Result, Role, SessionId, SessionSummary};

/// SQLite-backed store of chat sessions and their messages.
///
/// The connection sits behind a mutex so one store can be shared by
/// concurrent request handlers.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open or create a history store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory history store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_session
                ON chat_messages(session_id, id);
            "#,
        )?;
        Ok(())
    }

    /// Make sure a session row exists for `id`, creating it if needed.
    pub fn get_or_create_session(&self, id: &SessionId) -> Result<()> {
        let now = timestamp(Utc::now());
        let created = self.conn()?.execute(
            "INSERT OR IGNORE INTO sessions (id, created_at, last_activity) VALUES (?1, ?2, ?2)",
            params![id.as_str(), now],
        )?;
        if created > 0 {
            debug!(session_id = %id, "created session");
        }
        Ok(())
    }

    /// Append a message to a session and refresh its activity timestamp.
    pub fn save_message(&self, id: &SessionId, role: Role, content: &str) -> Result<()> {
        let now = timestamp(Utc::now());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO sessions (id, created_at, last_activity) VALUES (?1, ?2, ?2)",
            params![id.as_str(), now],
        )?;
        tx.execute(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.as_str(), role.as_str(), content, now],
        )?;
        tx.execute(
            "UPDATE sessions SET last_activity = ?2 WHERE id = ?1",
            params![id.as_str(), now],
        )?;
        tx.commit()?;
        debug!(session_id = %id, %role, "saved message");
        Ok(())
    }

    /// Load the full history of a session in chronological order.
    pub fn history(&self, id: &SessionId) -> Result<Vec<MessageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM chat_messages
             WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, created_at) = row?;
            messages.push(MessageRecord {
                role: role.parse()?,
                content,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(messages)
    }

    /// Load the last `limit` messages of a session, oldest first.
    pub fn recent(&self, id: &SessionId, limit: usize) -> Result<Vec<MessageRecord>> {
        let mut messages = self.history(id)?;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    /// Check whether a session exists.
    pub fn session_exists(&self, id: &SessionId) -> Result<bool> {
        let found = self
            .conn()?
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                [id.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// List all sessions, most recently active first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.created_at, s.last_activity, COUNT(m.id)
             FROM sessions s LEFT JOIN chat_messages m ON m.session_id = s.id
             GROUP BY s.id ORDER BY s.last_activity DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, created_at, last_activity, count) = row?;
            sessions.push(SessionSummary {
                id: SessionId::from(id),
                created_at: parse_timestamp(&created_at)?,
                last_activity: parse_timestamp(&last_activity)?,
                message_count: usize::try_from(count).unwrap_or_default(),
            });
        }
        Ok(sessions)
    }

    /// Delete sessions inactive for more than `days` days.
    ///
    /// Returns the number of sessions removed. Their messages go with them.
    pub fn cleanup_expired(&self, days: u32) -> Result<usize> {
        self.cleanup_inactive_since(Utc::now() - Duration::days(i64::from(days)))
    }

    fn cleanup_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = timestamp(cutoff);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chat_messages WHERE session_id IN
             (SELECT id FROM sessions WHERE last_activity < ?1)",
            [&cutoff],
        )?;
        let deleted = tx.execute("DELETE FROM sessions WHERE last_activity < ?1", [&cutoff])?;
        tx.commit()?;

        if deleted > 0 {
            info!(count = deleted, "cleaned up expired sessions");
        }
        Ok(deleted)
    }
}

// Fixed-width UTC timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_chronological() {
        let store = HistoryStore::in_memory().unwrap();
        let id = SessionId::from("s1");
        store.get_or_create_session(&id).unwrap();
        store.save_message(&id, Role::User, "What is EARS?").unwrap();
        store.save_message(&id, Role::Assistant, "EARS is ...").unwrap();

        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "What is EARS?");
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = HistoryStore::in_memory().unwrap();
        let id = SessionId::from("s1");
        store.get_or_create_session(&id).unwrap();
        store.get_or_create_session(&id).unwrap();

        assert!(store.session_exists(&id).unwrap());
        assert_eq!(store.list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn save_message_creates_missing_session() {
        let store = HistoryStore::in_memory().unwrap();
        let id = SessionId::from("fresh");
        store.save_message(&id, Role::User, "hi").unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].message_count, 1);
    }

    #[test]
    fn recent_keeps_the_tail() {
        let store = HistoryStore::in_memory().unwrap();
        let id = SessionId::from("s1");
        for i in 0..5 {
            store.save_message(&id, Role::User, &format!("m{i}")).unwrap();
        }

        let recent = store.recent(&id, 2).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
        assert_eq!(store.recent(&id, 10).unwrap().len(), 5);
    }

    #[test]
    fn unknown_session_has_empty_history() {
        let store = HistoryStore::in_memory().unwrap();
        assert!(store.history(&SessionId::from("nope")).unwrap().is_empty());
        assert!(!store.session_exists(&SessionId::from("nope")).unwrap());
    }

    #[test]
    fn cleanup_removes_only_inactive_sessions() {
        let store = HistoryStore::in_memory().unwrap();
        let old = SessionId::from("old");
        let live = SessionId::from("live");
        store.save_message(&old, Role::User, "hello").unwrap();
        store.save_message(&live, Role::User, "hello").unwrap();

        let long_ago = timestamp(Utc::now() - Duration::days(45));
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE sessions SET last_activity = ?1 WHERE id = 'old'",
                [long_ago],
            )
            .unwrap();

        assert_eq!(store.cleanup_expired(30).unwrap(), 1);
        assert!(!store.session_exists(&old).unwrap());
        assert!(store.history(&old).unwrap().is_empty());
        assert_eq!(store.history(&live).unwrap().len(), 1);
        assert_eq!(store.cleanup_expired(30).unwrap(), 0);
    }
}
