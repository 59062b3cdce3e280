//! Message history for a single orchestration run.

use storage::{MessageRecord, Role};

use crate::model::{Message, ToolCall};

/// Ordered messages sent to the model during one run.
///
/// Always starts with a system message. Only the orchestrator appends to
/// it once seeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Build `[system, ...history, user]`.
    ///
    /// System messages inside `history` are dropped.
    pub fn seed(
        system: impl Into<String>,
        history: impl IntoIterator<Item = Message>,
        user: impl Into<String>,
    ) -> Self {
        let mut messages = vec![Message::system(system)];
        messages.extend(
            history
                .into_iter()
                .filter(|m| !matches!(m, Message::System { .. })),
        );
        messages.push(Message::user(user));
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub(crate) fn push_tool_calls(&mut self, calls: Vec<ToolCall>) {
        self.messages.push(Message::tool_calls(calls));
    }

    pub(crate) fn push_tool_result(&mut self, tool_call_id: &str, content: String) {
        self.messages.push(Message::tool_result(tool_call_id, content));
    }
}

impl From<&MessageRecord> for Message {
    fn from(record: &MessageRecord) -> Self {
        match record.role {
            Role::User => Message::user(record.content.clone()),
            Role::Assistant => Message::assistant(record.content.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_wraps_history() {
        let history = vec![
            Message::system("stale"),
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
        ];
        let transcript = Transcript::seed("sys", history, "What is EARS notation?");

        let roles: Vec<_> = transcript.messages().iter().map(Message::role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(transcript.messages()[0].content(), Some("sys"));
        assert_eq!(transcript.last().and_then(Message::content), Some("What is EARS notation?"));
    }

    #[test]
    fn records_map_to_messages() {
        let record = MessageRecord {
            role: Role::Assistant,
            content: "EARS is ...".into(),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(Message::from(&record), Message::assistant("EARS is ..."));
    }
}
