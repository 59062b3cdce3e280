//! One chat turn from user message to persisted answer.

use std::sync::Arc;

use policy::Guardrails;
use serde::{Deserialize, Serialize};
use storage::{HistoryStore, MessageRecord, Role, SessionId};
use tracing::{info, warn};

use crate::invoker::ModelInvoker;
use crate::model::{Backend, Message};
use crate::orchestrator::{DEFAULT_MAX_ITERATIONS, OrchestrationResult, Orchestrator};
use crate::prompts::{REDIRECT_SYSTEM_MESSAGE, SYSTEM_MESSAGE};
use crate::tools::{EmptyToolHost, ToolHost, translate};
use crate::transcript::Transcript;
use crate::{Error, Result};

/// Number of earlier messages carried into a turn by default.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Earlier message supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<HistoryEntry> for Message {
    fn from(entry: HistoryEntry) -> Self {
        match entry.role {
            Role::User => Message::user(entry.content),
            Role::Assistant => Message::assistant(entry.content),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    /// A fresh session is started when absent.
    pub session_id: Option<SessionId>,
    pub provider: String,
    /// When empty, history is read from the store.
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub session_id: SessionId,
    pub tools_used: Vec<String>,
    pub was_redirected: bool,
    pub content_filtered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisorSettings {
    pub max_iterations: usize,
    pub history_window: usize,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Requirements advisor chat service.
///
/// Owns the model invoker, the tool host, the guardrails and the history
/// store. Built once at startup and shared by every request handler.
pub struct Advisor<B, H> {
    invoker: ModelInvoker<B>,
    tools: H,
    guardrails: Guardrails,
    store: Arc<HistoryStore>,
    settings: AdvisorSettings,
}

impl<B: Backend, H: ToolHost> Advisor<B, H> {
    pub fn new(invoker: ModelInvoker<B>, tools: H, guardrails: Guardrails, store: HistoryStore) -> Self {
        Self {
            invoker,
            tools,
            guardrails,
            store: Arc::new(store),
            settings: AdvisorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AdvisorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn invoker(&self) -> &ModelInvoker<B> {
        &self.invoker
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn settings(&self) -> AdvisorSettings {
        self.settings
    }

    /// Full history of a session, oldest first.
    pub async fn session_history(&self, session_id: SessionId) -> Result<Vec<MessageRecord>> {
        self.with_store(move |store| store.history(&session_id)).await
    }

    /// Delete sessions idle for more than `days` days.
    pub async fn cleanup_expired(&self, days: u32) -> Result<usize> {
        self.with_store(move |store| store.cleanup_expired(days)).await
    }

    /// Handle one user message.
    ///
    /// Blocked input fails with [`Error::Blocked`] and is not stored.
    /// Off-topic input is answered with the redirect prompt and no tools.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let session_id = request.session_id.unwrap_or_default();
        let id = session_id.clone();
        self.with_store(move |store| store.get_or_create_session(&id))
            .await?;

        let verdict = self.guardrails.check_input(&request.message);
        if !verdict.allowed {
            warn!(session_id = %session_id, "input blocked by guardrails");
            return Err(Error::Blocked {
                reasons: verdict.reasons,
            });
        }
        let redirect = !verdict.on_topic;

        let history = self.history(&session_id, request.history).await?;
        let result = if redirect {
            info!(session_id = %session_id, "using redirect mode for off-topic query");
            let transcript = Transcript::seed(REDIRECT_SYSTEM_MESSAGE, history, &request.message);
            self.orchestrate(&EmptyToolHost, &request.provider, transcript, false)
                .await?
        } else {
            let transcript = Transcript::seed(SYSTEM_MESSAGE, history, &request.message);
            self.orchestrate(&self.tools, &request.provider, transcript, true)
                .await?
        };

        let output = self.guardrails.check_output(&result.final_text);
        let content_filtered = output.pii_detected || output.toxicity_detected;

        let (id, question, answer) = (session_id.clone(), request.message, output.text.clone());
        self.with_store(move |store| {
            store.save_message(&id, Role::User, &question)?;
            store.save_message(&id, Role::Assistant, &answer)
        })
        .await?;

        Ok(TurnOutcome {
            response: output.text,
            session_id,
            tools_used: result.tools_used,
            was_redirected: redirect,
            content_filtered,
        })
    }

    async fn orchestrate<T: ToolHost>(
        &self,
        host: &T,
        provider: &str,
        transcript: Transcript,
        offer_tools: bool,
    ) -> Result<OrchestrationResult> {
        let schemas = if offer_tools {
            translate(&host.list_tools().await)
        } else {
            Vec::new()
        };
        Orchestrator::new(&self.invoker, host)
            .max_iterations(self.settings.max_iterations)
            .run(provider, transcript, &schemas)
            .await
    }

    /// The last `history_window` messages, from the request or the store.
    async fn history(
        &self,
        session_id: &SessionId,
        supplied: Vec<HistoryEntry>,
    ) -> Result<Vec<Message>> {
        let window = self.settings.history_window;
        if supplied.is_empty() {
            let id = session_id.clone();
            let records = self
                .with_store(move |store| store.recent(&id, window))
                .await?;
            return Ok(records.iter().map(Message::from).collect());
        }
        let skip = supplied.len().saturating_sub(window);
        Ok(supplied.into_iter().skip(skip).map(Message::from).collect())
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&HistoryStore) -> storage::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| Error::Task(e.to_string()))?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelReply;
    use crate::orchestrator::NOT_CONNECTED_RESULT;
    use crate::providers::ProviderRegistry;
    use crate::test_support::{ScriptedBackend, StubToolHost, tool_call, tool_reply};
    use policy::{BLOCKED_INPUT_MESSAGE, GuardrailConfig};

    fn guardrails() -> Guardrails {
        Guardrails::new(&GuardrailConfig {
            valid_topics: vec!["requirements".into(), "EARS".into()],
            invalid_topics: vec!["recipe".into(), "football".into()],
            toxic_terms: vec!["idiot".into()],
            ..GuardrailConfig::default()
        })
        .unwrap()
    }

    fn advisor(backend: ScriptedBackend, host: StubToolHost) -> Advisor<ScriptedBackend, StubToolHost> {
        Advisor::new(
            ModelInvoker::new(ProviderRegistry::default(), backend),
            host,
            guardrails(),
            HistoryStore::in_memory().unwrap(),
        )
    }

    fn request(message: &str) -> TurnRequest {
        TurnRequest {
            message: message.into(),
            session_id: Some(SessionId::from("s1")),
            provider: "claude".into(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn on_topic_turn_offers_tools_and_persists() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_reply(vec![tool_call("a", "search", r#"{"query":"EARS"}"#)])),
            Ok(ModelReply {
                text: Some("EARS is ...".into()),
                tool_calls: vec![],
            }),
        ]);
        let host = StubToolHost::connected().with_tool("search", None);
        let advisor = advisor(backend, host);

        let outcome = advisor
            .handle_turn(request("What is EARS notation for requirements?"))
            .await
            .unwrap();

        assert_eq!(outcome.response, "EARS is ...");
        assert_eq!(outcome.tools_used, ["search"]);
        assert!(!outcome.was_redirected);
        assert!(!outcome.content_filtered);

        let requests = advisor.invoker().backend().requests();
        assert_eq!(requests[0].messages[0].content(), Some(SYSTEM_MESSAGE));
        let tools = requests[0].tools.as_ref().unwrap();
        assert_eq!(tools[0].name, "search");
        assert_eq!(tools[0].description, "");

        let stored = advisor.store().history(&SessionId::from("s1")).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "What is EARS notation for requirements?");
        assert_eq!(stored[1].content, "EARS is ...");
    }

    #[tokio::test]
    async fn off_topic_turn_redirects_without_tools() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_reply(vec![tool_call("a", "search", "{}")])),
            Ok(ModelReply {
                text: Some("I focus on requirements.".into()),
                tool_calls: vec![],
            }),
        ]);
        let host = StubToolHost::connected().with_tool("search", Some("Search"));
        let advisor = advisor(backend, host);

        let outcome = advisor
            .handle_turn(request("Any good pasta recipe?"))
            .await
            .unwrap();

        assert!(outcome.was_redirected);
        assert_eq!(outcome.response, "I focus on requirements.");
        assert!(advisor.tools().calls().is_empty());

        let requests = advisor.invoker().backend().requests();
        assert_eq!(requests[0].messages[0].content(), Some(REDIRECT_SYSTEM_MESSAGE));
        assert!(requests[0].tools.is_none());
        assert_eq!(
            requests[1].messages[3],
            Message::tool_result("a", NOT_CONNECTED_RESULT)
        );
    }

    #[tokio::test]
    async fn toxic_input_is_blocked_and_not_stored() {
        let advisor = advisor(ScriptedBackend::answering("x"), StubToolHost::connected());

        let err = advisor
            .handle_turn(request("you idiot, explain requirements"))
            .await
            .unwrap_err();

        match err {
            Error::Blocked { reasons } => assert_eq!(reasons, [BLOCKED_INPUT_MESSAGE]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(advisor.invoker().backend().call_count(), 0);
        assert!(advisor.store().history(&SessionId::from("s1")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn output_pii_is_redacted() {
        let backend = ScriptedBackend::answering("Contact jane@example.com about requirements.");
        let advisor = advisor(backend, StubToolHost::connected());

        let outcome = advisor
            .handle_turn(request("Who owns the requirements?"))
            .await
            .unwrap();

        assert!(outcome.content_filtered);
        assert_eq!(outcome.response, "Contact <EMAIL_ADDRESS> about requirements.");
        let stored = advisor.store().history(&SessionId::from("s1")).unwrap();
        assert_eq!(stored[1].content, outcome.response);
    }

    #[tokio::test]
    async fn history_window_applies_to_supplied_history() {
        let advisor = advisor(ScriptedBackend::answering("ok"), StubToolHost::connected())
            .with_settings(AdvisorSettings {
                max_iterations: 5,
                history_window: 2,
            });

        let mut turn = request("next requirements question");
        turn.history = (0..5)
            .map(|i| HistoryEntry {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("m{i}"),
            })
            .collect();
        advisor.handle_turn(turn).await.unwrap();

        let messages = &advisor.invoker().backend().requests()[0].messages;
        let contents: Vec<_> = messages.iter().filter_map(Message::content).collect();
        assert_eq!(contents[1..], ["m3", "m4", "next requirements question"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn concurrent_turns_share_the_store() {
        let advisor = Arc::new(advisor(
            ScriptedBackend::answering("ok"),
            StubToolHost::connected(),
        ));

        let turn = |session: &str| {
            let advisor = Arc::clone(&advisor);
            let mut req = request("requirements question");
            req.session_id = Some(SessionId::from(session));
            tokio::spawn(async move { advisor.handle_turn(req).await })
        };
        let (a, b) = tokio::join!(turn("a"), turn("b"));
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        for session in ["a", "b"] {
            let stored = advisor.session_history(SessionId::from(session)).await.unwrap();
            assert_eq!(stored.len(), 2);
        }
        assert_eq!(advisor.cleanup_expired(30).await.unwrap(), 0);
        assert_eq!(advisor.store().list_sessions().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stored_history_is_used_when_none_supplied() {
        let advisor = advisor(ScriptedBackend::answering("second answer"), StubToolHost::connected());
        let session = SessionId::from("s1");
        advisor
            .store()
            .save_message(&session, Role::User, "first requirements question")
            .unwrap();
        advisor
            .store()
            .save_message(&session, Role::Assistant, "first answer")
            .unwrap();

        advisor
            .handle_turn(request("follow-up on requirements"))
            .await
            .unwrap();

        let messages = &advisor.invoker().backend().requests()[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], Message::user("first requirements question"));
        assert_eq!(messages[2], Message::assistant("first answer"));
    }

    #[tokio::test]
    async fn missing_session_id_starts_a_new_session() {
        let advisor = advisor(ScriptedBackend::answering("hi"), StubToolHost::connected());
        let mut turn = request("requirements?");
        turn.session_id = None;

        let outcome = advisor.handle_turn(turn).await.unwrap();
        assert!(advisor.store().session_exists(&outcome.session_id).unwrap());
    }

    #[tokio::test]
    async fn unsupported_provider_is_reported() {
        let advisor = advisor(ScriptedBackend::answering("x"), StubToolHost::connected());
        let mut turn = request("requirements?");
        turn.provider = "mistral".into();

        let err = advisor.handle_turn(turn).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported provider: mistral. Available: claude, openai, gemini"
        );
        assert_eq!(advisor.invoker().backend().call_count(), 0);
    }
}
