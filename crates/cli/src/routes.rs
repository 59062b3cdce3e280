//! API routes for the advisor

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use runtime::{FailureKind, HistoryEntry, TurnRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use storage::{MessageRecord, SessionId};
use tracing::{error, info};

use crate::server::AppState;

type SharedState = Arc<AppState>;

const SESSION_COOKIE: &str = "session_id";
const SESSION_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/chat", post(chat))
        .route("/history/:session_id", get(history))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    mcp_connected: bool,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ToolInfo {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

fn default_provider() -> String {
    "claude".to_string()
}

/// Error body in the `{"detail": ...}` shape the chat UI reads.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        mcp_connected: state.advisor.tools().is_connected().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_tools(State(state): State<SharedState>) -> Result<Json<Vec<ToolInfo>>, ApiError> {
    let tools = state.advisor.tools();
    if !tools.is_connected().await {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "MCP server not connected",
        ));
    }

    let tools = tools
        .list_tools()
        .await
        .into_iter()
        .map(|t| ToolInfo {
            name: t.name,
            description: t.description.unwrap_or_default(),
        })
        .collect();
    Ok(Json(tools))
}

async fn chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let session_id = req
        .session_id
        .filter(|id| !id.is_empty())
        .or_else(|| session_from_cookies(&headers))
        .map(SessionId::from);
    info!(
        provider = %req.provider,
        message_length = req.message.len(),
        history = req.history.len(),
        "chat request"
    );

    let provider = req.provider.clone();
    let outcome = state
        .advisor
        .handle_turn(TurnRequest {
            message: req.message,
            session_id,
            provider: req.provider,
            history: req.history,
        })
        .await
        .map_err(|e| error_response(&e, &provider))?;

    let cookie = session_cookie(&outcome.session_id);
    Ok(([(header::SET_COOKIE, cookie)], Json(outcome)).into_response())
}

async fn history(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    state
        .advisor
        .session_history(SessionId::from(session_id))
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "failed to load history");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a turn failure to a status and a user-facing message.
fn error_response(err: &runtime::Error, provider: &str) -> ApiError {
    match err {
        runtime::Error::UnsupportedProvider { .. } | runtime::Error::Blocked { .. } => {
            info!(error = %err, "chat request rejected");
            ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
        }
        _ => {
            error!(error = %err, provider, "LLM call failed");
            match err.failure_kind() {
                Some(FailureKind::Quota) => ApiError::new(
                    StatusCode::PAYMENT_REQUIRED,
                    format!("API quota exceeded for {provider}. Please check your billing."),
                ),
                Some(FailureKind::RateLimit) => ApiError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("Rate limit exceeded for {provider}. Try again later."),
                ),
                Some(FailureKind::Auth) => ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    format!("Invalid API key for {provider}. Check your configuration."),
                ),
                Some(FailureKind::Other) => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("LLM error: {err}"),
                ),
                None => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            }
        }
    }
}

fn session_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(session_id: &SessionId) -> String {
    format!(
        "{SESSION_COOKIE}={session_id}; Max-Age={SESSION_MAX_AGE_SECS}; Path=/; HttpOnly; Secure; SameSite=Lax"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use runtime::ModelError;

    fn status_of(err: runtime::Error) -> (StatusCode, String) {
        let api = error_response(&err, "openai");
        (api.status, api.detail)
    }

    #[test]
    fn cookie_lookup_finds_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc-123; other=1"),
        );
        assert_eq!(session_from_cookies(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn cookie_lookup_ignores_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_from_cookies(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=; a=b"));
        assert_eq!(session_from_cookies(&headers), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&SessionId::from("s1"));
        assert!(cookie.starts_with("session_id=s1;"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn client_errors_are_bad_request() {
        let (status, detail) = status_of(runtime::Error::UnsupportedProvider {
            key: "x".into(),
            available: vec!["claude".into()],
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail.contains("Unsupported provider: x"));

        let (status, _) = status_of(runtime::Error::Blocked {
            reasons: vec!["no".into()],
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn provider_failures_map_by_kind() {
        let api = |status: u16, body: &str| {
            runtime::Error::Model(ModelError::Api {
                status,
                body: body.into(),
            })
        };

        let (status, detail) = status_of(api(402, ""));
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(detail, "API quota exceeded for openai. Please check your billing.");

        assert_eq!(status_of(api(429, "")).0, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(api(401, "")).0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(api(400, "You exceeded your current quota")).0,
            StatusCode::PAYMENT_REQUIRED
        );

        let (status, detail) = status_of(api(500, "upstream exploded"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail.starts_with("LLM error: "));
    }

    #[test]
    fn missing_credentials_is_unauthorized() {
        let err = runtime::Error::Model(ModelError::MissingCredentials("openai".into()));
        assert_eq!(status_of(err).0, StatusCode::UNAUTHORIZED);
    }
}
