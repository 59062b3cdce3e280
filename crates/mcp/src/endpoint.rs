//! Connection to a remote tool endpoint over streamable HTTP.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation,
};
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{Error, Result, ToolDescriptor, ToolOutput};

/// Default timeout for the handshake and for each tool call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for reaching a tool endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Streamable HTTP URL, e.g. `http://localhost:8001/mcp`.
    pub url: String,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

struct Connection {
    service: RunningService<RoleClient, ClientInfo>,
    tools: Vec<ToolDescriptor>,
    url: String,
}

/// Client side of a tool endpoint session.
///
/// Holds at most one live connection. Tool calls share the connection
/// through a read lock; connect, refresh and disconnect take the write
/// lock, so a reconnect never interleaves with an in-flight call.
pub struct ToolEndpoint {
    inner: RwLock<Option<Connection>>,
    timeout: Duration,
}

impl Default for ToolEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolEndpoint {
    /// Create a disconnected endpoint.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: RwLock::new(None),
            timeout,
        }
    }

    /// Create an endpoint and connect it using `config`.
    pub async fn open(config: &EndpointConfig) -> Result<Self> {
        let endpoint = Self::with_timeout(config.timeout);
        endpoint.connect(&config.url, &config.headers).await?;
        Ok(endpoint)
    }

    /// Open a session, perform the handshake and fetch the tool catalog.
    ///
    /// Replaces any existing connection. On failure the endpoint is left
    /// disconnected.
    pub async fn connect(&self, url: &str, headers: &HashMap<String, String>) -> Result<()> {
        let mut guard = self.inner.write().await;
        if let Some(old) = guard.take() {
            debug!(url = %old.url, "replacing existing tool endpoint connection");
            shutdown(old).await;
        }

        info!(url, "connecting to tool endpoint");
        let connection = tokio::time::timeout(self.timeout, establish(url, headers))
            .await
            .map_err(|_| Error::ConnectionFailure(format!("timed out connecting to {url}")))??;

        info!(url, tools = connection.tools.len(), "connected to tool endpoint");
        *guard = Some(connection);
        Ok(())
    }

    /// Whether a session is currently open.
    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Tool catalog fetched at connect time. Empty when disconnected.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|c| c.tools.clone())
            .unwrap_or_default()
    }

    /// Re-fetch the tool catalog from the endpoint.
    pub async fn refresh_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut guard = self.inner.write().await;
        let connection = guard.as_mut().ok_or(Error::NotConnected)?;
        connection.tools = fetch_tools(&connection.service).await?;
        debug!(tools = connection.tools.len(), "refreshed tool catalog");
        Ok(connection.tools.clone())
    }

    /// Invoke a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolOutput> {
        let guard = self.inner.read().await;
        let connection = guard.as_ref().ok_or(Error::NotConnected)?;

        debug!(tool = name, "calling tool");
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: Some(arguments),
            task: None,
        };

        let result = tokio::time::timeout(self.timeout, connection.service.call_tool(params))
            .await
            .map_err(|_| Error::ToolExecutionFailure(format!("tool {name} timed out")))?
            .map_err(|e| Error::ToolExecutionFailure(e.to_string()))?;

        let output = ToolOutput::from(result);
        if output.is_error {
            warn!(tool = name, "tool reported an error result");
        }
        Ok(output)
    }

    /// Close the session if one is open. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        if let Some(connection) = self.inner.write().await.take() {
            info!(url = %connection.url, "disconnecting from tool endpoint");
            shutdown(connection).await;
        }
    }
}

async fn establish(url: &str, headers: &HashMap<String, String>) -> Result<Connection> {
    let client = reqwest::Client::builder()
        .default_headers(header_map(headers)?)
        .build()
        .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

    let transport = StreamableHttpClientTransport::with_client(
        client,
        StreamableHttpClientTransportConfig::with_uri(url.to_string()),
    );

    let service = client_info()
        .serve(transport)
        .await
        .map_err(|e| Error::ConnectionFailure(e.to_string()))?;

    let tools = match fetch_tools(&service).await {
        Ok(tools) => tools,
        Err(e) => {
            let _ = service.cancel().await;
            return Err(Error::ConnectionFailure(e.to_string()));
        }
    };

    Ok(Connection {
        service,
        tools,
        url: url.to_string(),
    })
}

async fn fetch_tools(service: &RunningService<RoleClient, ClientInfo>) -> Result<Vec<ToolDescriptor>> {
    let listed = service
        .list_tools(Default::default())
        .await
        .map_err(|e| Error::ConnectionFailure(e.to_string()))?;
    Ok(listed.tools.into_iter().map(ToolDescriptor::from).collect())
}

async fn shutdown(connection: Connection) {
    if let Err(e) = connection.service.cancel().await {
        warn!(url = %connection.url, error = %e, "error closing tool endpoint session");
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "requirements-advisor".to_string(),
            title: Some("Requirements Advisor".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = |reason: String| Error::InvalidHeader {
            name: name.clone(),
            reason,
        };
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        map.insert(key, value);
    }
    Ok(map)
}
