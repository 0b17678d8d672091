//! MCP tool gateway client.
//!
//! Speaks JSON-RPC 2.0 over HTTP POST (MCP streamable HTTP transport) with a
//! bearer token from [`TokenCache`]. Every remote tool is exposed to the agent
//! as a [`GatewayTool`] proxy.

use crate::auth::TokenCache;
use async_trait::async_trait;
use memoria_core::error::{Error, ToolError};
use memoria_core::tool::{Tool, ToolRegistry, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<RemoteToolSpec>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    is_error: bool,
}

/// Output of one remote tool call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub text: String,
    pub is_error: bool,
}

/// Upper bound on `tools/list` pages followed in one listing.
const MAX_LIST_PAGES: usize = 50;

/// The shared half of the gateway client: HTTP client, token cache and
/// request ids. MCP sessions are opened per turn with [`connect`](Self::connect).
pub struct McpGateway {
    url: String,
    client: reqwest::Client,
    tokens: Arc<TokenCache>,
    next_id: AtomicU64,
}

impl McpGateway {
    pub fn new(url: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            client,
            tokens,
            next_id: AtomicU64::new(1),
        }
    }

    /// Perform the MCP handshake and return a session bound to the session id
    /// the gateway issued, if any.
    pub async fn connect(self: &Arc<Self>) -> Result<McpSession, Error> {
        let (result, session_id) = self
            .request(
                None,
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "memoria", "version": env!("CARGO_PKG_VERSION")}
                }),
            )
            .await?;
        debug!(
            server = %result["serverInfo"],
            session_id = session_id.as_deref().unwrap_or(""),
            "MCP gateway initialized"
        );
        self.notify(session_id.as_deref(), "notifications/initialized")
            .await?;
        Ok(McpSession {
            gateway: self.clone(),
            session_id,
        })
    }

    /// One JSON-RPC call. Returns the `result` and the session id header of
    /// the response.
    async fn request(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<(Value, Option<String>), Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let response = self.post(session, &body).await?;

        let issued_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_sse = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::Unavailable(e.to_string()))?;

        let envelope: Value = if is_sse {
            sse_payload(&text, id)
                .ok_or_else(|| ToolError::Unavailable(format!("no response to {method} in event stream")))?
        } else {
            serde_json::from_str(&text)?
        };

        if let Some(err) = envelope.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown error");
            return Err(ToolError::ExecutionFailed {
                tool_name: method.to_string(),
                reason: format!("JSON-RPC error {}: {message}", err["code"]),
            }
            .into());
        }

        let result = envelope.get("result").cloned().unwrap_or(Value::Null);
        Ok((result, issued_session))
    }

    async fn notify(&self, session: Option<&str>, method: &str) -> Result<(), Error> {
        let body = json!({"jsonrpc": "2.0", "method": method});
        self.post(session, &body).await?;
        Ok(())
    }

    async fn post(&self, session: Option<&str>, body: &Value) -> Result<reqwest::Response, Error> {
        let token = self.tokens.get_token().await?;

        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::Unavailable(format!("gateway returned {status}: {text}")).into());
        }
        Ok(response)
    }
}

/// One initialized MCP session. Every request made through it carries the
/// session id from its own handshake.
pub struct McpSession {
    gateway: Arc<McpGateway>,
    session_id: Option<String>,
}

impl McpSession {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// All tools the gateway offers, following pagination cursors. Stops at a
    /// repeated cursor or after [`MAX_LIST_PAGES`] pages.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, Error> {
        let mut tools = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({"cursor": c}),
                None => json!({}),
            };
            let (result, _) = self
                .gateway
                .request(self.session_id(), "tools/list", params)
                .await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        warn!(cursor = %next, "Gateway repeated a pagination cursor, stopping");
                        return Ok(tools);
                    }
                    cursor = Some(next);
                }
                _ => return Ok(tools),
            }
        }

        warn!(pages = MAX_LIST_PAGES, "Stopped listing gateway tools at the page limit");
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallOutcome, ToolError> {
        let (result, _) = self
            .gateway
            .request(
                self.session_id(),
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            )
            .await
            .map_err(|e| match e {
                Error::Tool(t) => t,
                other => ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let parsed: CallToolResult =
            serde_json::from_value(result).map_err(|e| ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("malformed tools/call result: {e}"),
            })?;

        let text = parsed
            .content
            .iter()
            .filter_map(|block| match block["type"].as_str() {
                Some("text") => block["text"].as_str().map(str::to_string),
                _ => Some(block.to_string()),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CallOutcome {
            text,
            is_error: parsed.is_error,
        })
    }
}

/// Find the JSON-RPC response with `id` among the `data:` lines of an SSE body.
fn sse_payload(body: &str, id: u64) -> Option<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|msg| msg["id"].as_u64() == Some(id))
}

/// A remote gateway tool registered in the local [`ToolRegistry`].
pub struct GatewayTool {
    spec: RemoteToolSpec,
    session: Arc<McpSession>,
}

impl GatewayTool {
    pub fn new(spec: RemoteToolSpec, session: Arc<McpSession>) -> Self {
        Self { spec, session }
    }
}

#[async_trait]
impl Tool for GatewayTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.input_schema.clone()
    }

    async fn execute(&self, call_id: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        let outcome = self.session.call_tool(&self.spec.name, arguments).await?;
        if outcome.is_error {
            warn!(tool = %self.spec.name, "Gateway tool reported an error");
        }
        Ok(ToolResult {
            call_id: call_id.to_string(),
            success: !outcome.is_error,
            output: outcome.text,
        })
    }
}

/// Open a fresh session, list its tools and register every one of them.
/// Returns how many tools were registered.
pub async fn register_gateway_tools(
    gateway: &Arc<McpGateway>,
    registry: &mut ToolRegistry,
) -> Result<usize, Error> {
    let session = Arc::new(gateway.connect().await?);
    let specs = session.list_tools().await?;
    let count = specs.len();
    for spec in specs {
        registry.register(Box::new(GatewayTool::new(spec, session.clone())));
    }
    info!(count, "Registered gateway tools");
    Ok(count)
}
