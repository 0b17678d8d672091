//! End-to-end integration tests for Memoria.
//!
//! These tests build the agent from configuration the same way `memoria
//! serve` and `memoria invoke` do, and drive full turns through memory
//! recall, the MCP tool gateway and the invocation server.

use std::sync::{Arc, Mutex};

use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
use http_body_util::BodyExt;
use memoria_agent::{AgentStreamEvent, InvocationRequest, build_agent_with_provider};
use memoria_config::AppConfig;
use memoria_core::error::ProviderError;
use memoria_core::message::{Message, MessageToolCall, Role};
use memoria_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use serde_json::{Value, json};
use tower::ServiceExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and keeps
/// every request it saw.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(mut responses: Vec<ProviderResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "ScriptedProvider exhausted".into(),
            })
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut response = text_response(thought);
    response.message.tool_calls = tool_calls;
    response
}

fn make_tool_call(name: &str, args: Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

fn no_queries() -> ProviderResponse {
    text_response(r#"{"queries": []}"#)
}

fn memoryless_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.memory.backend = "none".into();
    config
}

// ── Mock tool gateway ────────────────────────────────────────────────────

async fn token_handler() -> Json<Value> {
    Json(json!({"access_token": "e2e-token", "expires_in": 3600, "token_type": "Bearer"}))
}

async fn mcp_handler(headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer e2e-token") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let id = body["id"].clone();
    let result = match body["method"].as_str() {
        Some("initialize") => json!({"serverInfo": {"name": "e2e-gateway"}}),
        Some("notifications/initialized") => return Ok(Json(Value::Null)),
        Some("tools/list") => json!({
            "tools": [{
                "name": "calc___add",
                "description": "Add two integers",
                "inputSchema": {"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}
            }]
        }),
        Some("tools/call") => {
            let a = body["params"]["arguments"]["a"].as_i64().unwrap_or(0);
            let b = body["params"]["arguments"]["b"].as_i64().unwrap_or(0);
            json!({"content": [{"type": "text", "text": (a + b).to_string()}], "isError": false})
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    Ok(Json(json!({"jsonrpc": "2.0", "id": id, "result": result})))
}

/// Serve a token endpoint and an MCP endpoint; returns the base URL.
async fn spawn_tool_gateway() -> String {
    let app = Router::new()
        .route("/token", post(token_handler))
        .route("/mcp", post(mcp_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── E2E: memory across turns ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_memory_recall_across_turns() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("seed.json");
    std::fs::write(
        &seed,
        serde_json::to_string(&json!([
            {
                "memoryRecordId": "fact-1",
                "memoryStrategyId": "prefs_semantic-1",
                "content": {"text": "User likes green tea"},
                "namespaces": ["/strategies/prefs_semantic-1/actors/alice"]
            },
            {
                "memoryRecordId": "ep-1",
                "memoryStrategyId": "journal_episodic-1",
                "content": {"text": "{\"title\": \"Green tea\", \"use_cases\": \"Brewing green tea for the user\", \"hints\": \"80C water\"}"},
                "namespaces": ["/strategies/journal_episodic-1/actors/alice"]
            }
        ]))
        .unwrap(),
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.memory.seed_file = Some(seed);

    let provider = Arc::new(ScriptedProvider::new(vec![
        no_queries(),
        text_response("Steep it at 80C for two minutes."),
        text_response(r#"{"queries": ["tea temperature"]}"#),
        text_response("You asked how to brew green tea."),
    ]));
    let agent = build_agent_with_provider(&config, provider.clone())
        .await
        .unwrap();

    let first = agent
        .run_to_end(
            InvocationRequest::new("brew green tea")
                .with_session("s1")
                .with_actor("alice"),
        )
        .await;
    assert_eq!(
        first.last(),
        Some(&AgentStreamEvent::Final {
            response: "Steep it at 80C for two minutes.".into(),
            session_id: "s1".into()
        })
    );

    // The first turn already sees long-term facts and episodes
    let requests = provider.requests();
    let first_system = &requests[1].messages[0].content;
    assert!(first_system.contains("## RELEVANT MEMORIES (Facts about user):\n- User likes green tea\n"));
    assert!(first_system.contains("- [Insight] Green tea: Brewing green tea for the user (Hint: 80C water)"));
    assert!(!first_system.contains("## CONVERSATION HISTORY"));

    agent
        .run_to_end(
            InvocationRequest::new("what did I ask about tea?")
                .with_session("s1")
                .with_actor("alice"),
        )
        .await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 4);
    let second_system = &requests[3].messages[0].content;
    assert!(second_system.contains(
        "## CONVERSATION HISTORY:\nUser: brew green tea\nAssistant: Steep it at 80C for two minutes.\n"
    ));
    let history_at = second_system.find("## CONVERSATION HISTORY").unwrap();
    let rules_at = second_system.find("RULES:").unwrap();
    assert!(history_at < rules_at);
}

// ── E2E: gateway tools ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_tool_invocation() {
    let base = spawn_tool_gateway().await;
    let config = gateway_config(&base);

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            vec![make_tool_call("calc___add", json!({"a": 2, "b": 3}))],
            "Let me add those.",
        ),
        text_response("2 + 3 = 5"),
    ]));
    let agent = build_agent_with_provider(&config, provider.clone())
        .await
        .unwrap();

    let events = agent
        .run_to_end(InvocationRequest::new("what is 2 + 3?").with_session("s1"))
        .await;

    let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["text", "tool_use", "text", "final"]);
    assert_eq!(
        events[1],
        AgentStreamEvent::ToolUse {
            tool_name: "calc___add".into(),
            tool_input: json!({"a": 2, "b": 3}),
            session_id: "s1".into()
        }
    );

    let requests = provider.requests();
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "calc___add");
    assert!(requests[0].messages[0].content.contains("Use the available tools"));

    let tool_msg = requests[1].messages.last().unwrap();
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.content, "5");
}

fn gateway_config(base: &str) -> AppConfig {
    let mut config = memoryless_config();
    config.tool_gateway.url = Some(format!("{base}/mcp"));
    config.tool_gateway.token_endpoint = Some(format!("{base}/token"));
    config.tool_gateway.client_id = Some("e2e-client".into());
    config.tool_gateway.client_secret = Some("e2e-secret".into());
    config
}

#[tokio::test]
async fn e2e_subagent_delegation_uses_gateway_tools() {
    let base = spawn_tool_gateway().await;
    let mut config = gateway_config(&base);
    config.agent.subagents = vec![memoria_config::SubAgentConfig {
        name: "calculator".into(),
        description: "Does arithmetic".into(),
        prompt: "You only do arithmetic.".into(),
        tools: vec!["add".into()],
        model: None,
    }];

    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_response(
            vec![make_tool_call(
                "delegate_task",
                json!({"agent": "calculator", "task": "add 2 and 3"}),
            )],
            "Delegating.",
        ),
        tool_response(
            vec![make_tool_call("calc___add", json!({"a": 2, "b": 3}))],
            "",
        ),
        text_response("5"),
        text_response("2 + 3 = 5"),
    ]));
    let agent = build_agent_with_provider(&config, provider.clone())
        .await
        .unwrap();

    let events = agent
        .run_to_end(InvocationRequest::new("add 2 and 3 for me"))
        .await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["text", "tool_use", "text", "final"]);

    let requests = provider.requests();
    assert_eq!(requests.len(), 4);
    let main_tools: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(main_tools, vec!["calc___add", "delegate_task"]);

    // the nested turn sees its own instructions and only its allowed tools
    assert!(requests[1].messages[0].content.starts_with("You only do arithmetic."));
    let sub_tools: Vec<&str> = requests[1].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(sub_tools, vec!["calc___add"]);
    assert_eq!(requests[2].messages.last().unwrap().content, "5");

    let delegated = requests[3].messages.last().unwrap();
    assert_eq!(delegated.role, Role::Tool);
    assert_eq!(delegated.content, "5");
}

#[tokio::test]
async fn e2e_unreachable_gateway_degrades_to_no_tools() {
    let mut config = memoryless_config();
    config.tool_gateway.url = Some("http://127.0.0.1:9/mcp".into());
    config.tool_gateway.token_endpoint = Some("http://127.0.0.1:9/token".into());
    config.tool_gateway.client_id = Some("id".into());
    config.tool_gateway.client_secret = Some("secret".into());

    let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hi!")]));
    let agent = build_agent_with_provider(&config, provider.clone())
        .await
        .unwrap();

    let events = agent.run_to_end(InvocationRequest::new("hello")).await;
    assert!(matches!(events.last(), Some(AgentStreamEvent::Final { .. })));
    assert!(provider.requests()[0].tools.is_empty());
}

// ── E2E: invocation server ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_invocation_server_streams_sse() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hello from Memoria")]));
    let agent = build_agent_with_provider(&memoryless_config(), provider)
        .await
        .unwrap();
    let app = memoria_gateway::build_router(Arc::new(memoria_gateway::GatewayState { agent }));

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/invocations")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            r#"{"prompt": "hi", "session_id": "abc", "actor_id": "alice"}"#,
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let frames: Vec<Value> = body
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["type"], "text");
    assert_eq!(frames[1]["type"], "final");
    assert_eq!(frames[1]["response"], "Hello from Memoria");
    assert_eq!(frames[1]["session_id"], "abc");
}
