//! HTTP invocation server for Memoria.
//!
//! - `POST /invocations` runs one agent turn and streams its events as SSE
//! - `GET /ping` is the health check
//!
//! Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use memoria_agent::{AgentLoop, InvocationRequest};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

/// Shared application state for the server.
pub struct GatewayState {
    pub agent: AgentLoop,
}

pub type SharedState = Arc<GatewayState>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the Axum router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/invocations", post(invocations_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the agent from `config` and serve until the process is stopped.
pub async fn start(config: memoria_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let agent = memoria_agent::build_agent(&config).await?;
    let app = build_router(Arc::new(GatewayState { agent }));

    info!(addr = %addr, model = %config.model, "Invocation server starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
}

async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse { status: "Healthy" })
}

/// `POST /invocations`: one turn, streamed as `event: {type}` / `data: {json}`.
async fn invocations_handler(
    State(state): State<SharedState>,
    Json(payload): Json<InvocationRequest>,
) -> Result<
    Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>,
    (StatusCode, Json<ErrorResponse>),
> {
    if payload.prompt.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt must not be empty".into(),
            }),
        ));
    }
    info!(
        prompt_len = payload.prompt.len(),
        session_id = %payload.session_id,
        "Invocation received"
    );

    let rx = state.agent.run(payload);
    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type().to_string();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use memoria_core::error::ProviderError;
    use memoria_core::message::Message;
    use memoria_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use tower::ServiceExt;

    /// Lightweight mock provider for server tests.
    struct MockProvider {
        result: Result<String, ProviderError>,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.result.clone().map(|text| ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    fn app(result: Result<String, ProviderError>) -> Router {
        let provider: Arc<dyn Provider> = Arc::new(MockProvider { result });
        let agent = AgentLoop::new(provider, "mock-model", 0.7);
        build_router(Arc::new(GatewayState { agent }))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn invocation(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/invocations")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn ping_reports_healthy() {
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = app(Ok("unused".into())).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"Healthy"}"#);
    }

    #[tokio::test]
    async fn invocation_streams_text_then_final() {
        let response = app(Ok("Hello there".into()))
            .oneshot(invocation(r#"{"prompt": "hi", "session_id": "s1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );

        let body = body_text(response).await;
        let text_at = body.find("event: text").unwrap();
        let final_at = body.find("event: final").unwrap();
        assert!(text_at < final_at);
        assert!(body.contains(
            r#"data: {"type":"final","response":"Hello there","session_id":"s1"}"#
        ));
    }

    #[tokio::test]
    async fn provider_failure_streams_error_event() {
        let response = app(Err(ProviderError::AuthenticationFailed("bad key".into())))
            .oneshot(invocation(r#"{"prompt": "hi"}"#))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("event: error"));
        assert!(!body.contains("event: final"));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let response = app(Ok("unused".into()))
            .oneshot(invocation(r#"{"prompt": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let response = app(Ok("unused".into()))
            .oneshot(invocation(r#"{"session_id": "s1"}"#))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
