//! The agent reasoning loop implementation.

use crate::context::{ContextAssembler, MemoryContext};
use crate::expand::QueryExpander;
use crate::prompt::build_system_prompt;
use crate::request::InvocationRequest;
use crate::stream_event::AgentStreamEvent;
use crate::subagent::tool_allowed;
use crate::tool_source::ToolSource;
use memoria_core::message::Message;
use memoria_core::provider::{Provider, ProviderRequest};
use memoria_core::tool::{ToolCall, ToolRegistry};
use futures::future::join_all;
use memoria_memory::MemoryPipeline;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tool results may hand back a session id for follow-up tool calls.
const SESSION_ID_FIELD: &str = "code_int_session_id";

const NO_RESPONSE: &str = "No response from agent";

/// Orchestrates memory recall, LLM calls and tool execution for one turn at
/// a time. Cheap to clone; every turn runs on its own task.
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn Provider>,

    model: String,

    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Maximum model round trips per turn
    max_iterations: u32,

    memory: Option<Arc<ContextAssembler>>,

    tool_sources: Vec<Arc<dyn ToolSource>>,

    system_prompt_override: Option<String>,

    /// When set, only tools matching one of these entries survive loading
    tool_filter: Option<Arc<[String]>>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: 25,
            memory: None,
            tool_sources: Vec::new(),
            system_prompt_override: None,
            tool_filter: None,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Attach a memory pipeline. Query expansion uses this loop's provider
    /// and model.
    pub fn with_memory(mut self, pipeline: Arc<MemoryPipeline>) -> Self {
        let expander = QueryExpander::new(self.provider.clone(), self.model.clone());
        self.memory = Some(Arc::new(ContextAssembler::new(pipeline, expander)));
        self
    }

    pub fn with_tool_source(mut self, source: Arc<dyn ToolSource>) -> Self {
        self.tool_sources.push(source);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Restrict each turn's tools to names matching `allowed`. An entry
    /// matches a tool with that exact name or one ending in `___<entry>`.
    pub fn with_tool_filter(mut self, allowed: Vec<String>) -> Self {
        self.tool_filter = Some(allowed.into());
        self
    }

    pub fn with_system_prompt(mut self, preamble: impl Into<String>) -> Self {
        self.system_prompt_override = Some(preamble.into());
        self
    }

    /// Start a turn. Events arrive on the returned receiver; the channel
    /// closes after `final` or `error`.
    pub fn run(&self, request: InvocationRequest) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel::<AgentStreamEvent>(128);
        let this = self.clone();
        tokio::spawn(async move {
            this.run_turn(request, tx).await;
        });
        rx
    }

    /// Run a turn to completion and collect every event.
    pub async fn run_to_end(&self, request: InvocationRequest) -> Vec<AgentStreamEvent> {
        let mut rx = self.run(request);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    async fn load_tools(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for source in &self.tool_sources {
            match source.load(&mut registry).await {
                Ok(count) => debug!(source = source.name(), count, "Loaded tools"),
                Err(e) => warn!(
                    source = source.name(),
                    error = %e,
                    "Tool source unavailable, continuing without it"
                ),
            }
        }
        if let Some(allowed) = &self.tool_filter {
            registry.retain(|name| tool_allowed(name, allowed));
        }
        registry
    }

    async fn run_turn(&self, request: InvocationRequest, tx: mpsc::Sender<AgentStreamEvent>) {
        let actor_id = request.actor_id().to_string();
        let mut session_id = request.session_id.clone();
        info!(actor_id = %actor_id, session_id = %session_id, "Processing invocation");

        let context = match &self.memory {
            Some(assembler) => {
                assembler
                    .assemble(&actor_id, &request.session_id, &request.prompt)
                    .await
            }
            None => MemoryContext::default(),
        };

        let tools = self.load_tools().await;
        let tool_definitions = tools.definitions();

        let system_prompt = build_system_prompt(
            self.system_prompt_override.as_deref(),
            &context.render(),
            &session_id,
            !tools.is_empty(),
        );
        let mut messages = vec![
            Message::system(system_prompt),
            Message::user(request.prompt.clone()),
        ];
        let mut texts: Vec<String> = Vec::new();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(
                    iterations = self.max_iterations,
                    "Max tool iterations reached, ending turn"
                );
                break;
            }
            debug!(iteration, "Agent loop iteration");

            let provider_request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = match self.provider.complete(provider_request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "Provider call failed, aborting turn");
                    let _ = tx
                        .send(AgentStreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let message = response.message;
            if !message.content.is_empty() {
                texts.push(message.content.clone());
                let event = AgentStreamEvent::Text {
                    text: message.content.clone(),
                    session_id: session_id.clone(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            if message.tool_calls.is_empty() {
                break;
            }

            let tool_calls = message.tool_calls.clone();
            messages.push(message);

            let mut calls = Vec::with_capacity(tool_calls.len());
            for tc in &tool_calls {
                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or_default();
                info!(tool = %tc.name, "Tool use");
                let event = AgentStreamEvent::ToolUse {
                    tool_name: tc.name.clone(),
                    tool_input: arguments.clone(),
                    session_id: session_id.clone(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
                calls.push(ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                });
            }

            // calls from one response run concurrently; results keep call order
            let results = join_all(calls.iter().map(|call| tools.execute(call))).await;
            for (call, result) in calls.iter().zip(results) {
                let output = match result {
                    Ok(result) => {
                        if let Some(next) = session_from_tool_output(&result.output) {
                            debug!(session_id = %next, "Tool switched session");
                            session_id = next;
                        }
                        result.output
                    }
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };
                messages.push(Message::tool_result(&call.id, output));
            }
        }

        if let Some(assembler) = &self.memory {
            if !texts.is_empty() {
                if let Err(e) = assembler
                    .pipeline()
                    .store_turn(
                        &actor_id,
                        &request.session_id,
                        &request.prompt,
                        &texts.join("\n"),
                    )
                    .await
                {
                    warn!(error = %e, "Failed to store conversation turn");
                }
            }
        }

        let response = if texts.is_empty() {
            NO_RESPONSE.to_string()
        } else {
            texts.join("\n")
        };
        let _ = tx
            .send(AgentStreamEvent::Final {
                response,
                session_id,
            })
            .await;
    }
}

/// A non-empty `code_int_session_id` from a JSON object tool result.
fn session_from_tool_output(output: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(output).ok()?;
    value
        .get(SESSION_ID_FIELD)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
