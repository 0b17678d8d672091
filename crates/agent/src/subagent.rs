//! Delegating tasks to specialist sub-agents.
//!
//! A sub-agent is a nested [`AgentLoop`] with its own instructions, no memory
//! and only the gateway tools its config allows. The model reaches every
//! sub-agent through a single `delegate_task` tool, and several delegations
//! in one response run side by side.

use crate::loop_runner::AgentLoop;
use crate::request::InvocationRequest;
use crate::stream_event::AgentStreamEvent;
use crate::tool_source::ToolSource;
use async_trait::async_trait;
use memoria_config::SubAgentConfig;
use memoria_core::error::{Error, ToolError};
use memoria_core::tool::{Tool, ToolRegistry, ToolResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

pub const DELEGATE_TOOL: &str = "delegate_task";

/// True when `name` is one of `allowed`, or a gateway tool
/// `<target>___<entry>` for one of them.
pub fn tool_allowed(name: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| {
        name == entry
            || name
                .strip_suffix(entry.as_str())
                .is_some_and(|head| head.ends_with("___"))
    })
}

/// Offers `delegate_task` for the sub-agents whose tools are present.
///
/// Reads the registry filled by the sources before it, so it must be added
/// after the gateway source.
pub struct SubAgentSource {
    worker: AgentLoop,
    agents: Vec<SubAgentConfig>,
}

impl SubAgentSource {
    /// `worker` is the loop every sub-agent turn starts from. It should carry
    /// the gateway source and neither memory nor this source.
    pub fn new(worker: AgentLoop, agents: Vec<SubAgentConfig>) -> Self {
        Self { worker, agents }
    }
}

#[async_trait]
impl ToolSource for SubAgentSource {
    fn name(&self) -> &str {
        "subagents"
    }

    async fn load(&self, registry: &mut ToolRegistry) -> Result<usize, Error> {
        let available: Vec<SubAgentConfig> = {
            let names = registry.names();
            self.agents
                .iter()
                .filter(|agent| names.iter().any(|name| tool_allowed(name, &agent.tools)))
                .cloned()
                .collect()
        };
        if available.is_empty() {
            debug!("No sub-agent has a usable tool this turn");
            return Ok(0);
        }
        registry.register(Box::new(DelegateTool::new(self.worker.clone(), available)));
        Ok(1)
    }
}

struct DelegateTool {
    worker: AgentLoop,
    agents: Vec<SubAgentConfig>,
    description: String,
}

impl DelegateTool {
    fn new(worker: AgentLoop, agents: Vec<SubAgentConfig>) -> Self {
        let mut description = String::from(
            "Hand a self-contained task to a specialist sub-agent and get its answer back. \
             When a request holds independent tasks, call this once per task in the same \
             response so they run in parallel.\nAgents:\n",
        );
        for agent in &agents {
            description.push_str(&format!("- {}: {}\n", agent.name, agent.description));
        }
        Self {
            worker,
            agents,
            description,
        }
    }
}

#[derive(Deserialize)]
struct DelegateArgs {
    agent: String,
    task: String,
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        DELEGATE_TOOL
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let names: Vec<&str> = self.agents.iter().map(|a| a.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "agent": {"type": "string", "enum": names},
                "task": {"type": "string", "description": "Everything the sub-agent needs to do the task"}
            },
            "required": ["agent", "task"]
        })
    }

    async fn execute(&self, call_id: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: DelegateArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.task.trim().is_empty() {
            return Err(ToolError::InvalidArguments("task must not be empty".into()));
        }
        let spec = self
            .agents
            .iter()
            .find(|a| a.name == args.agent)
            .ok_or_else(|| ToolError::InvalidArguments(format!("unknown sub-agent '{}'", args.agent)))?;

        info!(agent = %spec.name, "Delegating task");
        let mut worker = self
            .worker
            .clone()
            .with_system_prompt(spec.prompt.clone())
            .with_tool_filter(spec.tools.clone());
        if let Some(model) = &spec.model {
            worker = worker.with_model(model.clone());
        }

        let events = worker.run_to_end(InvocationRequest::new(args.task)).await;
        match events.into_iter().last() {
            Some(AgentStreamEvent::Final { response, .. }) => Ok(ToolResult {
                call_id: call_id.to_string(),
                success: true,
                output: response,
            }),
            Some(AgentStreamEvent::Error { message }) => Err(ToolError::ExecutionFailed {
                tool_name: spec.name.clone(),
                reason: message,
            }),
            _ => Err(ToolError::ExecutionFailed {
                tool_name: spec.name.clone(),
                reason: "sub-agent ended without a response".into(),
            }),
        }
    }
}
