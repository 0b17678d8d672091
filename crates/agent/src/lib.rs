//! The memory-augmented agent loop.
//!
//! One invocation runs as a single turn:
//!
//! 1. **Recall** short-term, long-term and episodic memory for the actor
//! 2. **Build** the system prompt around the recalled context
//! 3. **Call the LLM** with the tools discovered for this turn
//! 4. **If tool calls**: execute them concurrently, append the results in
//!    call order, go back to step 3. Sub-agents are reached the same way,
//!    through the `delegate_task` tool
//! 5. **Store** the user prompt and the assistant's text as a new turn
//!
//! Progress is streamed as [`AgentStreamEvent`]s; the last one is either
//! `final` or `error`.

pub mod context;
pub mod expand;
pub mod loop_runner;
pub mod prompt;
pub mod request;
pub mod setup;
pub mod stream_event;
pub mod subagent;
pub mod tool_source;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextAssembler, MemoryContext};
pub use expand::QueryExpander;
pub use loop_runner::AgentLoop;
pub use request::InvocationRequest;
pub use setup::{build_agent, build_agent_with_provider};
pub use stream_event::AgentStreamEvent;
pub use subagent::SubAgentSource;
pub use tool_source::{GatewaySource, ToolSource};
