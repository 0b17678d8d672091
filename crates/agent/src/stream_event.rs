//! Agent-level streaming events.
//!
//! `AgentStreamEvent` is what one turn yields to its caller; the gateway
//! forwards each event to the client as one SSE frame.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent while a turn runs.
///
/// - `tool_use`: the model is invoking a tool
/// - `text`:     a block of assistant text
/// - `final`:    the turn is complete, always the last event on success
/// - `error`:    the turn failed, no `final` follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    ToolUse {
        tool_name: String,
        tool_input: serde_json::Value,
        session_id: String,
    },

    Text { text: String, session_id: String },

    /// All text blocks joined by newlines, or "No response from agent".
    Final { response: String, session_id: String },

    Error { message: String },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ToolUse { .. } => "tool_use",
            Self::Text { .. } => "text",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }
}
