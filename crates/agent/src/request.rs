//! The payload of one invocation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub prompt: String,

    #[serde(default)]
    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: String::new(),
            actor_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// `actor_id`, else the session id, else `"default"`.
    pub fn actor_id(&self) -> &str {
        match &self.actor_id {
            Some(actor) => actor,
            None if !self.session_id.is_empty() => &self.session_id,
            None => "default",
        }
    }
}
