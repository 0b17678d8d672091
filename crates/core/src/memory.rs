//! Memory service trait and the records it returns.
//!
//! The memory service is an external, managed store with two faces:
//! - short-term memory: raw conversation turns per `(actor, session)`
//! - long-term memory: extracted records (facts, reflections, patterns),
//!   each tagged with the strategy that produced it and the namespaces it
//!   lives under, searchable by similarity
//!
//! Memoria never creates long-term records itself; it only lists and
//! searches them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// The text payload of a record or of a turn message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordContent {
    #[serde(default)]
    pub text: String,
}

/// A long-term memory record as returned by the memory service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    #[serde(default)]
    pub memory_record_id: String,

    #[serde(default)]
    pub memory_strategy_id: String,

    #[serde(default)]
    pub content: RecordContent,

    /// Similarity score set by search operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Older name of `score`, still returned by some service versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
}

impl MemoryRecord {
    /// `score`, else `relevanceScore`, else 0.
    pub fn effective_score(&self) -> f64 {
        self.score.or(self.relevance_score).unwrap_or(0.0)
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }
}

/// One message inside a stored conversation turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMessage {
    /// Free-form role string as stored by the service ("user", "ASSISTANT", ...)
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub content: RecordContent,
}

/// A stored conversation turn: every message exchanged in one round trip.
pub type Turn = Vec<TurnMessage>;

/// Role of a message written back with `add_turns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }
}

/// A message appended to short-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationalMessage {
    pub text: String,
    pub role: MessageRole,
}

impl ConversationalMessage {
    pub fn new(text: impl Into<String>, role: MessageRole) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }
}

/// Tuning for episodic recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicConfig {
    /// `top_k` for each namespace search
    #[serde(default = "default_max_results_per_namespace")]
    pub max_results_per_namespace: usize,

    /// Cap on unique episodic records across all searches
    #[serde(default = "default_total_max_results")]
    pub total_max_results: usize,

    /// Records scoring below this are dropped
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f64,

    /// Character budget of the rendered episodic block
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_max_results_per_namespace() -> usize {
    3
}
fn default_total_max_results() -> usize {
    6
}
fn default_min_relevance_score() -> f64 {
    0.3
}
fn default_max_context_chars() -> usize {
    2000
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            max_results_per_namespace: default_max_results_per_namespace(),
            total_max_results: default_total_max_results(),
            min_relevance_score: default_min_relevance_score(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

/// The external memory service.
///
/// Implementations: the in-process `InMemoryMemoryService` (local runs and
/// tests) and any client for a managed store.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// The `k` most recent turns of a session, oldest first.
    async fn get_last_k_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> std::result::Result<Vec<Turn>, RetrievalError>;

    /// List long-term records under a namespace prefix, in service order.
    async fn list_long_term_memory_records(
        &self,
        namespace_prefix: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<MemoryRecord>, RetrievalError>;

    /// Similarity search under a namespace prefix, best match first.
    async fn search_long_term_memories(
        &self,
        query: &str,
        namespace_prefix: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<MemoryRecord>, RetrievalError>;

    /// Append messages to a session's short-term memory as one turn.
    async fn add_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        messages: Vec<ConversationalMessage>,
    ) -> std::result::Result<(), RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_service_json() {
        let json = r#"{
            "memoryRecordId": "mem-1",
            "memoryStrategyId": "episodic_builtin-abc",
            "content": {"text": "{\"title\": \"t\"}"},
            "score": 0.82,
            "namespaces": ["/strategies/episodic_builtin-abc/actors/alice"]
        }"#;
        let rec: MemoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.memory_record_id, "mem-1");
        assert_eq!(rec.namespaces.len(), 1);
        assert!((rec.effective_score() - 0.82).abs() < f64::EPSILON);
    }

    #[test]
    fn effective_score_falls_back_to_legacy_field() {
        let rec: MemoryRecord =
            serde_json::from_str(r#"{"memoryRecordId": "a", "relevanceScore": 0.4}"#).unwrap();
        assert!((rec.effective_score() - 0.4).abs() < f64::EPSILON);

        let bare: MemoryRecord = serde_json::from_str(r#"{"memoryRecordId": "b"}"#).unwrap();
        assert_eq!(bare.effective_score(), 0.0);
        assert_eq!(bare.text(), "");
    }

    #[test]
    fn score_wins_over_legacy_field() {
        let rec: MemoryRecord =
            serde_json::from_str(r#"{"score": 0.9, "relevanceScore": 0.1}"#).unwrap();
        assert!((rec.effective_score() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn episodic_config_defaults() {
        let cfg = EpisodicConfig::default();
        assert_eq!(cfg.max_results_per_namespace, 3);
        assert_eq!(cfg.total_max_results, 6);
        assert!((cfg.min_relevance_score - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.max_context_chars, 2000);
    }

    #[test]
    fn message_role_serializes_uppercase() {
        let msg = ConversationalMessage::new("hi", MessageRole::User);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"USER""#));
        assert_eq!(MessageRole::Assistant.as_str(), "ASSISTANT");
    }
}
