//! In-memory memory service, useful for local runs, demos and tests.
//!
//! Turns are kept per `(actor, session)`. Long-term records are never
//! extracted here; they are inserted directly or loaded from a seed file,
//! and searched with a simple keyword-overlap score.

use async_trait::async_trait;
use memoria_core::error::RetrievalError;
use memoria_core::memory::{
    ConversationalMessage, MemoryRecord, MemoryService, RecordContent, Turn, TurnMessage,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type SessionKey = (String, String);

pub struct InMemoryMemoryService {
    turns: Arc<RwLock<HashMap<SessionKey, Vec<Turn>>>>,
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            turns: Arc::new(RwLock::new(HashMap::new())),
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Create a service preloaded from a JSON array of records in the
    /// memory store's wire format.
    pub async fn from_seed_file(path: &Path) -> Result<Self, RetrievalError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Service(format!("failed to read seed file {}: {e}", path.display()))
        })?;
        let records: Vec<MemoryRecord> = serde_json::from_str(&content).map_err(|e| {
            RetrievalError::Service(format!("invalid seed file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), count = records.len(), "Loaded memory seed");
        Ok(Self::with_records(records))
    }

    pub async fn insert_record(&self, record: MemoryRecord) {
        self.records.write().await.push(record);
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

fn in_namespace(record: &MemoryRecord, prefix: &str) -> bool {
    record.namespaces.iter().any(|ns| ns.starts_with(prefix))
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fraction of query keywords present in `text`, in `[0, 1]`.
fn overlap_score(query: &HashSet<String>, text: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let words = keywords(text);
    let hits = query.iter().filter(|w| words.contains(*w)).count();
    hits as f64 / query.len() as f64
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_last_k_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, RetrievalError> {
        let turns = self.turns.read().await;
        let key = (actor_id.to_string(), session_id.to_string());
        let Some(session) = turns.get(&key) else {
            return Ok(Vec::new());
        };
        let start = session.len().saturating_sub(k);
        Ok(session[start..].to_vec())
    }

    async fn list_long_term_memory_records(
        &self,
        namespace_prefix: &str,
        max_results: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| in_namespace(r, namespace_prefix))
            .take(max_results)
            .cloned()
            .collect())
    }

    async fn search_long_term_memories(
        &self,
        query: &str,
        namespace_prefix: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        let query_words = keywords(query);
        let records = self.records.read().await;

        let mut hits: Vec<MemoryRecord> = records
            .iter()
            .filter(|r| in_namespace(r, namespace_prefix))
            .filter_map(|r| {
                let score = overlap_score(&query_words, r.text());
                (score > 0.0).then(|| MemoryRecord {
                    score: Some(score),
                    ..r.clone()
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.effective_score()
                .partial_cmp(&a.effective_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn add_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        messages: Vec<ConversationalMessage>,
    ) -> Result<(), RetrievalError> {
        let turn: Turn = messages
            .into_iter()
            .map(|m| TurnMessage {
                role: m.role.as_str().to_string(),
                content: RecordContent { text: m.text },
            })
            .collect();

        self.turns
            .write()
            .await
            .entry((actor_id.to_string(), session_id.to_string()))
            .or_default()
            .push(turn);
        Ok(())
    }
}
