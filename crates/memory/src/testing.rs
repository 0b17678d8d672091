//! Scripted memory service for stage tests.

use async_trait::async_trait;
use memoria_core::error::RetrievalError;
use memoria_core::memory::{
    ConversationalMessage, MemoryRecord, MemoryService, RecordContent, Turn,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Turns { actor: String, session: String, k: usize },
    List { namespace: String, max_results: usize },
    Search { query: String, namespace: String, top_k: usize },
    AddTurns { actor: String, session: String, messages: Vec<ConversationalMessage> },
}

#[derive(Default)]
pub(crate) struct MockMemoryService {
    turns: Vec<Turn>,
    listing: Vec<MemoryRecord>,
    search: HashMap<String, Vec<MemoryRecord>>,
    failing: HashSet<&'static str>,
    failing_namespaces: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl MockMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = turns;
        self
    }

    pub fn with_listing(mut self, records: Vec<MemoryRecord>) -> Self {
        self.listing = records;
        self
    }

    /// Results returned for any query under exactly `namespace`.
    pub fn with_search(mut self, namespace: &str, records: Vec<MemoryRecord>) -> Self {
        self.search.insert(namespace.to_string(), records);
        self
    }

    /// Make one operation ("turns", "list", "search", "add") fail.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn failing_namespace(mut self, namespace: &str) -> Self {
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search { query, namespace, .. } => Some((query, namespace)),
                _ => None,
            })
            .collect()
    }

    pub fn list_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::List { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<(), RetrievalError> {
        if self.failing.contains(operation) {
            Err(RetrievalError::Service(format!("{operation} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MemoryService for MockMemoryService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_last_k_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, RetrievalError> {
        self.record(Call::Turns {
            actor: actor_id.into(),
            session: session_id.into(),
            k,
        });
        self.check("turns")?;
        Ok(self.turns.clone())
    }

    async fn list_long_term_memory_records(
        &self,
        namespace_prefix: &str,
        max_results: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        self.record(Call::List {
            namespace: namespace_prefix.into(),
            max_results,
        });
        self.check("list")?;
        Ok(self.listing.iter().take(max_results).cloned().collect())
    }

    async fn search_long_term_memories(
        &self,
        query: &str,
        namespace_prefix: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        self.record(Call::Search {
            query: query.into(),
            namespace: namespace_prefix.into(),
            top_k,
        });
        self.check("search")?;
        if self.failing_namespaces.contains(namespace_prefix) {
            return Err(RetrievalError::Service(format!(
                "search failed for {namespace_prefix}"
            )));
        }
        Ok(self
            .search
            .get(namespace_prefix)
            .map(|records| records.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }

    async fn add_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        messages: Vec<ConversationalMessage>,
    ) -> Result<(), RetrievalError> {
        self.record(Call::AddTurns {
            actor: actor_id.into(),
            session: session_id.into(),
            messages,
        });
        self.check("add")
    }
}

pub(crate) fn record(id: &str, strategy: &str, text: &str, score: f64) -> MemoryRecord {
    MemoryRecord {
        memory_record_id: id.into(),
        memory_strategy_id: strategy.into(),
        content: RecordContent { text: text.into() },
        score: Some(score),
        relevance_score: None,
        namespaces: Vec::new(),
    }
}
