//! Per-request timeout around a memory service.

use async_trait::async_trait;
use memoria_core::error::RetrievalError;
use memoria_core::memory::{ConversationalMessage, MemoryRecord, MemoryService, Turn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps every call of the inner service in `tokio::time::timeout`.
/// An elapsed call becomes `RetrievalError::Timeout`.
pub struct TimeoutMemoryService {
    inner: Arc<dyn MemoryService>,
    timeout: Duration,
}

impl TimeoutMemoryService {
    pub fn new(inner: Arc<dyn MemoryService>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, RetrievalError>>,
    ) -> Result<T, RetrievalError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RetrievalError::Timeout {
                operation,
                timeout_secs: self.timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl MemoryService for TimeoutMemoryService {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_last_k_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<Turn>, RetrievalError> {
        self.bounded(
            "get_last_k_turns",
            self.inner.get_last_k_turns(actor_id, session_id, k),
        )
        .await
    }

    async fn list_long_term_memory_records(
        &self,
        namespace_prefix: &str,
        max_results: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        self.bounded(
            "list_long_term_memory_records",
            self.inner
                .list_long_term_memory_records(namespace_prefix, max_results),
        )
        .await
    }

    async fn search_long_term_memories(
        &self,
        query: &str,
        namespace_prefix: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, RetrievalError> {
        self.bounded(
            "search_long_term_memories",
            self.inner
                .search_long_term_memories(query, namespace_prefix, top_k),
        )
        .await
    }

    async fn add_turns(
        &self,
        actor_id: &str,
        session_id: &str,
        messages: Vec<ConversationalMessage>,
    ) -> Result<(), RetrievalError> {
        self.bounded(
            "add_turns",
            self.inner.add_turns(actor_id, session_id, messages),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMemoryService;

    struct StalledService;

    #[async_trait]
    impl MemoryService for StalledService {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn get_last_k_turns(
            &self,
            _actor_id: &str,
            _session_id: &str,
            _k: usize,
        ) -> Result<Vec<Turn>, RetrievalError> {
            std::future::pending().await
        }
        async fn list_long_term_memory_records(
            &self,
            _namespace_prefix: &str,
            _max_results: usize,
        ) -> Result<Vec<MemoryRecord>, RetrievalError> {
            std::future::pending().await
        }
        async fn search_long_term_memories(
            &self,
            _query: &str,
            _namespace_prefix: &str,
            _top_k: usize,
        ) -> Result<Vec<MemoryRecord>, RetrievalError> {
            std::future::pending().await
        }
        async fn add_turns(
            &self,
            _actor_id: &str,
            _session_id: &str,
            _messages: Vec<ConversationalMessage>,
        ) -> Result<(), RetrievalError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out() {
        let service = TimeoutMemoryService::new(Arc::new(StalledService), Duration::from_secs(20));
        let err = service
            .search_long_term_memories("q", "/", 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Timeout {
                operation: "search_long_term_memories",
                timeout_secs: 20
            }
        ));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let inner = Arc::new(MockMemoryService::new());
        let service = TimeoutMemoryService::new(inner.clone(), Duration::from_secs(5));
        assert!(service.get_last_k_turns("a", "s", 10).await.unwrap().is_empty());
        assert_eq!(service.name(), "mock");
        assert_eq!(inner.calls().len(), 1);
    }
}
