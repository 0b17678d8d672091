//! Runtime discovery of memory strategy ids.
//!
//! The memory store tags every long-term record with the id of the strategy
//! that extracted it. Ids are not configured; the locator lists records under
//! the root namespace and picks the first id containing the strategy's kind.

use crate::namespace::Namespace;
use memoria_core::memory::MemoryService;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Opaque identifier of a long-term memory strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategyId(String);

impl StrategyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StrategyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StrategyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Semantic,
    Episodic,
}

impl StrategyKind {
    /// Case-insensitive substring identifying this kind inside a strategy id.
    pub fn needle(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Episodic => "episodic",
        }
    }

    /// How many root records to inspect when looking for this kind.
    pub fn listing_limit(&self) -> usize {
        match self {
            Self::Semantic => 30,
            Self::Episodic => 20,
        }
    }

    fn matches(&self, strategy_id: &str) -> bool {
        strategy_id.to_lowercase().contains(self.needle())
    }
}

/// Finds strategy ids and remembers the ones it found.
///
/// Only hits are cached. A miss is retried on the next lookup, since the
/// store may not have extracted any records yet. Two concurrent first
/// lookups may both list; the second insert is a no-op overwrite.
pub struct StrategyLocator {
    service: Arc<dyn MemoryService>,
    cache: RwLock<HashMap<StrategyKind, StrategyId>>,
}

impl StrategyLocator {
    pub fn new(service: Arc<dyn MemoryService>) -> Self {
        Self {
            service,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the strategy id for `kind`, or `None` when the feature is
    /// unavailable. Listing failures are logged and reported as `None`.
    pub async fn find(&self, kind: StrategyKind) -> Option<StrategyId> {
        if let Some(id) = self.cached(kind) {
            return Some(id);
        }

        let records = match self
            .service
            .list_long_term_memory_records(Namespace::root().as_str(), kind.listing_limit())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(kind = kind.needle(), error = %e, "Failed to list records for strategy discovery");
                return None;
            }
        };

        let found = records
            .iter()
            .find(|r| kind.matches(&r.memory_strategy_id))
            .map(|r| StrategyId::from(r.memory_strategy_id.as_str()));

        match &found {
            Some(id) => {
                debug!(kind = kind.needle(), strategy_id = %id, "Discovered memory strategy");
                self.cache
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(kind, id.clone());
            }
            None => debug!(kind = kind.needle(), scanned = records.len(), "No memory strategy found"),
        }
        found
    }

    fn cached(&self, kind: StrategyKind) -> Option<StrategyId> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockMemoryService, record};

    #[tokio::test]
    async fn finds_first_matching_strategy_case_insensitively() {
        let service = Arc::new(MockMemoryService::new().with_listing(vec![
            record("r1", "summary-abc", "x", 0.0),
            record("r2", "UserFacts_SEMANTIC-1", "y", 0.0),
            record("r3", "semantic-2", "z", 0.0),
        ]));
        let locator = StrategyLocator::new(service.clone());

        let id = locator.find(StrategyKind::Semantic).await.unwrap();
        assert_eq!(id.as_str(), "UserFacts_SEMANTIC-1");
        assert_eq!(
            service.calls(),
            vec![Call::List {
                namespace: "/".into(),
                max_results: 30
            }]
        );
    }

    #[tokio::test]
    async fn episodic_listing_uses_smaller_limit() {
        let service = Arc::new(MockMemoryService::new());
        let locator = StrategyLocator::new(service.clone());

        assert!(locator.find(StrategyKind::Episodic).await.is_none());
        assert_eq!(
            service.calls(),
            vec![Call::List {
                namespace: "/".into(),
                max_results: 20
            }]
        );
    }

    #[tokio::test]
    async fn hits_are_cached_misses_are_not() {
        let service = Arc::new(
            MockMemoryService::new().with_listing(vec![record("r1", "episodic-7", "x", 0.0)]),
        );
        let locator = StrategyLocator::new(service.clone());

        locator.find(StrategyKind::Episodic).await.unwrap();
        locator.find(StrategyKind::Episodic).await.unwrap();
        assert_eq!(service.list_count(), 1);

        assert!(locator.find(StrategyKind::Semantic).await.is_none());
        assert!(locator.find(StrategyKind::Semantic).await.is_none());
        assert_eq!(service.list_count(), 3);
    }

    #[tokio::test]
    async fn listing_failure_yields_none() {
        let service = Arc::new(MockMemoryService::new().failing("list"));
        let locator = StrategyLocator::new(service);
        assert!(locator.find(StrategyKind::Semantic).await.is_none());
    }
}
