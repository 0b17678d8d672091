//! Namespace keys that scope long-term memory searches.

use crate::strategy::StrategyId;
use std::fmt;

/// A hierarchical namespace prefix such as
/// `/strategies/{id}/actors/{actor}/sessions/{session}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// The root namespace, used for strategy discovery.
    pub fn root() -> Self {
        Self("/".into())
    }

    pub fn actor(strategy: &StrategyId, actor_id: &str) -> Self {
        Self(format!("/strategies/{strategy}/actors/{actor_id}"))
    }

    pub fn session(strategy: &StrategyId, actor_id: &str, session_id: &str) -> Self {
        Self(format!(
            "/strategies/{strategy}/actors/{actor_id}/sessions/{session_id}"
        ))
    }

    /// Fact namespace used when no semantic strategy can be discovered.
    pub fn legacy_facts(actor_id: &str) -> Self {
        Self(format!("/users/{actor_id}/facts"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
