//! Long-term memory: user facts extracted by the semantic strategy.

use crate::block::{BlockKind, ContextBlock};
use crate::namespace::Namespace;
use crate::strategy::{StrategyKind, StrategyLocator};
use memoria_core::error::RetrievalError;
use memoria_core::memory::{MemoryRecord, MemoryService};
use tracing::debug;

const HEADER: &str = "\n## RELEVANT MEMORIES (Facts about user):\n";

/// Search the actor's fact namespace for `query` and render the hits.
///
/// Falls back to `/users/{actor}/facts` when no semantic strategy exists.
pub async fn fetch_ltm(
    service: &dyn MemoryService,
    locator: &StrategyLocator,
    actor_id: &str,
    query: &str,
    top_k: usize,
) -> Result<ContextBlock, RetrievalError> {
    let namespace = match locator.find(StrategyKind::Semantic).await {
        Some(id) => Namespace::actor(&id, actor_id),
        None => Namespace::legacy_facts(actor_id),
    };
    debug!(namespace = %namespace, "Searching long-term facts");

    let records = service
        .search_long_term_memories(query, namespace.as_str(), top_k)
        .await?;
    Ok(ContextBlock::new(BlockKind::LongTerm, format_facts(&records)))
}

/// One `- {text}` line per record with text and a non-negative score.
pub fn format_facts(records: &[MemoryRecord]) -> String {
    let lines: Vec<String> = records
        .iter()
        .filter(|r| !r.text().is_empty() && r.effective_score() >= 0.0)
        .map(|r| format!("- {}", r.text()))
        .collect();

    if lines.is_empty() {
        return String::new();
    }
    format!("{HEADER}{}\n", lines.join("\n"))
}
