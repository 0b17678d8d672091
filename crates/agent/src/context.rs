//! Memory context assembly.
//!
//! Runs the recall stages in a fixed order and concatenates what they return:
//!
//! 1. short-term history of the session
//! 2. long-term facts matching the prompt
//! 3. query expansion (a model call, not a memory read)
//! 4. episodic memories for the expanded queries
//!
//! A stage that fails is logged and contributes nothing. Assembly itself
//! never fails.

use crate::expand::QueryExpander;
use memoria_core::error::RetrievalError;
use memoria_memory::{BlockKind, ContextBlock, MemoryPipeline};
use std::sync::Arc;
use tracing::{info, warn};

/// The assembled memory blocks of one turn, in prompt order.
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    pub blocks: Vec<ContextBlock>,
}

impl MemoryContext {
    pub fn render(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_empty())
    }

    pub fn block(&self, kind: BlockKind) -> Option<&ContextBlock> {
        self.blocks.iter().find(|b| b.kind == kind)
    }
}

pub struct ContextAssembler {
    pipeline: Arc<MemoryPipeline>,
    expander: QueryExpander,
}

impl ContextAssembler {
    pub fn new(pipeline: Arc<MemoryPipeline>, expander: QueryExpander) -> Self {
        Self { pipeline, expander }
    }

    pub fn pipeline(&self) -> &Arc<MemoryPipeline> {
        &self.pipeline
    }

    pub async fn assemble(&self, actor_id: &str, session_id: &str, prompt: &str) -> MemoryContext {
        let stm = degrade(
            BlockKind::ShortTerm,
            self.pipeline.short_term(actor_id, session_id).await,
        );
        let ltm = degrade(
            BlockKind::LongTerm,
            self.pipeline.long_term(actor_id, prompt).await,
        );
        let queries = self.expander.expand(prompt).await;
        let episodic = degrade(
            BlockKind::Episodic,
            self.pipeline.episodic(actor_id, session_id, &queries).await,
        );

        info!(
            stm_chars = stm.char_len(),
            ltm_chars = ltm.char_len(),
            episodic_chars = episodic.char_len(),
            queries = queries.len(),
            "Memory context loaded"
        );

        MemoryContext {
            blocks: [stm, ltm, episodic]
                .into_iter()
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }
}

fn degrade(kind: BlockKind, result: Result<ContextBlock, RetrievalError>) -> ContextBlock {
    result.unwrap_or_else(|e| {
        warn!(stage = kind.as_str(), error = %e, "Memory stage failed, continuing without it");
        ContextBlock::empty(kind)
    })
}
