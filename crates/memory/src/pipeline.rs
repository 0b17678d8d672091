//! The recall pipeline: one memory service, one strategy locator, and the
//! tuning that every stage reads.

use crate::block::ContextBlock;
use crate::strategy::StrategyLocator;
use crate::timeout::TimeoutMemoryService;
use crate::{episodic, ltm, stm, store};
use memoria_core::error::RetrievalError;
use memoria_core::memory::{EpisodicConfig, MemoryService};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub stm_turns: usize,
    pub ltm_top_k: usize,
    pub request_timeout: Duration,
    pub episodic: EpisodicConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stm_turns: 10,
            ltm_top_k: 5,
            request_timeout: Duration::from_secs(20),
            episodic: EpisodicConfig::default(),
        }
    }
}

/// Shared across turns. The strategy cache lives as long as the pipeline.
pub struct MemoryPipeline {
    service: Arc<dyn MemoryService>,
    locator: StrategyLocator,
    settings: PipelineSettings,
}

impl MemoryPipeline {
    /// Wraps `service` so every call is bounded by `settings.request_timeout`.
    pub fn new(service: Arc<dyn MemoryService>, settings: PipelineSettings) -> Self {
        let service: Arc<dyn MemoryService> = Arc::new(TimeoutMemoryService::new(
            service,
            settings.request_timeout,
        ));
        Self {
            locator: StrategyLocator::new(service.clone()),
            service,
            settings,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn short_term(
        &self,
        actor_id: &str,
        session_id: &str,
    ) -> Result<ContextBlock, RetrievalError> {
        stm::fetch_stm(
            self.service.as_ref(),
            actor_id,
            session_id,
            self.settings.stm_turns,
        )
        .await
    }

    pub async fn long_term(
        &self,
        actor_id: &str,
        query: &str,
    ) -> Result<ContextBlock, RetrievalError> {
        ltm::fetch_ltm(
            self.service.as_ref(),
            &self.locator,
            actor_id,
            query,
            self.settings.ltm_top_k,
        )
        .await
    }

    pub async fn episodic(
        &self,
        actor_id: &str,
        session_id: &str,
        queries: &[String],
    ) -> Result<ContextBlock, RetrievalError> {
        episodic::fetch_episodic(
            self.service.as_ref(),
            &self.locator,
            actor_id,
            session_id,
            queries,
            &self.settings.episodic,
        )
        .await
    }

    pub async fn store_turn(
        &self,
        actor_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), RetrievalError> {
        store::store_turn(
            self.service.as_ref(),
            actor_id,
            session_id,
            user_text,
            assistant_text,
        )
        .await
    }
}
