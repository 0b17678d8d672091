//! Wiring an [`AgentLoop`] from configuration.

use crate::loop_runner::AgentLoop;
use crate::subagent::SubAgentSource;
use crate::tool_source::{GatewaySource, ToolSource};
use memoria_config::AppConfig;
use memoria_core::error::Error;
use memoria_core::memory::MemoryService;
use memoria_core::provider::Provider;
use memoria_memory::{InMemoryMemoryService, MemoryPipeline, PipelineSettings};
use memoria_providers::anthropic::AnthropicProvider;
use memoria_tools::{ClientCredentials, ClientCredentialsExchange, McpGateway, TokenCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the agent with the Anthropic provider.
pub async fn build_agent(config: &AppConfig) -> Result<AgentLoop, Error> {
    let api_key = config.api_key.clone().ok_or_else(|| Error::Config {
        message: "No API key configured. Set MEMORIA_API_KEY or api_key in config.toml".into(),
    })?;
    let mut provider = AnthropicProvider::new(api_key);
    if let Some(url) = &config.api_url {
        provider = provider.with_base_url(url.clone());
    }
    build_agent_with_provider(config, Arc::new(provider)).await
}

/// Build the agent around an already constructed provider.
pub async fn build_agent_with_provider(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<AgentLoop, Error> {
    let base = AgentLoop::new(provider, config.model.clone(), config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_max_iterations(config.agent.max_iterations);
    let mut agent = base.clone();

    if let Some(preamble) = &config.agent.system_prompt_override {
        agent = agent.with_system_prompt(preamble.clone());
    }

    if let Some(pipeline) = build_memory(config).await? {
        info!(backend = pipeline.service_name(), "Memory enabled");
        agent = agent.with_memory(Arc::new(pipeline));
    } else {
        info!("Memory disabled");
    }

    if let Some(gateway) = build_gateway(config) {
        info!("Tool gateway enabled");
        let source: Arc<dyn ToolSource> = Arc::new(GatewaySource::new(Arc::new(gateway)));
        agent = agent.with_tool_source(source.clone());

        if !config.agent.subagents.is_empty() {
            info!(count = config.agent.subagents.len(), "Sub-agents enabled");
            let worker = base.with_tool_source(source);
            agent = agent.with_tool_source(Arc::new(SubAgentSource::new(
                worker,
                config.agent.subagents.clone(),
            )));
        }
    }

    Ok(agent)
}

/// `None` when the backend is `"none"`.
pub async fn build_memory(config: &AppConfig) -> Result<Option<MemoryPipeline>, Error> {
    let memory = &config.memory;
    let service: Arc<dyn MemoryService> = match memory.backend.as_str() {
        "none" => return Ok(None),
        "in_memory" => match &memory.seed_file {
            Some(path) => {
                let service = InMemoryMemoryService::from_seed_file(path).await?;
                info!(
                    path = %path.display(),
                    records = service.record_count().await,
                    "Seeded memory records"
                );
                Arc::new(service)
            }
            None => Arc::new(InMemoryMemoryService::new()),
        },
        other => {
            return Err(Error::Config {
                message: format!("Unknown memory backend: {other}"),
            });
        }
    };

    let settings = PipelineSettings {
        stm_turns: memory.stm_turns,
        ltm_top_k: memory.ltm_top_k,
        request_timeout: Duration::from_secs(memory.request_timeout_secs),
        episodic: memory.episodic.clone(),
    };
    Ok(Some(MemoryPipeline::new(service, settings)))
}

fn build_gateway(config: &AppConfig) -> Option<McpGateway> {
    let gw = &config.tool_gateway;
    if !gw.is_configured() {
        return None;
    }
    let credentials = ClientCredentials {
        token_endpoint: gw.token_endpoint.clone()?,
        client_id: gw.client_id.clone()?,
        client_secret: gw.client_secret.clone()?,
    };
    let tokens = TokenCache::new(Arc::new(ClientCredentialsExchange::new(credentials)));
    Some(McpGateway::new(gw.url.clone()?, Arc::new(tokens)))
}
