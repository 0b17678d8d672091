//! Configuration loading, validation, and management for Memoria.
//!
//! Loads configuration from `~/.memoria/config.toml` (or the file named by
//! `MEMORIA_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use memoria_core::memory::EpisodicConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the Anthropic API base URL (proxies, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model used for both the agent loop and query expansion
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response in the agent loop
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub tool_gateway: ToolGatewayConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub agent: AgentSettings,
}

fn default_model() -> String {
    "claude-haiku-4-5-20251001".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("memory", &self.memory)
            .field("tool_gateway", &self.tool_gateway)
            .field("server", &self.server)
            .field("agent", &self.agent)
            .finish()
    }
}

/// Memory service and recall tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Which memory service to use: "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Identifier of the managed memory store. Reserved for a managed-service
    /// client; the `in_memory` backend ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,

    /// Region of the managed memory store. Reserved like `memory_id`.
    #[serde(default = "default_region")]
    pub region: String,

    /// JSON file of records to preload into the in-memory service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<PathBuf>,

    /// Conversation turns pulled into the history block
    #[serde(default = "default_stm_turns")]
    pub stm_turns: usize,

    /// Results requested from the semantic fact search
    #[serde(default = "default_ltm_top_k")]
    pub ltm_top_k: usize,

    /// Hard timeout applied to every memory service call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub episodic: EpisodicConfig,
}

fn default_memory_backend() -> String {
    "in_memory".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_stm_turns() -> usize {
    10
}
fn default_ltm_top_k() -> usize {
    5
}
fn default_request_timeout_secs() -> u64 {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            memory_id: None,
            region: default_region(),
            seed_file: None,
            stm_turns: default_stm_turns(),
            ltm_top_k: default_ltm_top_k(),
            request_timeout_secs: default_request_timeout_secs(),
            episodic: EpisodicConfig::default(),
        }
    }
}

/// Remote MCP tool gateway and the OAuth2 client used to reach it.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ToolGatewayConfig {
    /// MCP endpoint of the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// OAuth2 token endpoint for the client-credentials exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for ToolGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGatewayConfig")
            .field("url", &self.url)
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

impl ToolGatewayConfig {
    /// True when every field needed to reach the gateway is present.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
            && self.token_endpoint.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum model round trips per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Replaces the built-in instructions that precede the memory context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Specialists the agent can hand tasks to. Only offered when the tool
    /// gateway is configured.
    #[serde(default = "default_subagents")]
    pub subagents: Vec<SubAgentConfig>,
}

/// A sub-agent: its own instructions and a restricted view of the gateway tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentConfig {
    pub name: String,

    /// Shown to the delegating model so it can pick the right specialist
    pub description: String,

    /// System instructions for the sub-agent's own turn
    pub prompt: String,

    /// Gateway tool names the sub-agent may use. An entry matches a tool
    /// with exactly that name or one ending in `___<entry>`.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Model for the sub-agent; the main model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_max_iterations() -> u32 {
    25
}

fn default_subagents() -> Vec<SubAgentConfig> {
    vec![
        SubAgentConfig {
            name: "web-researcher".into(),
            description: "Looks up current information on the web: prices, news, weather.".into(),
            prompt: "You research questions on the web. Search, read the relevant pages, \
                     extract exactly the data asked for and report it briefly with its source."
                .into(),
            tools: vec!["search_web".into(), "scrape_page".into()],
            model: None,
        },
        SubAgentConfig {
            name: "code-executor".into(),
            description: "Writes and runs Python for calculations and data processing.".into(),
            prompt: "You solve computational tasks by writing short Python programs and \
                     running them with the code interpreter. Return the results clearly."
                .into(),
            tools: vec!["execute_code".into()],
            model: None,
        },
    ]
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt_override: None,
            subagents: default_subagents(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `MEMORIA_CONFIG` or `~/.memoria/config.toml`,
    /// then apply environment overrides:
    /// - `MEMORIA_API_KEY`, then `ANTHROPIC_API_KEY`
    /// - `MEMORIA_MODEL`
    /// - `MEMORIA_MEMORY_ID`
    /// - `MEMORIA_REGION`, then `AWS_REGION`
    /// - `MEMORIA_GATEWAY_CLIENT_SECRET`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("MEMORIA_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("MEMORIA_MODEL") {
            self.model = model;
        }
        if let Some(memory_id) = lookup("MEMORIA_MEMORY_ID") {
            self.memory.memory_id = Some(memory_id);
        }
        if let Some(region) = lookup("MEMORIA_REGION").or_else(|| lookup("AWS_REGION")) {
            self.memory.region = region;
        }
        if let Some(secret) = lookup("MEMORIA_GATEWAY_CLIENT_SECRET") {
            self.tool_gateway.client_secret = Some(secret);
        }
    }

    /// The file [`load`](Self::load) reads.
    pub fn config_path() -> PathBuf {
        Self::config_path_from(|key| std::env::var(key).ok())
    }

    /// `MEMORIA_CONFIG` when set and non-empty, else `~/.memoria/config.toml`.
    pub fn config_path_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
        lookup("MEMORIA_CONFIG")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"))
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memoria")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let episodic = &self.memory.episodic;
        if episodic.max_results_per_namespace == 0 || episodic.total_max_results == 0 {
            return Err(ConfigError::ValidationError(
                "episodic result caps must be > 0".into(),
            ));
        }
        if episodic.min_relevance_score < 0.0 {
            return Err(ConfigError::ValidationError(
                "episodic.min_relevance_score must be >= 0".into(),
            ));
        }

        if self.memory.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "memory.request_timeout_secs must be > 0".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "in_memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}'",
                self.memory.backend
            )));
        }

        let mut names = std::collections::HashSet::new();
        for agent in &self.agent.subagents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent.subagents entries need a name".into(),
                ));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate sub-agent '{}'",
                    agent.name
                )));
            }
            if agent.tools.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "sub-agent '{}' has no tools",
                    agent.name
                )));
            }
        }

        if self.tool_gateway.url.is_some() && self.tool_gateway.token_endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "tool_gateway.url is set but tool_gateway.token_endpoint is missing".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            memory: MemoryConfig::default(),
            tool_gateway: ToolGatewayConfig::default(),
            server: ServerConfig::default(),
            agent: AgentSettings::default(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
