//! Where a turn's tools come from.

use async_trait::async_trait;
use memoria_core::error::Error;
use memoria_core::tool::ToolRegistry;
use memoria_tools::{McpGateway, register_gateway_tools};
use std::sync::Arc;

/// Fills a fresh registry at the start of every turn.
#[async_trait]
pub trait ToolSource: Send + Sync {
    fn name(&self) -> &str;

    /// Register this source's tools and return how many were added.
    async fn load(&self, registry: &mut ToolRegistry) -> Result<usize, Error>;
}

/// Tools discovered from the MCP gateway.
pub struct GatewaySource {
    gateway: Arc<McpGateway>,
}

impl GatewaySource {
    pub fn new(gateway: Arc<McpGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ToolSource for GatewaySource {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn load(&self, registry: &mut ToolRegistry) -> Result<usize, Error> {
        register_gateway_tools(&self.gateway, registry).await
    }
}
