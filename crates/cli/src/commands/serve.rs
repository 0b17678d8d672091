//! `memoria serve`: start the HTTP invocation server.

use memoria_config::AppConfig;

pub async fn run(
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(host) = host_override {
        config.server.host = host;
    }

    eprintln!("Memoria invocation server");
    eprintln!("   Listening: {}:{}", config.server.host, config.server.port);
    eprintln!("   Model:     {}", config.model);
    eprintln!("   Memory:    {}", config.memory.backend);
    eprintln!(
        "   Tools:     {}",
        if config.tool_gateway.is_configured() {
            "gateway"
        } else {
            "none"
        }
    );

    memoria_gateway::start(config).await?;

    Ok(())
}
