//! `memoria invoke`: run a single turn from the command line.

use memoria_agent::{AgentStreamEvent, InvocationRequest};
use memoria_config::AppConfig;

pub async fn run(
    prompt: String,
    session: Option<String>,
    actor: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set MEMORIA_API_KEY (or ANTHROPIC_API_KEY), or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = memoria_agent::build_agent(&config).await?;

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut request = InvocationRequest::new(prompt).with_session(session_id);
    if let Some(actor) = actor {
        request = request.with_actor(actor);
    }

    tracing::debug!(session_id = %request.session_id, actor_id = request.actor_id(), "Invoking agent");
    let mut rx = agent.run(request);
    let mut failed = None;
    while let Some(event) = rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);
        if let AgentStreamEvent::Error { message } = event {
            failed = Some(message);
        }
    }

    match failed {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}
