//! `memoria config`: configuration management commands.

use memoria_config::AppConfig;
use std::path::Path;

const REDACTED: &str = "[REDACTED]";

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    if write_default_config(&config_path)? {
        println!("Created config.toml at: {}", config_path.display());
        println!("Set MEMORIA_API_KEY or edit the file to add your API key.");
    } else {
        println!("Config already exists at: {}", config_path.display());
    }
    Ok(())
}

/// Write the default config to `path` unless a file is already there.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    if config.tool_gateway.client_secret.is_some() {
        config.tool_gateway.client_secret = Some(REDACTED.into());
    }
    config
}
