mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use streamforge_av::VideoCodec;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./streamforge.toml",
        "~/.config/streamforge/config.toml",
        "/etc/streamforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.streaming.monitor_interval_ms == 0 {
        anyhow::bail!("Streaming monitor interval cannot be 0");
    }

    if let Some(codec) = &config.transcode.hardware_codec {
        let parsed: VideoCodec = codec
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid transcode.hardware_codec: {}", e))?;
        if !parsed.is_hardware() {
            anyhow::bail!("transcode.hardware_codec '{}' is not a hardware encoder", codec);
        }
    }

    for path in &config.library.paths {
        if !path.exists() {
            tracing::warn!("Library path does not exist: {:?}", path);
        }
    }

    Ok(())
}
