mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

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

    let default_paths = ["./flvrec.toml", "~/.config/flvrec/config.toml"];

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
    if config.recorder.read_chunk_size == 0 {
        anyhow::bail!("recorder.read_chunk_size cannot be 0");
    }

    if config.processor.clip_window_secs == 0 {
        anyhow::bail!("processor.clip_window_secs cannot be 0");
    }

    if config.processor.event_capacity == 0 {
        anyhow::bail!("processor.event_capacity cannot be 0");
    }

    if config.processor.history_window_secs == Some(0) {
        anyhow::bail!("processor.history_window_secs cannot be 0, omit it to keep all tags");
    }

    if let Some(history) = config.processor.history_window_secs {
        if history < config.processor.clip_window_secs {
            tracing::warn!(
                "History window ({}s) is shorter than the clip window ({}s), clips will be truncated",
                history,
                config.processor.clip_window_secs
            );
        }
    }

    Ok(())
}
