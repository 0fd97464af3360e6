use std::{fs, fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use config::{Config, Environment};
use log::{debug, info};

use super::ApiConfig;

const ENV_PREFIX: &str = "APILINK";

pub fn get_default_config() -> &'static str {
    include_str!("../../config/api.toml")
}

/// Loads the connection configuration from `path`, overlaid with `APILINK_*`
/// environment variables (`__` separates nested keys).
///
/// A default configuration file is written to `path` first if none exists.
pub fn load_configuration(path: &Path) -> Result<ApiConfig> {
    if !path.exists() {
        write_config_to(path, get_default_config()).context("Could not create default config")?;
        info!(path:% = path.display(); "Created new configuration file");
    }

    let filename = path.to_str().context("Invalid config file path")?;

    let cfg = Config::builder()
        .add_source(config::File::with_name(filename))
        .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"))
        .build()
        .context("Could not build config")?;

    let api_config: ApiConfig = cfg
        .try_deserialize()
        .context("Could not deserialize connection configuration")?;

    debug!(
        path:% = path.display(),
        default = api_config.default.as_str(),
        connections = api_config.connections.len();
        "Loaded connection configuration"
    );

    Ok(api_config)
}

pub fn write_config_to(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directories")?;
    };

    let mut file = File::create(path).context("Failed to create config file")?;
    file.write_all(source.as_bytes())
        .context("Failed to write config content")?;
    file.write_all(b"\n").context("Failed to write newline")?;
    Ok(())
}
