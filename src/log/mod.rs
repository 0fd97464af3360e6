pub mod structured_console_encoder;

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, anyhow};
use log::{debug, info};
use log4rs::config::{Deserializers, RawConfig};

use crate::log::structured_console_encoder::StructuredConsoleEncoderDeserializer;

const DEFAULT_CONFIG_FILE: &str = "log4rs.yml";
const EMBEDDED_CONFIG: &str = include_str!("../../resources/default_log4rs.yml");

/// Log keys whose values are masked unless `REVEAL_SECRETS` is set.
const SECRET_KEYS: [&str; 5] = ["password", "auth", "authorization", "proxy", "ssl_key"];

/// Initializes logging.
///
/// The configuration file is taken from `APILINK_LOG_CONFIG`, then `log4rs.yml` in the
/// working directory. When neither exists the embedded defaults are used.
pub fn init_logging() -> anyhow::Result<()> {
    if let Some(path) = external_config_path() {
        log4rs::init_file(&path, deserializers())
            .with_context(|| format!("Failed to load logging configuration from {}", path.display()))?;
        info!(path:% = path.display(); "Logging initialized from external configuration");
        return Ok(());
    }

    log4rs::init_config(embedded_config()?).context("Failed to initialize logging from embedded config")?;
    debug!("Logging initialized from embedded defaults");
    Ok(())
}

fn deserializers() -> Deserializers {
    let mut deserializers = Deserializers::default();
    deserializers.insert("structured_console", StructuredConsoleEncoderDeserializer);
    deserializers
}

fn external_config_path() -> Option<PathBuf> {
    std::env::var_os("APILINK_LOG_CONFIG")
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)))
        .filter(|path| Path::new(path).exists())
}

fn embedded_config() -> anyhow::Result<log4rs::Config> {
    let raw: RawConfig = serde_yaml::from_str(EMBEDDED_CONFIG).context("Embedded logging configuration is invalid")?;

    let (appenders, errors) = raw.appenders_lossy(&deserializers());
    if !errors.is_empty() {
        return Err(anyhow!("Errors parsing embedded appenders: {errors:?}"));
    }

    log4rs::Config::builder()
        .appenders(appenders)
        .loggers(raw.loggers())
        .build(raw.root())
        .context("Failed to build logging config")
}

fn reveal_secrets() -> bool {
    static REVEAL_SECRETS: OnceLock<bool> = OnceLock::new();

    *REVEAL_SECRETS.get_or_init(|| {
        std::env::var("REVEAL_SECRETS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false)
    })
}

/// Returns whether values logged under `key` carry credentials.
pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|secret| key.eq_ignore_ascii_case(secret))
}

/// Masks a credential, keeping an authorization scheme such as `Bearer`.
/// If REVEAL_SECRETS is true, returns the original string.
pub fn mask_secret(s: &str) -> String {
    if reveal_secrets() {
        return s.to_string();
    }

    match s.split_once(' ') {
        Some((scheme, _)) if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic()) => {
            format!("{scheme} ***")
        },
        _ => "***".to_string(),
    }
}
