use std::collections::HashMap;
use std::path::{Path, PathBuf};

use kura_common::error::{KuraError, Result};
use serde::Deserialize;

/// Gateway configuration, loaded once at startup and threaded through
/// explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// When set, the whole surface serves the fixed unavailable page.
    #[serde(default)]
    pub maintenance_mode: bool,
    /// Storage root; buckets are its immediate subdirectories.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Access key the credential guard looks for.
    pub access_key: String,
    /// Default tracing filter level; RUST_LOG overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bucket name to retention hours. Files in these buckets are deleted
    /// by `kura sweep` once older than the window; unlisted buckets are
    /// permanent.
    #[serde(default)]
    pub temp_buckets: HashMap<String, u32>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            KuraError::InternalError(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|err| KuraError::InternalError(format!("failed to parse config: {err}")))
    }
}
