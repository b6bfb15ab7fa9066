//! Configuration file and environment overrides.

use std::path::{Path, PathBuf};

use claims_core::ClaimsConfig;
use eyre::WrapErr;
use tracing::info;

/// Env var naming the JSON config file.
pub const CONFIG_VAR: &str = "CLAIMS_CONFIG";
pub const DATA_DIR_VAR: &str = "CLAIMS_DATA_DIR";
pub const AUTOSAVE_VAR: &str = "CLAIMS_AUTOSAVE_SECS";

/// Load the config named by `CLAIMS_CONFIG` (default `claims.json`) and apply
/// environment overrides. A missing file means defaults.
pub fn load() -> eyre::Result<ClaimsConfig> {
    let path = std::env::var(CONFIG_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("claims.json"));

    let mut config = read(&path)?;
    apply_env(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> eyre::Result<ClaimsConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .wrap_err_with(|| format!("invalid config file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No config at {}, using defaults", path.display());
            Ok(ClaimsConfig::default())
        }
        Err(e) => Err(e).wrap_err_with(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env(config: &mut ClaimsConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = var(DATA_DIR_VAR) {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(secs) = var(AUTOSAVE_VAR).and_then(|s| s.parse().ok()) {
        config.auto_save_interval_secs = secs;
    }
}
