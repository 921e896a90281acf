//! CLI-side configuration: `hivewatch-config` plus `GlobalOpts` overrides.

use std::path::PathBuf;
use std::sync::Arc;

use hivewatch_config::{Config, ConfigError, Settings};
use hivewatch_core::{FileStateStore, StateStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The config file in effect: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(hivewatch_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(hivewatch_config::load_config_from(&config_file(global))?)
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(hivewatch_config::save_config_to(cfg, &config_file(global))?)
}

/// Resolve the active profile into connection settings.
pub fn settings(global: &GlobalOpts, cfg: &Config) -> Result<Settings, CliError> {
    let mut settings =
        hivewatch_config::resolve_settings(cfg, global.profile.as_deref()).map_err(|e| match e {
            ConfigError::UnknownProfile { name } => profile_not_found(cfg, name),
            other => other.into(),
        })?;
    if let Some(ref dir) = global.state_dir {
        settings.state_dir.clone_from(dir);
    }
    Ok(settings)
}

/// State directory for commands that never touch the network. Works
/// without a configured profile.
pub fn state_dir(global: &GlobalOpts, cfg: &Config) -> PathBuf {
    if let Some(ref dir) = global.state_dir {
        return dir.clone();
    }
    let name = cfg.profile_name(global.profile.as_deref());
    cfg.profiles
        .get(name)
        .and_then(|p| p.state_dir.clone())
        .unwrap_or_else(|| hivewatch_config::default_state_dir(name))
}

pub fn open_state(dir: PathBuf) -> Arc<dyn StateStore> {
    tracing::debug!(state_dir = %dir.display(), "opening state store");
    Arc::new(FileStateStore::new(dir))
}

pub fn profile_not_found(cfg: &Config, name: String) -> CliError {
    let available = if cfg.profiles.is_empty() {
        "(none)".to_owned()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    };
    CliError::ProfileNotFound { name, available }
}
