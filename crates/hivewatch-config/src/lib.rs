//! Shared configuration for the hivewatch binaries.
//!
//! TOML profiles, API token resolution (env + keyring + plaintext), and
//! translation into the transport settings the `hivewatch-api` clients
//! take and the `PipelineConfig` that `hivewatch_core::Pipeline` runs on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use hivewatch_api::{ReconnectConfig, TlsMode, TransportConfig};
use hivewatch_core::{MetricBounds, PipelineConfig, ThresholdConfig};

/// Keyring service name under which API tokens are stored.
pub const KEYRING_SERVICE: &str = "hivewatch";

/// Token variable consulted when a profile names no `token_env`.
pub const TOKEN_ENV: &str = "HIVEWATCH_TOKEN";

const ENV_PREFIX: &str = "HIVEWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Initial alert thresholds, `[thresholds.<metric>]` with `min`/`max`.
    /// Thresholds saved in the state directory take precedence.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Named hive-account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            thresholds: ThresholdConfig::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub background_sync: bool,

    /// How often `watch` re-reads the owned-hive directory.
    #[serde(default = "default_directory_refresh")]
    pub directory_refresh_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval_secs: default_poll_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            background_sync: true,
            directory_refresh_secs: default_directory_refresh(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    30
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_directory_refresh() -> u64 {
    300
}

/// A named hive-account profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Sensor API base URL (e.g., "https://api.example.com/v1").
    pub api_url: String,

    /// Realtime feed URL (e.g., "wss://feed.example.com/events").
    pub feed_url: String,

    /// Owner id whose hives are tracked.
    pub owner: String,

    /// API token (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Directory for persisted pipeline state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Path to custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_sync: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_refresh_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_initial_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_max_ms: Option<u64>,

    /// `0` disables reconnection; absent means retry forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_max_retries: Option<u32>,
}

impl Config {
    /// Name of the profile to use: explicit choice, then
    /// `default_profile`, then `"default"`.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    pub fn profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = self.profile_name(requested);
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "hivewatch", "hivewatch")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    for part in parts {
        p.push(part);
    }
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "hivewatch", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location for persisted pipeline state of `profile`.
pub fn default_state_dir(profile: &str) -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "hivewatch", "state", profile]),
        |dirs| dirs.data_dir().join("state").join(profile),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` (if present), then `HIVEWATCH_*` variables.
///
/// Nested keys use a double underscore: `HIVEWATCH_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    validate_thresholds(&config.thresholds)?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or fails to parse.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

fn validate_thresholds(thresholds: &ThresholdConfig) -> Result<(), ConfigError> {
    for (metric, bounds) in thresholds.iter() {
        MetricBounds::new(bounds.min, bounds.max).map_err(|e| ConfigError::Validation {
            field: format!("thresholds.{metric}"),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

fn token_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Store `token` in the OS keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    token_entry(profile_name)?
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the API token: env var, then keyring, then plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_token_with(
        profile,
        profile_name,
        |var| std::env::var(var).ok(),
        |name| token_entry(name).ok()?.get_password().ok(),
    )
}

fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env (or HIVEWATCH_TOKEN) → env var lookup
    let var = profile.token_env.as_deref().unwrap_or(TOKEN_ENV);
    if let Some(val) = env(var).filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(secret) = keyring(profile_name) {
        return Ok(SecretString::from(secret));
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Resolved settings ───────────────────────────────────────────────

/// Everything a binary needs to build the API clients and the pipeline
/// for one profile.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: String,
    pub api_url: Url,
    pub feed_url: Url,
    pub owner: String,
    /// `None` when no token could be resolved; the session is then
    /// unauthenticated.
    pub token: Option<SecretString>,
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
    pub state_dir: PathBuf,
    pub directory_refresh: Duration,
    pub pipeline: PipelineConfig,
}

fn parse_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected {} URL, got '{}'", schemes.join("/"), url.scheme()),
        });
    }
    Ok(url)
}

/// Resolve `requested` (or the default profile) into [`Settings`].
pub fn resolve_settings(cfg: &Config, requested: Option<&str>) -> Result<Settings, ConfigError> {
    let (name, profile) = cfg.profile(requested)?;
    let token = match resolve_token(profile, name) {
        Ok(token) => Some(token),
        Err(ConfigError::NoCredentials { .. }) => None,
        Err(e) => return Err(e),
    };
    build_settings(cfg, name, profile, token)
}

/// Validate profile `name` without resolving its token.
pub fn check_profile(cfg: &Config, name: &str) -> Result<(), ConfigError> {
    let (name, profile) = cfg.profile(Some(name))?;
    build_settings(cfg, name, profile, None).map(drop)
}

fn build_settings(
    cfg: &Config,
    name: &str,
    profile: &Profile,
    token: Option<SecretString>,
) -> Result<Settings, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url, &["http", "https"])?;
    let feed_url = parse_url("feed_url", &profile.feed_url, &["ws", "wss"])?;
    if profile.owner.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "owner".into(),
            reason: "must not be empty".into(),
        });
    }

    let defaults = &cfg.defaults;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    let transport = TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        token: token.clone(),
    };

    let base = ReconnectConfig::default();
    let reconnect = ReconnectConfig {
        initial_delay: profile
            .reconnect_initial_ms
            .map_or(base.initial_delay, Duration::from_millis),
        max_delay: profile
            .reconnect_max_ms
            .map_or(base.max_delay, Duration::from_millis),
        max_retries: profile.reconnect_max_retries.or(base.max_retries),
    };
    if reconnect.initial_delay > reconnect.max_delay {
        return Err(ConfigError::Validation {
            field: "reconnect_initial_ms".into(),
            reason: "must not exceed reconnect_max_ms".into(),
        });
    }

    let poll_interval = profile
        .poll_interval_secs
        .unwrap_or(defaults.poll_interval_secs);
    if poll_interval == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }

    let pipeline = PipelineConfig {
        poll_interval: Duration::from_secs(poll_interval),
        fetch_timeout: Duration::from_secs(
            profile
                .fetch_timeout_secs
                .unwrap_or(defaults.fetch_timeout_secs),
        ),
        background_sync: profile.background_sync.unwrap_or(defaults.background_sync),
        thresholds: cfg.thresholds.clone(),
        ..PipelineConfig::default()
    };

    Ok(Settings {
        profile: name.into(),
        api_url,
        feed_url,
        owner: profile.owner.clone(),
        token,
        transport,
        reconnect,
        state_dir: profile
            .state_dir
            .clone()
            .unwrap_or_else(|| default_state_dir(name)),
        directory_refresh: Duration::from_secs(
            profile
                .directory_refresh_secs
                .unwrap_or(defaults.directory_refresh_secs)
                .max(1),
        ),
        pipeline,
    })
}
