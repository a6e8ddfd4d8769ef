//! Layered runtime configuration.
//!
//! Precedence, lowest first: built-in defaults, the global
//! `<config_dir>/coding_agent/config.json`, the project
//! `<cwd>/.agent/config.json`, then environment overrides. Files are merged
//! as JSON objects, so a layer only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::permission::PermissionConfig;

pub const CONFIG_FILE: &str = "config.json";
pub const PROJECT_DIR: &str = ".agent";
pub const GLOBAL_DIR: &str = "coding_agent";

pub const PROVIDER_ENV_VAR: &str = "CODING_AGENT_PROVIDER";
pub const MODEL_ENV_VAR: &str = "CODING_AGENT_MODEL";
pub const LOG_ENV_VAR: &str = "CODING_AGENT_LOG";

pub const MAX_ROUNDS_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub provider: String,
    pub model: String,
    pub personality: String,
    pub max_tokens: u32,
    pub max_rounds: u32,
    pub permissions: PermissionConfig,
    pub log_level: String,
    pub bash_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "mock".to_string(),
            personality: crate::prompt::DEFAULT_PERSONALITY.to_string(),
            max_tokens: 8192,
            max_rounds: 10,
            permissions: PermissionConfig::default(),
            log_level: "warn".to_string(),
            bash_timeout_ms: 30_000,
        }
    }
}

/// Directories consulted while loading configuration and prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub global_dir: Option<PathBuf>,
    pub project_dir: PathBuf,
}

impl ConfigPaths {
    #[must_use]
    pub fn discover(cwd: &Path) -> Self {
        Self {
            global_dir: dirs::config_dir().map(|dir| dir.join(GLOBAL_DIR)),
            project_dir: cwd.join(PROJECT_DIR),
        }
    }

    fn layer_files(&self) -> Vec<PathBuf> {
        self.global_dir
            .iter()
            .map(|dir| dir.join(CONFIG_FILE))
            .chain(std::iter::once(self.project_dir.join(CONFIG_FILE)))
            .collect()
    }
}

impl Config {
    /// Loads every layer, reading overrides from the process environment.
    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        Self::load_with_env(paths, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        paths: &ConfigPaths,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;

        for path in paths.layer_files() {
            if let Some(layer) = read_layer(&path)? {
                tracing::debug!(path = %path.display(), "applying config layer");
                merge_json(&mut merged, layer);
            }
        }

        let mut config: Self = serde_json::from_value(merged)
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(provider) = read(PROVIDER_ENV_VAR) {
            self.provider = provider;
        }
        if let Some(model) = read(MODEL_ENV_VAR) {
            self.model = model;
        }
        if let Some(level) = read(LOG_ENV_VAR) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be > 0".to_string()));
        }
        if !(1..=MAX_ROUNDS_LIMIT).contains(&self.max_rounds) {
            return Err(ConfigError::Invalid(format!(
                "max_rounds must be between 1 and {MAX_ROUNDS_LIMIT}"
            )));
        }
        if self.bash_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "bash_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads one layer. Missing files are skipped; anything else that keeps the
/// file from being a valid partial config is an error naming the file.
fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(ConfigError::NotAnObject {
            path: path.to_path_buf(),
        });
    }

    serde_json::from_value::<Config>(value.clone()).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(value))
}

fn merge_json(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => merge_objects(base, layer),
        (base, layer) => *base = layer,
    }
}

fn merge_objects(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        match base.get_mut(&key) {
            Some(existing) => merge_json(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}
