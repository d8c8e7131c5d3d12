//! Engine configuration.
//!
//! Resolution order: built-in defaults, then a YAML file, then
//! `FORMPILOT__SECTION__KEY=value` environment overlays. Overlay values are
//! parsed as JSON when possible and taken as strings otherwise.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdp_driver::CdpConfig;
use field_locator::LocatorConfig;
use platform_registry::{PatternLibrary, RegistryError};
use profile_cache::ProfileConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use step_tracker::TrackerConfig;
use tracing::{info, warn};
use value_injector::InjectorConfig;

use crate::errors::ConfigError;

pub const ENV_PREFIX: &str = "FORMPILOT__";
const LOCAL_CONFIG: &str = "config/formpilot.yaml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub locator: LocatorConfig,
    pub injector: InjectorConfig,
    pub tracker: TrackerConfig,
    pub profile: ProfileConfig,
    /// Chromium the CLI drives pages in.
    pub browser: CdpConfig,
    /// JSON or YAML catalog replacing the bundled platform rules.
    pub catalog_path: Option<PathBuf>,
}

pub struct LoadedConfig {
    pub config: EngineConfig,
    /// File the configuration was read from, if one existed.
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Apply `FORMPILOT__` overlays from `vars`; returns how many applied.
    pub fn apply_env_overlays<I>(&mut self, vars: I) -> Result<usize, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut doc = serde_json::to_value(&*self).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut applied = 0;
        for (key, raw) in vars {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<String> = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            if path.is_empty() {
                continue;
            }
            set_json_value(&mut doc, &path, parse_env_value(&raw)).map_err(|reason| {
                ConfigError::Override {
                    key: key.clone(),
                    reason,
                }
            })?;
            applied += 1;
        }
        if applied > 0 {
            *self = serde_json::from_value(doc).map_err(|err| ConfigError::Override {
                key: ENV_PREFIX.trim_end_matches('_').to_string(),
                reason: err.to_string(),
            })?;
        }
        Ok(applied)
    }

    /// Pattern library named by `catalog_path`, degrading to the bundled one.
    pub fn library(&self) -> Result<Arc<PatternLibrary>, RegistryError> {
        PatternLibrary::load(self.catalog_path.as_deref())
    }
}

/// `--config` path, else `./config/formpilot.yaml`, else the user config
/// directory.
pub fn default_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("formpilot").join("config.yaml"))
}

pub async fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = default_config_path(explicit);
    let mut config = match &path {
        Some(path) if path.exists() => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
            info!(path = %path.display(), "loaded configuration");
            EngineConfig::from_yaml_str(&raw)?
        }
        Some(path) => {
            if explicit.is_some() {
                warn!(path = %path.display(), "config file not found, using defaults");
            }
            EngineConfig::default()
        }
        None => EngineConfig::default(),
    };
    let applied = config.apply_env_overlays(std::env::vars())?;
    if applied > 0 {
        info!(applied, "environment overrides applied");
    }
    Ok(LoadedConfig {
        config,
        path: path.filter(|p| p.exists()),
    })
}

fn parse_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_json_value(target: &mut Value, path: &[String], value: Value) -> Result<(), String> {
    let Some((last, parents)) = path.split_last() else {
        return Err("empty key".to_string());
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry(segment.clone())
            .or_insert(Value::Null);
    }
    ensure_object(current, last)?.insert(last.clone(), value);
    Ok(())
}

fn ensure_object<'a>(value: &'a mut Value, segment: &str) -> Result<&'a mut Map<String, Value>, String> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| format!("{segment} is not a section"))
}
