use serde::Deserialize;
use std::path::{Path, PathBuf};

use permgate_core::appop::{AppOpDefaults, parse_mode};
use permgate_core::collection::IndexedMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub packages: PackagesConfig,
    pub app_ops: AppOpsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub snapshot_path: Option<PathBuf>,
}

/// Per app-op overrides of the built-in default mode. Values are mode names
/// (`allow`, `ignore`, `deny`, `default`, `foreground`) or mode numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppOpsConfig {
    pub default_modes: IndexedMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/permgate"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PERMGATE_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PERMGATE_PACKAGES")
            && !v.is_empty()
        {
            self.packages.snapshot_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("PERMGATE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("PERMGATE_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.state_dir must not be empty".to_string(),
            ));
        }
        for (app_op_name, mode) in &self.app_ops.default_modes {
            if parse_mode(mode).is_none() {
                return Err(ConfigError::Validation(format!(
                    "app_ops.default_modes.{app_op_name} has unknown mode '{mode}'"
                )));
            }
        }
        Ok(())
    }

    pub fn to_app_op_defaults(&self) -> AppOpDefaults {
        self.app_ops
            .default_modes
            .iter()
            .filter_map(|(app_op_name, mode)| Some((app_op_name, parse_mode(mode)?)))
            .fold(AppOpDefaults::new(), |defaults, (app_op_name, mode)| {
                defaults.with_override(app_op_name.clone(), mode)
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
