//! Configuration management for the risk calculator

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Serialized pipeline (`.json` bundle or bare pipeline, `.onnx` with the
    /// `onnx` feature)
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/rf_pipeline.json")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

/// Terminal form configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    /// Print the values used for prediction after each result
    #[serde(default = "default_show_inputs")]
    pub show_inputs: bool,
}

fn default_show_inputs() -> bool {
    true
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            show_inputs: default_show_inputs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from the default file, falling back to defaults
    /// when it does not exist.
    ///
    /// Relative paths (the config file itself and `model.path`) are looked
    /// up next to the executable first, then in the working directory.
    pub fn load() -> Result<Self> {
        let base = app_dir();
        let path = resolve_relative(Path::new(DEFAULT_CONFIG_PATH), &base);
        let mut config = Self::load_from_path(path)?;
        config.anchor_paths(&base);
        Ok(config)
    }

    /// Rewrite relative file paths that exist under `base` to point there
    pub fn anchor_paths(&mut self, base: &Path) {
        self.model.path = resolve_relative(&self.model.path, base);
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// Directory holding the running executable, or `.` if it cannot be found
pub fn app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `base.join(path)` when `path` is relative and exists under `base`;
/// otherwise `path` unchanged (absolute, or left to the working directory).
pub fn resolve_relative(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let anchored = base.join(path);
    if anchored.exists() {
        anchored
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.path, PathBuf::from("models/rf_pipeline.json"));
        assert!(config.form.show_inputs);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.model.path, default_model_path());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[model]\npath = \"/srv/models/rf.json\"\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.model.path, PathBuf::from("/srv/models/rf.json"));
        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "info");
        assert!(config.form.show_inputs);
    }

    #[test]
    fn test_relative_model_path_anchored_to_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/rf_pipeline.json"), b"{}").unwrap();

        let mut config = AppConfig::default();
        config.anchor_paths(dir.path());
        assert_eq!(config.model.path, dir.path().join("models/rf_pipeline.json"));
    }

    #[test]
    fn test_relative_path_missing_under_base_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.anchor_paths(dir.path());
        assert_eq!(config.model.path, default_model_path());
    }

    #[test]
    fn test_absolute_path_is_not_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("rf.json");
        fs::write(&absolute, b"{}").unwrap();

        let other = tempfile::tempdir().unwrap();
        assert_eq!(resolve_relative(&absolute, other.path()), absolute);
    }

    #[test]
    fn test_config_found_under_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join("config/config.toml"),
            "[form]\nshow_inputs = false\n",
        )
        .unwrap();

        let path = resolve_relative(Path::new(DEFAULT_CONFIG_PATH), dir.path());
        let config = AppConfig::load_from_path(path).unwrap();
        assert!(!config.form.show_inputs);
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.model.path, default_model_path());
    }
}
