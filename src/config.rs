/*!
 * Configuration support for seerprep
 *
 * Provides runtime configuration options for the normalisation pipeline.
 */

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::schema::FieldSet;
use crate::{ExportFormat, SeerError};

/// Configuration for the normalisation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeerConfig {
    /// Whether to show a progress spinner during long runs
    #[serde(default = "default_enable_progress_bar")]
    pub enable_progress_bar: bool,

    /// Columns written to canonical record tables
    #[serde(default)]
    pub field_set: FieldSet,

    /// Drop each patient's records after the first with brain metastasis
    #[serde(default)]
    pub truncate_after_brain_met: bool,

    /// Default output format
    #[serde(default)]
    pub default_export_format: ExportFormat,

    /// Records between progress updates
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for SeerConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: default_enable_progress_bar(),
            field_set: FieldSet::Full,
            truncate_after_brain_met: false,
            default_export_format: ExportFormat::Tsv,
            progress_interval: default_progress_interval(),
        }
    }
}

// Default value functions for serde
fn default_enable_progress_bar() -> bool {
    true
}

fn default_progress_interval() -> usize {
    100_000
}

impl SeerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - `SEERPREP_PROGRESS_BAR`: "true" or "false"
    /// - `SEERPREP_FIELD_SET`: "full" or "core"
    /// - `SEERPREP_TRUNCATE_AFTER_BRAIN_MET`: "true" or "false"
    /// - `SEERPREP_EXPORT_FORMAT`: "tsv" or "json_lines"
    /// - `SEERPREP_PROGRESS_INTERVAL`: number of records
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = var("SEERPREP_PROGRESS_BAR") {
            config.enable_progress_bar = val.to_lowercase() == "true";
        }

        if let Some(val) = var("SEERPREP_FIELD_SET") {
            if let Some(field_set) = FieldSet::from_name(&val) {
                config.field_set = field_set;
            }
        }

        if let Some(val) = var("SEERPREP_TRUNCATE_AFTER_BRAIN_MET") {
            config.truncate_after_brain_met = val.to_lowercase() == "true";
        }

        if let Some(val) = var("SEERPREP_EXPORT_FORMAT") {
            config.default_export_format = match val.to_lowercase().as_str() {
                "json_lines" | "jsonl" => ExportFormat::JsonLines,
                _ => ExportFormat::Tsv,
            };
        }

        if let Some(val) = var("SEERPREP_PROGRESS_INTERVAL") {
            if let Ok(interval) = val.parse::<usize>() {
                config.progress_interval = interval.max(1);
            }
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SeerError::file_not_found_with_suggestion(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| SeerError::Configuration {
            message: format!("Failed to parse config file: {}", e),
            suggestion: Some("Check that the file is valid TOML format".to_string()),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| SeerError::Configuration {
            message: format!("Failed to serialize config: {}", e),
            suggestion: None,
        })?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/seerprep/config.toml` on Linux
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "seerprep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location, environment, or defaults
    ///
    /// Priority order:
    /// 1. Default config file (if exists)
    /// 2. Environment variables
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Some(config_path) = Self::default_config_path() {
            if config_path.exists() {
                match Self::from_file(&config_path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %config_path.display(), "ignoring config file: {}", e),
                }
            }
        }

        Self::from_env()
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<SeerConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: SeerConfig) {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(config);
}

/// Get the global configuration (or the loaded default if not set)
pub fn global_config() -> SeerConfig {
    GLOBAL_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .cloned()
        .unwrap_or_else(SeerConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

/// Builder for customizing configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: SeerConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: SeerConfig) -> Self {
        Self { config }
    }

    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    pub fn field_set(mut self, field_set: FieldSet) -> Self {
        self.config.field_set = field_set;
        self
    }

    pub fn truncate_after_brain_met(mut self, enabled: bool) -> Self {
        self.config.truncate_after_brain_met = enabled;
        self
    }

    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.default_export_format = format;
        self
    }

    /// Set the progress update interval (at least one record)
    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.config.progress_interval = interval.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SeerConfig {
        self.config
    }
}
