//! Configuration management
//!
//! Handles TOML configuration parsing and validation. Every field has a
//! default, so an empty or absent file is a valid configuration; command-line
//! flags are layered on top by the CLI module.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{APP_NAME, CONFIG_FILE_NAME, DEFAULT_TITLE_SEPARATOR};
use crate::models::{TestState, Visibility};
use crate::view::ProjectionOptions;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfiguration {
    pub display: DisplaySettings,
    pub links: LinkSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

/// What the dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySettings {
    /// Test states to show
    pub show: Vec<TestState>,
    /// Separator between nested suite titles
    pub separator: String,
    /// Whether to draw the live progress line on stderr
    pub progress: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show: TestState::ALL.to_vec(),
            separator: DEFAULT_TITLE_SEPARATOR.to_string(),
            progress: true,
        }
    }
}

/// Grep link settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSettings {
    /// Prefix for grep hrefs, e.g. the URL of the browser runner page
    pub base_url: String,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// When JSON snapshots are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    /// Only the final view once the stream ends
    #[default]
    Final,
    /// One view per state change, then the final view
    Every,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub emit: EmitMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default log level filter; RUST_LOG takes precedence
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl BoardConfiguration {
    /// Default location: `<config dir>/runboard/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Load the explicit path if given, else the default path if it exists,
    /// else built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check value constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.show.is_empty() {
            return Err(ConfigError::Invalid(
                "display.show must list at least one test state".to_string(),
            ));
        }
        if self.display.separator.is_empty() {
            return Err(ConfigError::Invalid(
                "display.separator must not be empty".to_string(),
            ));
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not one of off, error, warn, info, debug, trace",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn visibility(&self) -> Visibility {
        self.display.show.iter().copied().collect()
    }

    /// Projector options derived from the display and link settings
    pub fn projection_options(&self) -> ProjectionOptions {
        ProjectionOptions {
            visibility: self.visibility(),
            separator: self.display.separator.clone(),
            base_url: self.links.base_url.clone(),
        }
    }
}
