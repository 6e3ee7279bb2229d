use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::*;
use crate::error::{JoinerError, Result};
use crate::types::OutputFormat;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub normalize: NormalizeConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// WHATWG encoding label, e.g. `utf-16`, `utf-16be`, `utf-8`
    pub encoding: String,
    pub delimiter: char,
    pub extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            delimiter: DEFAULT_DELIMITER,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// What to do when the dropped column is not in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    #[default]
    Tolerant,
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub drop_column: String,
    pub drop_policy: DropPolicy,
    pub reset_index: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            drop_column: DEFAULT_DROP_COLUMN.to_string(),
            drop_policy: DropPolicy::Tolerant,
            reset_index: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub dir: PathBuf,
    pub csv_delimiter: char,
    pub sheet_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Xlsx,
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            csv_delimiter: DEFAULT_CSV_DELIMITER,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Loads from `explicit`, else `$JOINER_CONFIG`, else `joiner.toml` when it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v)),
                _ => {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }
            },
        };

        let config = match path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    JoinerError::Config(format!(
                        "Failed to read config file '{}': {}",
                        p.display(),
                        e
                    ))
                })?;
                debug!("Loaded config from {}", p.display());
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if encoding_rs::Encoding::for_label(self.input.encoding.as_bytes()).is_none() {
            return Err(JoinerError::Config(format!(
                "Unknown input encoding '{}'",
                self.input.encoding
            )));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(JoinerError::Config(
                "Input delimiter must be a single ASCII character".to_string(),
            ));
        }
        if !self.output.csv_delimiter.is_ascii() {
            return Err(JoinerError::Config(
                "CSV delimiter must be a single ASCII character".to_string(),
            ));
        }
        if self.input.extensions.is_empty() {
            return Err(JoinerError::Config(
                "At least one input extension must be allowed".to_string(),
            ));
        }
        if self.output.sheet_name.trim().is_empty() {
            return Err(JoinerError::Config("Sheet name must not be empty".to_string()));
        }
        Ok(())
    }
}
