//! @acp:module "Configuration"
//! @acp:summary "Engine configuration loading and defaults"
//! @acp:domain engine
//! @acp:layer config

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = ".checkmate.config.json";

/// @acp:summary "Main engine configuration structure"
/// @acp:lock normal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum outer passes of the fixed-point validator
    #[serde(default = "default_max_validation_passes")]
    pub max_validation_passes: usize,

    /// Read and write the flattened `cachedFeatures.json` schema
    #[serde(default = "default_true")]
    pub schema_cache: bool,

    /// Directory receiving binary document exports
    #[serde(default = "default_output_dir", skip_serializing_if = "is_default_output_dir")]
    pub output_dir: PathBuf,

    /// External document converter settings
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_validation_passes: default_max_validation_passes(),
            schema_cache: true,
            output_dir: default_output_dir(),
            converter: ConverterConfig::default(),
        }
    }
}

impl Config {
    /// @acp:summary "Load config from a JSON file"
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// @acp:summary "Save config to a file"
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @acp:summary "Load from default location or fall back to defaults"
    pub fn load_or_default() -> Self {
        Self::load(CONFIG_FILE).unwrap_or_default()
    }
}

fn default_max_validation_passes() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn is_default_output_dir(p: &Path) -> bool {
    p == Path::new(".")
}

/// @acp:summary "Settings for the external markdown to office document converter"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Converter executable, resolved through PATH
    #[serde(default = "default_program")]
    pub program: String,

    /// Hard limit for one conversion, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Input format passed to the converter
    #[serde(default = "default_from")]
    pub from: String,

    /// Output format passed to the converter
    #[serde(default = "default_to")]
    pub to: String,

    /// Column width used when wrapping tables
    #[serde(default = "default_columns")]
    pub columns: u32,

    /// Table style rewrite applied to the produced document
    #[serde(default)]
    pub table_style: TableStyle,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            timeout_secs: default_timeout_secs(),
            from: default_from(),
            to: default_to(),
            columns: default_columns(),
            table_style: TableStyle::default(),
        }
    }
}

fn default_program() -> String {
    "pandoc".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_from() -> String {
    "markdown+pipe_tables".to_string()
}

fn default_to() -> String {
    "docx".to_string()
}

fn default_columns() -> u32 {
    43
}

/// Style identifier swapped inside `word/document.xml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStyle {
    #[serde(default = "default_style_source")]
    pub source: String,
    #[serde(default = "default_style_target")]
    pub target: String,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            source: default_style_source(),
            target: default_style_target(),
        }
    }
}

fn default_style_source() -> String {
    "Table".to_string()
}

fn default_style_target() -> String {
    "StileTable".to_string()
}
