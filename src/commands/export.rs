//! @acp:module "Export Command"
//! @acp:summary "Print the answer export of a bundle"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;

use super::open_project;
use crate::config::Config;
use crate::project::ProjectExport;

/// Serialization used for printed exports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

impl ExportFormat {
    pub fn format(&self, export: &ProjectExport) -> Result<String> {
        Ok(match self {
            ExportFormat::Json => serde_json::to_string_pretty(export)?,
            ExportFormat::Yaml => serde_yaml::to_string(export)?,
        })
    }
}

/// Options for the export command
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub bundle: PathBuf,
    pub format: ExportFormat,
}

/// Execute the export command
pub fn execute_export(options: ExportOptions, config: &Config) -> Result<()> {
    let mut project = open_project(&options.bundle, config)?;
    let export = project.export_data()?;
    println!("{}", options.format.format(&export)?);
    Ok(())
}
