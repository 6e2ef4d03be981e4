//! @acp:module "Inspect Command"
//! @acp:summary "Print the UI schema of a bundle"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;

use super::open_project;
use crate::config::Config;

/// Options for the inspect command
#[derive(Debug, Clone)]
pub struct InspectOptions {
    pub bundle: PathBuf,
    /// Print only this top-level feature
    pub feature: Option<String>,
}

/// Execute the inspect command
pub fn execute_inspect(options: InspectOptions, config: &Config) -> Result<()> {
    let project = open_project(&options.bundle, config)?;
    let payload = match &options.feature {
        Some(tag) => project.feature_payload(tag)?,
        None => project.form_payload(),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
