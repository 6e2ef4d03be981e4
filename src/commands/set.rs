//! @acp:module "Set Command"
//! @acp:summary "Apply field changes to a bundle and optionally save them"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use console::style;
use serde_json::{Map, Value};

use super::open_project;
use super::ExportFormat;
use crate::config::Config;

/// Options for the set command
#[derive(Debug, Clone)]
pub struct SetOptions {
    pub bundle: PathBuf,
    /// `tag=value` pairs, applied in order
    pub assignments: Vec<String>,
    /// Save into the bundle archive
    pub save: bool,
    /// Save to this archive instead
    pub output: Option<PathBuf>,
}

/// Split `tag=value`; the value is JSON when it parses, text otherwise
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (tag, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("expected tag=value, got '{}'", assignment))?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(anyhow!("missing tag in '{}'", assignment));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((tag.to_string(), value))
}

/// Execute the set command
pub fn execute_set(options: SetOptions, config: &Config) -> Result<()> {
    let mut project = open_project(&options.bundle, config)?;

    let mut changes = Map::new();
    for assignment in &options.assignments {
        let (tag, value) = parse_assignment(assignment)?;
        changes.insert(tag, value);
    }
    project
        .apply_changes(&changes)
        .context("Failed to apply changes")?;
    eprintln!(
        "{} Applied {} change(s) in {} validation pass(es)",
        style("✓").green(),
        changes.len(),
        project.validation_passes()
    );

    let export = project.export_data()?;
    println!("{}", ExportFormat::Json.format(&export)?);

    let written = match (&options.output, options.save) {
        (Some(path), _) => Some(project.save_project_as(path)?),
        (None, true) => Some(project.save_project()?),
        (None, false) => None,
    };
    if let Some(path) = written {
        eprintln!("{} Saved to {}", style("✓").green(), path.display());
    }
    Ok(())
}
