//! @acp:module "Render Command"
//! @acp:summary "Render a bundle template to text or a document"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::Result;
use console::style;

use super::open_project;
use crate::config::Config;
use crate::render::RenderOutput;

/// Options for the render command
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub bundle: PathBuf,
    /// Template name; the first template when absent
    pub template: Option<String>,
}

/// Execute the render command
pub fn execute_render(options: RenderOptions, config: &Config) -> Result<()> {
    let project = open_project(&options.bundle, config)?;
    match project.render(options.template.as_deref())? {
        RenderOutput::Text(text) => println!("{}", text),
        RenderOutput::Document(path) => {
            println!("{} Document written to {}", style("✓").green(), path.display())
        }
    }
    Ok(())
}
