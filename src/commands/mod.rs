//! @acp:module "Commands"
//! @acp:summary "CLI command implementations"
//! @acp:domain cli
//! @acp:layer handler
//!
//! Each command is in its own submodule. Bundles are opened through
//! [`open_project`] so every command reports load failures the same way.

pub mod export;
pub mod inspect;
pub mod pack;
pub mod render;
pub mod set;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::package::Package;
use crate::project::Project;

pub use export::{execute_export, ExportFormat, ExportOptions};
pub use inspect::{execute_inspect, InspectOptions};
pub use pack::{execute_pack, PackOptions};
pub use render::{execute_render, RenderOptions};
pub use set::{execute_set, parse_assignment, SetOptions};

/// Open a bundle and build its project
pub fn open_project(bundle: &Path, config: &Config) -> Result<Project> {
    let package = Package::open(bundle)
        .with_context(|| format!("Failed to open bundle {}", bundle.display()))?;
    Project::with_config(package, config.clone())
        .with_context(|| format!("Failed to load project from {}", bundle.display()))
}
