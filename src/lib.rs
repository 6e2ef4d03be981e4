#![forbid(unsafe_code)]

//! @acp:module "Checkmate Library"
//! @acp:summary "Expression-driven compliance checklists with packaged bundles and rendered reports"
//! @acp:domain engine
//! @acp:layer api
//! @acp:stability stable
//!
//! # Checkmate
//!
//! A checklist is a tree of typed features whose values and enablement are
//! derived from expressions over the answers given so far. After every edit
//! the project is driven to a fixed point.
//!
//! ## Features
//!
//! - **Seven feature types**: checkbox, option, number, string, select, checklist, checkform
//! - **Fixed-point validation**: conditions re-evaluated until stable, with a pass cap
//! - **Bundles**: directory or `.chlx` archive with `$ref` fragments and a schema cache
//! - **Reports**: handlebars templates, optionally converted to office documents
//!
//! ## Example
//!
//! ```rust,no_run
//! use checkmate::{Package, Project};
//! use serde_json::json;
//!
//! fn main() -> checkmate::Result<()> {
//!     let mut project = Project::new(Package::open("wind-farm")?)?;
//!
//!     project.set_feature("capacityMW", &json!(12))?;
//!     println!("{}", project.evaluate());
//!
//!     project.save_project()?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod expr;
pub mod feature;
pub mod package;
pub mod project;
pub mod render;

// Re-exports
pub use config::{Config, ConverterConfig, TableStyle};
pub use error::{CheckmateError, Result};
pub use expr::{coerce_bool, coerce_int, coerce_string, coerce_tag_list, compile, Evaluator, TagLookup};
pub use feature::{build_feature, Feature, FeatureType};
pub use package::{BundleSchema, Package, ResourceLoader, TemplateDef, BUNDLE_EXT};
pub use project::{Project, ProjectExport, TagIndex};
pub use render::{normalize_whitespace, RenderOutput, Templates};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
