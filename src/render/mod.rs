//! @acp:module "Render"
//! @acp:summary "Bundle templates rendered against project data"
//! @acp:domain engine
//! @acp:layer output
//!
//! Each template definition compiles into its own handlebars registry: the
//! first file is the template body, any further files are partials named by
//! their file stem. Output is plain text with blank-line runs collapsed, or a
//! converted office document.

pub mod converter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde_json::Value;

use crate::config::Config;
use crate::error::{CheckmateError, Result};
use crate::package::{ResourceLoader, TemplateDef};

pub use converter::{replace_table_style, Converter};

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

/// @acp:summary "Result of rendering one template"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutput {
    Text(String),
    /// Path of the converted document
    Document(PathBuf),
}

impl RenderOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RenderOutput::Text(text) => Some(text),
            RenderOutput::Document(_) => None,
        }
    }
}

impl fmt::Display for RenderOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderOutput::Text(text) => f.write_str(text),
            RenderOutput::Document(path) => write!(f, "{}", path.display()),
        }
    }
}

struct CompiledTemplate {
    def: TemplateDef,
    registry: Handlebars<'static>,
}

/// @acp:summary "Compiled templates of a bundle, in declaration order"
#[derive(Default)]
pub struct Templates {
    entries: Vec<CompiledTemplate>,
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.def.name))
            .finish()
    }
}

impl Templates {
    /// Compile every template; a missing file is a schema error
    pub fn compile(defs: &[TemplateDef], loader: &dyn ResourceLoader) -> Result<Self> {
        let mut entries = Vec::with_capacity(defs.len());
        for def in defs {
            let (body, partials) = def.filenames.split_first().ok_or_else(|| {
                CheckmateError::Schema(format!("template {} has no files", def.name))
            })?;

            let mut registry = Handlebars::new();
            registry.register_escape_fn(handlebars::no_escape);
            registry
                .register_template_string(&def.name, read_text(loader, body)?)
                .map_err(|e| CheckmateError::Template(format!("{}: {}", body, e)))?;
            for partial in partials {
                registry
                    .register_partial(&partial_name(partial), read_text(loader, partial)?)
                    .map_err(|e| CheckmateError::Template(format!("{}: {}", partial, e)))?;
            }
            entries.push(CompiledTemplate {
                def: def.clone(),
                registry,
            });
        }
        Ok(Self { entries })
    }

    pub fn defs(&self) -> impl Iterator<Item = &TemplateDef> {
        self.entries.iter().map(|e| &e.def)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateDef> {
        self.defs().find(|def| def.name == name)
    }

    pub fn first(&self) -> Option<&TemplateDef> {
        self.defs().next()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render a template to normalized text, without document conversion
    pub fn render_text(&self, name: &str, data: &Value) -> Result<String> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.def.name == name)
            .ok_or_else(|| CheckmateError::NotFound(format!("template {}", name)))?;
        let raw = entry
            .registry
            .render(name, data)
            .map_err(|e| CheckmateError::Template(e.to_string()))?;
        Ok(normalize_whitespace(&raw))
    }

    /// @acp:summary "Render a template, converting document formats"
    pub fn render(
        &self,
        name: &str,
        data: &Value,
        loader: &dyn ResourceLoader,
        config: &Config,
    ) -> Result<RenderOutput> {
        let text = self.render_text(name, data)?;
        let def = self
            .get(name)
            .ok_or_else(|| CheckmateError::NotFound(format!("template {}", name)))?;
        if !def.is_document() {
            return Ok(RenderOutput::Text(text));
        }

        let reference = match &def.reference_doc {
            Some(file) => Some(loader.get(file).ok_or_else(|| {
                CheckmateError::NotFound(format!("reference document {}", file))
            })?),
            None => None,
        };
        let output = config
            .output_dir
            .join(format!("{}.{}", def.name, config.converter.to));
        Converter::new(config.converter.clone()).convert(&text, reference, &output)?;
        Ok(RenderOutput::Document(output))
    }
}

fn read_text(loader: &dyn ResourceLoader, file: &str) -> Result<String> {
    let bytes = loader
        .get(file)
        .ok_or_else(|| CheckmateError::Schema(format!("template file {} not found", file)))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CheckmateError::Schema(format!("template file {} is not UTF-8", file)))
}

fn partial_name(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

/// Collapse runs of blank lines to one and drop leading and trailing blank lines
pub fn normalize_whitespace(text: &str) -> String {
    let unix = text.replace("\r\n", "\n");
    let collapsed = BLANK_RUN.replace_all(&unix, "\n\n");
    let lines: Vec<&str> = collapsed.split('\n').collect();
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}
