//! @acp:module "Project"
//! @acp:summary "Loaded checklist: features, tag index and the fixed-point validator"
//! @acp:domain engine
//! @acp:layer service
//!
//! A [`Project`] owns the top-level features of one bundle and its loader.
//! Every mutation goes through a checkpoint of the feature tree: when a write,
//! an evaluation or the validator fails, the last committed state is restored.

mod tags;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::{CheckmateError, Result};
use crate::feature::{find_feature, registry::build_features, Feature};
use crate::package::{schema::load_schema, ResourceLoader, DATA_FILE};
use crate::render::{RenderOutput, Templates};

pub use tags::TagIndex;

/// @acp:summary "Persisted answers: true booleans by tag, everything else by value"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectExport {
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub values: Map<String, Value>,
}

/// @acp:summary "One loaded bundle and its answers"
#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub author: String,
    pub license: String,

    features: Vec<Box<dyn Feature>>,
    tags: TagIndex,
    templates: Templates,
    loader: Box<dyn ResourceLoader>,
    project_file: Option<PathBuf>,
    dirty: bool,
    config: Config,
    passes: usize,
}

impl Project {
    /// Load a project with the default configuration
    pub fn new<L: ResourceLoader + 'static>(loader: L) -> Result<Self> {
        Self::with_config(loader, Config::default())
    }

    /// @acp:summary "Build features and templates from a bundle, then load its answers"
    pub fn with_config<L: ResourceLoader + 'static>(loader: L, config: Config) -> Result<Self> {
        let mut loader: Box<dyn ResourceLoader> = Box::new(loader);
        let schema = load_schema(loader.as_mut(), config.schema_cache)?;
        let features = build_features(&schema.features)?;
        let templates = Templates::compile(&schema.templates, loader.as_ref())?;

        let mut project = Self {
            name: schema.name,
            author: schema.author,
            license: schema.license,
            features,
            tags: TagIndex::default(),
            templates,
            loader,
            project_file: None,
            dirty: false,
            config,
            passes: 0,
        };

        for feature in &mut project.features {
            feature.apply_defaults()?;
        }
        if project.loader.get(DATA_FILE).is_some() {
            project.load_project_data_from_file(DATA_FILE)?;
        } else if let Err(err) = project.validate("") {
            // Seeded defaults stay in place; the next edit validates again
            tracing::warn!(bundle = project.loader.name(), "initial validation failed: {}", err);
        }
        project.project_file = project.loader.default_archive();
        project.dirty = false;
        Ok(project)
    }

    pub fn features(&self) -> &[Box<dyn Feature>] {
        &self.features
    }

    /// Find a feature anywhere in the tree
    pub fn feature(&self, tag: &str) -> Option<&dyn Feature> {
        self.features
            .iter()
            .find_map(|feature| find_feature(feature.as_ref(), tag))
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn loader(&self) -> &dyn ResourceLoader {
        self.loader.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project_file(&self) -> Option<&Path> {
        self.project_file.as_deref()
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Outer passes used by the last validation
    pub fn validation_passes(&self) -> usize {
        self.passes
    }

    /// Run `op` against the project, restoring the feature tree, project file
    /// and dirty flag on error
    fn transaction<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let features = self.features.clone();
        let project_file = self.project_file.clone();
        let dirty = self.dirty;
        let result = op(self);
        if result.is_err() {
            self.features = features;
            self.project_file = project_file;
            self.dirty = dirty;
            self.tags.rebuild(&self.features);
        }
        result
    }

    /// Deliver a write to every top-level feature; false when no feature has the tag
    fn write(&mut self, tag: &str, value: &Value) -> Result<bool> {
        if self.feature(tag).is_none() {
            return Ok(false);
        }
        for feature in &mut self.features {
            feature.set(tag, value)?;
        }
        Ok(true)
    }

    /// @acp:summary "Write one field and drive the tree to its fixed point"
    pub fn set_feature(&mut self, tag: &str, value: &Value) -> Result<()> {
        self.transaction(|project| {
            if !project.write(tag, value)? {
                return Err(CheckmateError::NotFound(format!("feature {}", tag)));
            }
            project.run_validation(tag)
        })?;
        self.dirty = true;
        Ok(())
    }

    /// @acp:summary "Re-derive values until nothing changes"
    ///
    /// Returns whether any feature changed during this call. Exceeding
    /// `max_validation_passes` fails with [`CheckmateError::Convergence`] and
    /// keeps the state from before the call.
    pub fn validate(&mut self, tag: &str) -> Result<bool> {
        self.transaction(|project| project.run_validation(tag))
    }

    fn run_validation(&mut self, tag: &str) -> Result<bool> {
        let limit = self.config.max_validation_passes;
        let mut changed_any = false;
        for pass in 1..=limit {
            self.passes = pass;
            if !self.validation_pass(tag)? && !self.validation_pass("")? {
                tracing::debug!(tag, passes = pass, "validation converged");
                return Ok(changed_any);
            }
            changed_any = true;
        }
        Err(CheckmateError::Convergence(limit))
    }

    fn validation_pass(&mut self, tag: &str) -> Result<bool> {
        self.tags.rebuild(&self.features);
        let mut changed = false;
        for feature in &mut self.features {
            changed |= feature.validate(tag, &self.tags)?;
        }
        Ok(changed)
    }

    /// Return every feature to its zero value and forget the project file
    pub fn reset_features(&mut self) {
        for feature in &mut self.features {
            feature.reset();
        }
        self.tags.clear();
        self.project_file = None;
        self.dirty = false;
    }

    fn visible(feature: &dyn Feature) -> bool {
        !feature.tag().is_empty() && !feature.tag().starts_with('_')
    }

    /// Top-level values keyed by tag
    pub fn value(&self) -> Value {
        let values: Map<String, Value> = self
            .features
            .iter()
            .filter(|f| Self::visible(f.as_ref()))
            .map(|f| (f.tag().to_string(), f.value()))
            .collect();
        Value::Object(values)
    }

    /// Replace top-level values; validation does not run
    pub fn set_value(&mut self, values: &Value) -> Result<()> {
        let map = values
            .as_object()
            .ok_or_else(|| CheckmateError::type_mismatch("", "object", values))?;
        self.transaction(|project| {
            for (tag, value) in map {
                if let Some(feature) = project.features.iter_mut().find(|f| f.tag() == tag) {
                    feature.set_value(value)?;
                }
            }
            Ok(())
        })?;
        self.dirty = true;
        Ok(())
    }

    /// @acp:summary "Validate and collect the current answers"
    pub fn export_data(&mut self) -> Result<ProjectExport> {
        self.validate("")?;
        let mut export = ProjectExport::default();
        for (tag, value) in self.tags.iter() {
            match value {
                Value::Bool(_) => export.tags.push(tag.clone()),
                other => {
                    export.values.insert(tag.clone(), other.clone());
                }
            }
        }
        Ok(export)
    }

    /// @acp:summary "Replace the answers with a snapshot"
    pub fn load_project_data(&mut self, export: &ProjectExport) -> Result<()> {
        self.transaction(|project| {
            project.reset_features();
            let writes = export
                .values
                .iter()
                .map(|(tag, value)| (tag.as_str(), value.clone()))
                .chain(export.tags.iter().map(|tag| (tag.as_str(), Value::Bool(true))));
            for (tag, value) in writes {
                if project.write(tag, &value)? {
                    project.run_validation(tag)?;
                } else {
                    tracing::warn!(tag, "ignoring answer for unknown feature");
                }
            }
            project.run_validation("")
        })?;
        self.dirty = false;
        Ok(())
    }

    pub fn load_project_data_from_file(&mut self, name: &str) -> Result<()> {
        let data = self
            .loader
            .get(name)
            .ok_or_else(|| CheckmateError::NotFound(format!("file {}", name)))?;
        let export: ProjectExport = serde_json::from_slice(data)?;
        self.load_project_data(&export)
    }

    /// @acp:summary "UI schema of the visible top-level features"
    pub fn schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .features
            .iter()
            .filter(|f| Self::visible(f.as_ref()))
            .map(|f| (f.tag().to_string(), f.schema()))
            .collect();
        json!({
            "type": "object",
            "name": self.name,
            "author": self.author,
            "license": self.license,
            "properties": properties,
        })
    }

    /// Schema and model pair returned to form clients
    pub fn form_payload(&self) -> Value {
        json!({ "schema": self.schema(), "model": self.value() })
    }

    /// Form payload restricted to one top-level feature
    pub fn feature_payload(&self, tag: &str) -> Result<Value> {
        let feature = self
            .features
            .iter()
            .find(|f| f.tag() == tag)
            .ok_or_else(|| CheckmateError::NotFound(format!("feature {}", tag)))?;
        Ok(json!({
            "schema": { "type": "object", "properties": { tag: feature.schema() } },
            "model": { tag: feature.value() },
        }))
    }

    /// @acp:summary "Apply a batch of field changes atomically"
    pub fn apply_changes(&mut self, changes: &Map<String, Value>) -> Result<Value> {
        self.transaction(|project| {
            for (tag, value) in changes {
                if !project.write(tag, value)? {
                    return Err(CheckmateError::NotFound(format!("feature {}", tag)));
                }
                project.run_validation(tag)?;
            }
            project.run_validation("")
        })?;
        self.dirty = true;
        Ok(self.form_payload())
    }

    /// Data handed to templates
    pub fn template_data(&self) -> Value {
        json!({
            "name": self.name,
            "author": self.author,
            "license": self.license,
            "tags": self.tags,
            "values": self.value(),
        })
    }

    /// Render a template by name, or the first one
    pub fn render(&self, template: Option<&str>) -> Result<RenderOutput> {
        let def = match template {
            Some(name) => self.templates.get(name),
            None => self.templates.first(),
        }
        .ok_or_else(|| CheckmateError::NotFound(format!("template {}", template.unwrap_or("(first)"))))?;
        self.templates
            .render(&def.name, &self.template_data(), self.loader.as_ref(), &self.config)
    }

    /// Text of the first template; empty when there is none or it fails
    pub fn evaluate(&self) -> String {
        let Some(def) = self.templates.first() else {
            return String::new();
        };
        match self.templates.render_text(&def.name, &self.template_data()) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(template = %def.name, "evaluation failed: {}", err);
                String::new()
            }
        }
    }

    /// Save answers into the bundle archive the project came from
    pub fn save_project(&mut self) -> Result<PathBuf> {
        let path = self.project_file.clone().ok_or_else(|| {
            CheckmateError::NotFound("project file; use save_project_as".to_string())
        })?;
        self.save_project_as(&path)
    }

    /// @acp:summary "Write data.json and pack the bundle to `path`"
    pub fn save_project_as(&mut self, path: &Path) -> Result<PathBuf> {
        let export = self.export_data()?;
        self.loader.set(DATA_FILE, serde_json::to_vec_pretty(&export)?)?;
        let written = self.loader.save_as(path)?;
        self.project_file = Some(written.clone());
        self.dirty = false;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, CONFIG_FILE};

    fn project(features: Value) -> Project {
        let config = json!({"name": "Test", "features": features});
        let package = Package::from_files("test", [(CONFIG_FILE, config.to_string())]);
        Project::new(package).unwrap()
    }

    #[test]
    fn test_permit_scenario() {
        let mut project = project(json!([
            {"type": "number", "tag": "capacityMW"},
            {"type": "checkbox", "tag": "hasPermit", "condition": "capacityMW >= 10"}
        ]));
        assert_eq!(project.feature("hasPermit").unwrap().value(), json!(false));
        project.set_feature("capacityMW", &json!(12)).unwrap();
        assert_eq!(project.feature("hasPermit").unwrap().value(), json!(true));
        assert!(project.dirty());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut project = project(json!([
            {"type": "number", "tag": "a", "default": 3},
            {"type": "number", "tag": "b", "condition": "a * 2"}
        ]));
        assert!(!project.validate("").unwrap());
        assert_eq!(project.feature("b").unwrap().value(), json!(6));
    }

    #[test]
    fn test_unknown_tag_write_is_rejected() {
        let mut project = project(json!([{"type": "checkbox", "tag": "a"}]));
        let err = project.set_feature("b", &json!(true)).unwrap_err();
        assert!(matches!(err, CheckmateError::NotFound(_)));
        assert!(!project.dirty());
    }

    #[test]
    fn test_oscillation_hits_cap_and_restores() {
        let mut project = project(json!([
            {"type": "checkbox", "tag": "flip"},
            {"type": "checkbox", "tag": "flop", "condition": "'flip' in tags and not ('flop' in tags)"}
        ]));
        let before = project.value();
        let err = project.set_feature("flip", &json!(true)).unwrap_err();
        assert!(matches!(err, CheckmateError::Convergence(100)));
        assert_eq!(project.value(), before);
        assert_eq!(project.validation_passes(), 100);
    }

    #[test]
    fn test_hidden_features_left_out_of_schema_and_value() {
        let project = project(json!([
            {"type": "checkbox", "tag": "_internal"},
            {"type": "string", "tag": "site", "default": "Hill"}
        ]));
        let schema = project.schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["name"], json!("Test"));
        assert!(schema["properties"].get("_internal").is_none());
        assert_eq!(project.value(), json!({"site": "Hill"}));
    }
}
