//! @acp:module "Bundle Schema"
//! @acp:summary "Read config.json, resolve $ref fragments and maintain cachedFeatures.json"
//! @acp:domain engine
//! @acp:layer io
//!
//! The flattened schema is cached after the first successful resolve and
//! preferred on every later load. The cache is never invalidated: editing a
//! fragment after the cache exists has no effect until `cachedFeatures.json`
//! is removed from the bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CheckmateError, Result};

use super::ResourceLoader;

pub const CONFIG_FILE: &str = "config.json";
pub const CACHE_FILE: &str = "cachedFeatures.json";
pub const DATA_FILE: &str = "data.json";

/// @acp:summary "Template declared by a bundle"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,

    /// Template body first, then partials
    #[serde(default)]
    pub filenames: Vec<String>,

    /// `docx` routes the rendered text through the document converter
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_doc: Option<String>,
}

impl TemplateDef {
    pub fn is_document(&self) -> bool {
        self.format.eq_ignore_ascii_case("docx")
    }
}

/// @acp:summary "Bundle metadata plus feature definitions"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleSchema {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub license: String,

    #[serde(default)]
    pub templates: Vec<TemplateDef>,

    /// Feature definitions; `$ref` entries are replaced once resolved
    #[serde(default)]
    pub features: Vec<Value>,

    /// Set on resolved schemas written to the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// @acp:summary "Load the bundle schema, preferring the cache when enabled"
pub fn load_schema(loader: &mut dyn ResourceLoader, use_cache: bool) -> Result<BundleSchema> {
    if use_cache {
        if let Some(cached) = loader.get(CACHE_FILE) {
            let schema: BundleSchema = serde_json::from_slice(cached)
                .map_err(|e| CheckmateError::Schema(format!("invalid {}: {}", CACHE_FILE, e)))?;
            tracing::debug!(bundle = loader.name(), "schema cache hit");
            return Ok(schema);
        }
        tracing::debug!(bundle = loader.name(), "schema cache miss");
    }

    let mut schema = resolve_schema(loader)?;
    if use_cache {
        schema.generated_at = Some(Utc::now());
        let data = serde_json::to_vec(&schema)?;
        if let Err(err) = loader.set(CACHE_FILE, data) {
            tracing::warn!(bundle = loader.name(), "could not write {}: {}", CACHE_FILE, err);
        }
    }
    Ok(schema)
}

/// Parse `config.json` and inline every `$ref`, ignoring any cache
pub fn resolve_schema(loader: &dyn ResourceLoader) -> Result<BundleSchema> {
    let config = loader.get(CONFIG_FILE).ok_or_else(|| {
        CheckmateError::Schema(format!("{} not found in {}", CONFIG_FILE, loader.name()))
    })?;
    let mut schema: BundleSchema = serde_json::from_slice(config)
        .map_err(|e| CheckmateError::Schema(format!("invalid {}: {}", CONFIG_FILE, e)))?;

    let mut stack = Vec::new();
    schema.features = std::mem::take(&mut schema.features)
        .into_iter()
        .map(|feature| resolve(loader, feature, &mut stack))
        .collect::<Result<_>>()?;
    schema.generated_at = None;
    Ok(schema)
}

fn reference_of(definition: &Value) -> Option<String> {
    definition
        .get("$ref")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

fn resolve(loader: &dyn ResourceLoader, mut definition: Value, stack: &mut Vec<String>) -> Result<Value> {
    if let Some(reference) = reference_of(&definition) {
        if stack.contains(&reference) {
            stack.push(reference);
            return Err(CheckmateError::Schema(format!(
                "reference cycle: {}",
                stack.join(" -> ")
            )));
        }
        let bytes = loader
            .get(&reference)
            .ok_or_else(|| CheckmateError::Schema(format!("ref file {} not found", reference)))?;
        let mut fragment: Value = serde_json::from_slice(bytes)
            .map_err(|e| CheckmateError::Schema(format!("invalid fragment {}: {}", reference, e)))?;
        let fields = fragment.as_object_mut().ok_or_else(|| {
            CheckmateError::Schema(format!("fragment {} is not an object", reference))
        })?;

        // The referencing entry names the feature; the fragment supplies the rest
        if let Some(tag) = definition.get("tag").filter(|t| t.is_string()) {
            fields.insert("tag".to_string(), tag.clone());
        }
        if !fields.contains_key("type") {
            if let Some(kind) = definition.get("type") {
                fields.insert("type".to_string(), kind.clone());
            }
        }

        tracing::debug!(reference = %reference, "resolving fragment");
        stack.push(reference);
        let resolved = resolve(loader, fragment, stack);
        stack.pop();
        return resolved;
    }

    if definition.get("type").and_then(Value::as_str) == Some("checkform") {
        if let Some(properties) = definition
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        {
            for child in properties.values_mut() {
                *child = resolve(loader, child.take(), stack)?;
            }
        }
    }
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn bundle(config: Value, extra: &[(&str, Value)]) -> Package {
        let mut files = vec![(CONFIG_FILE.to_string(), serde_json::to_vec(&config).unwrap())];
        for (name, value) in extra {
            files.push((name.to_string(), serde_json::to_vec(value).unwrap()));
        }
        Package::from_files("test", files)
    }

    #[test]
    fn test_ref_takes_referencing_tag() {
        let package = bundle(
            json!({"features": [{"type": "checklist", "tag": "works", "$ref": "works.json"}]}),
            &[("works.json", json!({"title": "Works", "tag": "other", "enum": []}))],
        );
        let schema = resolve_schema(&package).unwrap();
        assert_eq!(
            schema.features[0],
            json!({"title": "Works", "tag": "works", "enum": [], "type": "checklist"})
        );
    }

    #[test]
    fn test_nested_refs_inside_checkform() {
        let package = bundle(
            json!({"features": [{"type": "checkform", "tag": "site", "properties": {
                "area": {"type": "number", "tag": "area", "$ref": "area.json"}
            }}]}),
            &[("area.json", json!({"type": "number", "title": "Area", "default": 2}))],
        );
        let schema = resolve_schema(&package).unwrap();
        assert_eq!(schema.features[0]["properties"]["area"]["title"], json!("Area"));
        assert_eq!(schema.features[0]["properties"]["area"]["tag"], json!("area"));
    }

    #[test]
    fn test_missing_ref_is_schema_error() {
        let package = bundle(
            json!({"features": [{"type": "checkbox", "tag": "a", "$ref": "gone.json"}]}),
            &[],
        );
        let err = resolve_schema(&package).unwrap_err();
        assert!(err.to_string().contains("ref file gone.json not found"));
    }

    #[test]
    fn test_reference_cycle_is_schema_error() {
        let package = bundle(
            json!({"features": [{"type": "checkform", "tag": "a", "$ref": "a.json"}]}),
            &[
                ("a.json", json!({"type": "checkform", "properties": {"b": {"$ref": "b.json"}}})),
                ("b.json", json!({"type": "checkform", "properties": {"a": {"$ref": "a.json"}}})),
            ],
        );
        let err = resolve_schema(&package).unwrap_err();
        assert!(matches!(err, CheckmateError::Schema(ref m) if m.contains("a.json -> b.json -> a.json")));
    }

    #[test]
    fn test_cache_written_and_preferred() {
        let mut package = bundle(
            json!({"name": "Wind", "features": [{"type": "checkbox", "tag": "a", "$ref": "a.json"}]}),
            &[("a.json", json!({"type": "checkbox", "title": "A"}))],
        );
        let fresh = load_schema(&mut package, true).unwrap();
        assert!(fresh.generated_at.is_some());
        assert!(package.get(CACHE_FILE).is_some());

        // Stale fragments are not seen once cached
        package.set("a.json", br#"{"type": "checkbox", "title": "Changed"}"#.to_vec()).unwrap();
        let cached = load_schema(&mut package, true).unwrap();
        assert_eq!(cached, fresh);
        assert_eq!(load_schema(&mut package, false).unwrap().features[0]["title"], json!("Changed"));
    }
}
