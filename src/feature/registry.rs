//! @acp:module "Feature Registry"
//! @acp:summary "Type-name table reconstructing features from wire definitions"
//! @acp:domain engine
//! @acp:layer model

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CheckmateError, Result};

use super::{Checkbox, Checkform, Checklist, Feature, FeatureType, Number, Select, SelectOption, Text};

type Constructor = fn(&Value) -> Result<Box<dyn Feature>>;

static CONSTRUCTORS: LazyLock<HashMap<FeatureType, Constructor>> = LazyLock::new(|| {
    let mut table: HashMap<FeatureType, Constructor> = HashMap::new();
    table.insert(FeatureType::Checkbox, construct::<Checkbox>);
    table.insert(FeatureType::Option, construct::<SelectOption>);
    table.insert(FeatureType::Number, construct::<Number>);
    table.insert(FeatureType::String, construct::<Text>);
    table.insert(FeatureType::Select, construct::<Select>);
    table.insert(FeatureType::Checklist, construct::<Checklist>);
    table.insert(FeatureType::Checkform, |def| {
        Ok(Box::new(Checkform::from_definition(def)?))
    });
    table
});

fn construct<T>(definition: &Value) -> Result<Box<dyn Feature>>
where
    T: Feature + DeserializeOwned + 'static,
{
    let feature = T::deserialize(definition).map_err(|e| {
        CheckmateError::Schema(format!(
            "invalid {} definition{}: {}",
            definition["type"].as_str().unwrap_or("feature"),
            describe_tag(definition),
            e
        ))
    })?;
    Ok(Box::new(feature))
}

fn describe_tag(definition: &Value) -> String {
    match definition.get("tag").and_then(Value::as_str) {
        Some(tag) if !tag.is_empty() => format!(" '{}'", tag),
        _ => String::new(),
    }
}

/// @acp:summary "Build a feature of the variant named by its `type` field"
pub fn build_feature(definition: &Value) -> Result<Box<dyn Feature>> {
    let type_name = definition
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CheckmateError::Schema(format!(
                "feature definition{} has no type",
                describe_tag(definition)
            ))
        })?;
    let kind: FeatureType = type_name.parse()?;
    let constructor = CONSTRUCTORS
        .get(&kind)
        .ok_or_else(|| CheckmateError::Schema(format!("no constructor for {}", kind)))?;
    constructor(definition)
}

/// Build every top-level feature of a resolved schema, in order
pub fn build_features(definitions: &[Value]) -> Result<Vec<Box<dyn Feature>>> {
    definitions.iter().map(build_feature).collect()
}
