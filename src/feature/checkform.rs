//! @acp:module "Checkform"
//! @acp:summary "Named group of heterogeneous child features"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::TagLookup;

use super::common::{nullable, FeatureCommon};
use super::{build_feature, Feature, FeatureType};

/// Wire shape of a checkform before its children are built
#[derive(Deserialize)]
struct CheckformDefinition {
    #[serde(flatten)]
    common: FeatureCommon,

    #[serde(default, deserialize_with = "nullable")]
    properties: Map<String, Value>,

    #[serde(default, deserialize_with = "nullable", alias = "featureOrder")]
    feature_order: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    hide_disabled: bool,
}

/// @acp:summary "Group of features keyed by property name"
///
/// Children follow `feature_order`; properties it does not name are appended
/// in document order. A child without a tag takes its property key.
#[derive(Debug, Clone, Default)]
pub struct Checkform {
    pub common: FeatureCommon,
    pub hide_disabled: bool,
    properties: Vec<(String, Box<dyn Feature>)>,
}

impl Checkform {
    /// Build a checkform and its children from a wire definition
    pub fn from_definition(definition: &Value) -> Result<Self> {
        let CheckformDefinition {
            common,
            properties,
            feature_order,
            hide_disabled,
        } = CheckformDefinition::deserialize(definition)
            .map_err(|e| CheckmateError::Schema(format!("invalid checkform: {}", e)))?;

        let mut order: Vec<&String> = Vec::with_capacity(properties.len());
        for key in feature_order.iter().chain(properties.keys()) {
            if properties.contains_key(key) && !order.contains(&key) {
                order.push(key);
            }
        }

        let properties = order
            .into_iter()
            .map(|key| {
                let mut feature = build_feature(&properties[key])?;
                if feature.tag().is_empty() {
                    feature.set_tag(key);
                }
                Ok((key.clone(), feature))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            common,
            hide_disabled,
            properties,
        })
    }

    /// Property keys in presentation order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(key, _)| key.as_str())
    }

    pub fn property(&self, key: &str) -> Option<&dyn Feature> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, child)| child.as_ref())
    }

    fn apply_object(&mut self, map: &Map<String, Value>) -> Result<()> {
        let mut staged = self.properties.clone();
        for (key, value) in map {
            match staged.iter_mut().find(|(k, _)| k == key) {
                Some((_, child)) => child.set_value(value)?,
                None => {
                    return Err(CheckmateError::type_mismatch(
                        &self.common.tag,
                        "known property",
                        &Value::String(key.clone()),
                    ))
                }
            }
        }
        self.properties = staged;
        Ok(())
    }
}

impl Feature for Checkform {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Checkform
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }

    fn children(&self) -> Vec<&dyn Feature> {
        self.properties.iter().map(|(_, child)| child.as_ref()).collect()
    }

    fn value(&self) -> Value {
        let map: Map<String, Value> = self
            .properties
            .iter()
            .map(|(key, child)| (key.clone(), child.value()))
            .collect();
        Value::Object(map)
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Object(map) => self.apply_object(map),
            other => Err(CheckmateError::type_mismatch(&self.common.tag, "object", other)),
        }
    }

    fn set(&mut self, tag: &str, value: &Value) -> Result<()> {
        if tag.is_empty() {
            return Ok(());
        }
        if self.common.tag == tag {
            return self.set_value(value);
        }
        for (_, child) in &mut self.properties {
            child.set(tag, value)?;
        }
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        for (_, child) in &mut self.properties {
            child.apply_defaults()?;
        }
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        let mut changed = false;
        for (_, child) in &mut self.properties {
            changed |= child.validate(tag, ctx)?;
        }

        let derived = self.common.derive_value(tag, ctx)?;
        let disabled = self.common.derive_disabled(ctx)?;

        if let Some(derived) = derived {
            let map = match derived {
                Value::Object(map) => map,
                other => {
                    return Err(CheckmateError::Coerce {
                        value: crate::error::describe_value(&other),
                        target: "object",
                    })
                }
            };
            let before = self.value();
            self.apply_object(&map)?;
            changed |= self.value() != before;
        }
        Ok(self.common.commit_disabled(disabled) || changed)
    }

    fn applicable_features(&self) -> Vec<&dyn Feature> {
        if self.common.disabled || self.is_inert() {
            return Vec::new();
        }
        self.properties
            .iter()
            .flat_map(|(_, child)| child.applicable_features())
            .collect()
    }

    fn reset(&mut self) {
        for (_, child) in &mut self.properties {
            child.reset();
        }
    }

    fn schema(&self) -> Value {
        let mut props = Map::new();
        props.insert("hide_disabled".to_string(), json!(self.hide_disabled));
        let mut schema = self
            .common
            .schema_base(FeatureType::Checkform, "object", props, None);
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(key, child)| (key.clone(), child.schema()))
            .collect();
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("feature_order".to_string(), json!(self.keys().collect::<Vec<_>>()));
        Value::Object(schema)
    }
}
