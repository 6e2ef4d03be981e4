//! @acp:module "Checklist"
//! @acp:summary "Multiple choice among checkboxes"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::{coerce_tag_list, TagLookup};

use super::common::{lenient_tags, nullable, FeatureCommon};
use super::{Checkbox, Feature, FeatureType};

/// @acp:summary "Checklist whose value is the tags of its true checkboxes"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Checklist {
    #[serde(flatten)]
    pub common: FeatureCommon,

    /// Tags checked by default, in addition to the items' own defaults
    #[serde(default, deserialize_with = "lenient_tags")]
    pub default: Option<Vec<String>>,

    /// Presentation hint: hide disabled items instead of greying them out
    #[serde(default, deserialize_with = "nullable")]
    pub hide_disabled: bool,

    #[serde(default, rename = "enum")]
    pub items: Vec<Checkbox>,
}

impl Checklist {
    pub fn checked(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| item.value)
            .map(|item| item.common.tag.as_str())
            .collect()
    }

    fn check_only(&mut self, tags: &[String]) -> Result<()> {
        if let Some(unknown) = tags
            .iter()
            .find(|tag| !self.items.iter().any(|item| &item.common.tag == *tag))
        {
            return Err(CheckmateError::type_mismatch(
                &self.common.tag,
                "checkbox tag",
                &Value::String(unknown.clone()),
            ));
        }
        for item in &mut self.items {
            item.value = tags.contains(&item.common.tag);
        }
        Ok(())
    }
}

impl Feature for Checklist {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Checklist
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }

    fn children(&self) -> Vec<&dyn Feature> {
        self.items.iter().map(|i| i as &dyn Feature).collect()
    }

    fn value(&self) -> Value {
        json!(self.checked())
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        let tags = match value {
            Value::Null => Vec::new(),
            Value::Array(_) => coerce_tag_list(value)
                .map_err(|_| CheckmateError::type_mismatch(&self.common.tag, "list of tags", value))?,
            other => {
                return Err(CheckmateError::type_mismatch(&self.common.tag, "list of tags", other))
            }
        };
        self.check_only(&tags)
    }

    fn set(&mut self, tag: &str, value: &Value) -> Result<()> {
        if tag.is_empty() {
            return Ok(());
        }
        if self.common.tag == tag {
            return self.set_value(value);
        }
        for item in &mut self.items {
            item.set(tag, value)?;
        }
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        for item in &mut self.items {
            item.apply_defaults()?;
        }
        if let Some(defaults) = self.default.clone() {
            for item in &mut self.items {
                if defaults.contains(&item.common.tag) {
                    item.value = true;
                }
            }
        }
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        let mut changed = false;
        for item in &mut self.items {
            changed |= item.validate(tag, ctx)?;
        }

        let derived = self
            .common
            .derive_value(tag, ctx)?
            .map(|v| coerce_tag_list(&v))
            .transpose()?;
        let disabled = self.common.derive_disabled(ctx)?;

        if let Some(derived) = derived {
            let current: Vec<String> = self.checked().into_iter().map(String::from).collect();
            let same = current.len() == derived.len() && derived.iter().all(|t| current.contains(t));
            if !same {
                self.check_only(&derived)?;
                changed = true;
            }
        }
        Ok(self.common.commit_disabled(disabled) || changed)
    }

    fn applicable_features(&self) -> Vec<&dyn Feature> {
        if self.common.disabled || self.is_inert() {
            return Vec::new();
        }
        self.items
            .iter()
            .flat_map(|item| item.applicable_features())
            .collect()
    }

    fn reset(&mut self) {
        for item in &mut self.items {
            item.reset();
        }
    }

    fn schema(&self) -> Value {
        let options: Vec<Value> = self
            .items
            .iter()
            .map(|i| {
                json!({
                    "label": i.common.title,
                    "value": i.common.tag,
                    "disabled": i.common.disabled,
                })
            })
            .collect();
        let info_urls: Map<String, Value> = self
            .items
            .iter()
            .filter_map(|i| {
                i.common
                    .info_url
                    .as_ref()
                    .map(|url| (i.common.tag.clone(), json!(url)))
            })
            .collect();

        let mut props = Map::new();
        props.insert("options".to_string(), Value::Array(options));
        props.insert("hide_disabled".to_string(), json!(self.hide_disabled));
        if !info_urls.is_empty() {
            props.insert("info_urls".to_string(), Value::Object(info_urls));
        }
        if let Some(default) = &self.default {
            props.insert("defaultValue".to_string(), json!(default));
        }

        let mut schema = self
            .common
            .schema_base(FeatureType::Checklist, "array", props, Some(true));
        let tags: Vec<&str> = self.items.iter().map(|i| i.common.tag.as_str()).collect();
        schema.insert("enum".to_string(), json!(tags));
        schema.insert("value".to_string(), self.value());
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn works() -> Checklist {
        let mut checklist: Checklist = serde_json::from_value(json!({
            "tag": "works",
            "title": "Planned works",
            "default": "digging",
            "enum": [
                {"tag": "digging", "title": "Digging"},
                {"tag": "felling", "title": "Tree felling", "default": true},
                {"tag": "drainage", "title": "Drainage", "disabledOn": "not ('wetland' in tags)"}
            ]
        }))
        .unwrap();
        checklist.apply_defaults().unwrap();
        checklist
    }

    #[test]
    fn test_defaults_merge() {
        assert_eq!(works().value(), json!(["digging", "felling"]));
    }

    #[test]
    fn test_set_value_round_trip() {
        let mut checklist = works();
        checklist.set_value(&json!(["drainage", "digging"])).unwrap();
        // Value follows item order, not write order
        assert_eq!(checklist.value(), json!(["digging", "drainage"]));
        checklist.set_value(&json!(null)).unwrap();
        assert_eq!(checklist.value(), json!([]));
    }

    #[test]
    fn test_set_value_checks_before_mutating() {
        let mut checklist = works();
        assert!(checklist.set_value(&json!(["digging", "paving"])).is_err());
        assert!(checklist.set_value(&json!(["digging", 1])).is_err());
        assert!(checklist.set_value(&json!("digging")).is_err());
        assert_eq!(checklist.value(), json!(["digging", "felling"]));
    }

    #[test]
    fn test_disabled_items_are_not_applicable() {
        let mut checklist = works();
        checklist.set("drainage", &json!(true)).unwrap();
        assert!(checklist.validate("", &BTreeMap::<String, Value>::new()).unwrap());
        let tags: Vec<&str> = checklist.applicable_features().iter().map(|f| f.tag()).collect();
        assert_eq!(tags, vec!["digging", "felling"]);
    }

    #[test]
    fn test_disabled_checklist_hides_children() {
        let mut checklist = works();
        checklist.common.disabled = true;
        assert!(checklist.applicable_features().is_empty());
    }
}
