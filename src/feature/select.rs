//! @acp:module "Select"
//! @acp:summary "Exclusive choice among options"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::{coerce_string, TagLookup};

use super::common::FeatureCommon;
use super::{Feature, FeatureType, SelectOption};

/// @acp:summary "Select whose value is the tag of its single true option"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Select {
    #[serde(flatten)]
    pub common: FeatureCommon,

    /// Tag of the option selected by default
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default, rename = "enum")]
    pub options: Vec<SelectOption>,
}

impl Select {
    /// Tag of the currently selected option
    pub fn selected(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.value)
            .map(|option| option.common.tag.as_str())
    }

    /// Select the option carrying `tag`; an empty tag clears the selection
    fn select(&mut self, tag: &str) -> Result<()> {
        if !tag.is_empty() && !self.options.iter().any(|o| o.common.tag == tag) {
            return Err(CheckmateError::type_mismatch(
                &self.common.tag,
                "option tag",
                &Value::String(tag.to_string()),
            ));
        }
        for option in &mut self.options {
            option.value = !tag.is_empty() && option.common.tag == tag;
        }
        Ok(())
    }

    /// Turn off every option except the one at `index`
    fn clear_siblings(&mut self, index: usize) -> bool {
        let mut changed = false;
        for (i, option) in self.options.iter_mut().enumerate() {
            if i != index && option.value {
                option.value = false;
                changed = true;
            }
        }
        changed
    }

    /// Keep only the first true option
    fn enforce_exclusive(&mut self) -> bool {
        let mut seen = false;
        let mut changed = false;
        for option in &mut self.options {
            if option.value {
                if seen {
                    option.value = false;
                    changed = true;
                }
                seen = true;
            }
        }
        changed
    }
}

impl Feature for Select {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Select
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }

    fn children(&self) -> Vec<&dyn Feature> {
        self.options.iter().map(|o| o as &dyn Feature).collect()
    }

    fn value(&self) -> Value {
        match self.selected() {
            Some(tag) => Value::String(tag.to_string()),
            None => Value::Null,
        }
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(tag) => self.select(tag),
            Value::Null => self.select(""),
            other => Err(CheckmateError::type_mismatch(&self.common.tag, "option tag", other)),
        }
    }

    fn set(&mut self, tag: &str, value: &Value) -> Result<()> {
        if tag.is_empty() {
            return Ok(());
        }
        if self.common.tag == tag {
            return self.set_value(value);
        }
        // Writing `true` to an option selects it exclusively
        if let Some(index) = self.options.iter().position(|o| o.common.tag == tag) {
            self.options[index].set_value(value)?;
            if self.options[index].value {
                self.clear_siblings(index);
            }
        }
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        for option in &mut self.options {
            option.apply_defaults()?;
        }
        match self.default.clone() {
            Some(tag) if !tag.is_empty() => {
                if self.options.iter().any(|o| o.common.tag == tag) {
                    self.select(&tag)?;
                } else {
                    tracing::warn!(select = %self.common.tag, "default option '{}' does not exist", tag);
                }
            }
            _ => {
                self.enforce_exclusive();
            }
        }
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        let mut changed = false;
        let mut switched_on = None;
        for (index, option) in self.options.iter_mut().enumerate() {
            let was_selected = option.value;
            changed |= option.validate(tag, ctx)?;
            if option.value && !was_selected && switched_on.is_none() {
                switched_on = Some(index);
            }
        }
        // An option whose own condition just turned it on wins over the
        // previous selection
        if let Some(index) = switched_on {
            changed |= self.clear_siblings(index);
        }
        changed |= self.enforce_exclusive();

        let derived = self
            .common
            .derive_value(tag, ctx)?
            .map(|v| coerce_string(&v))
            .transpose()?;
        let disabled = self.common.derive_disabled(ctx)?;

        if let Some(derived) = derived {
            if self.selected().unwrap_or("") != derived {
                self.select(&derived)?;
                changed = true;
            }
        }
        Ok(self.common.commit_disabled(disabled) || changed)
    }

    fn applicable_features(&self) -> Vec<&dyn Feature> {
        if self.common.disabled || self.is_inert() {
            return Vec::new();
        }
        self.options
            .iter()
            .flat_map(|option| option.applicable_features())
            .collect()
    }

    fn reset(&mut self) {
        for option in &mut self.options {
            option.reset();
        }
    }

    fn schema(&self) -> Value {
        let options: Vec<Value> = self
            .options
            .iter()
            .map(|o| {
                json!({
                    "label": o.common.title,
                    "value": o.common.tag,
                    "disabled": o.common.disabled,
                })
            })
            .collect();
        let mut props = Map::new();
        props.insert("options".to_string(), Value::Array(options));
        if let Some(default) = &self.default {
            props.insert("defaultValue".to_string(), json!(default));
        }

        let mut schema = self
            .common
            .schema_base(FeatureType::Select, "string", props, Some(false));
        let tags: Vec<&str> = self.options.iter().map(|o| o.common.tag.as_str()).collect();
        schema.insert("enum".to_string(), json!(tags));
        if let Some(selected) = self.selected() {
            schema.insert("value".to_string(), json!(selected));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn region() -> Select {
        let mut select: Select = serde_json::from_value(json!({
            "type": "select",
            "tag": "region",
            "title": "Region",
            "default": "north",
            "enum": [
                {"tag": "north", "title": "North"},
                {"tag": "south", "title": "South", "condition": "capacityMW > 50"},
                {"tag": "east", "title": "East"}
            ]
        }))
        .unwrap();
        select.apply_defaults().unwrap();
        select
    }

    #[test]
    fn test_default_selects_option() {
        let select = region();
        assert_eq!(select.value(), json!("north"));
        let tags: Vec<&str> = select.applicable_features().iter().map(|f| f.tag()).collect();
        assert_eq!(tags, vec!["north"]);
    }

    #[test]
    fn test_set_value_is_exclusive() {
        let mut select = region();
        select.set_value(&json!("east")).unwrap();
        assert_eq!(select.value(), json!("east"));
        assert_eq!(select.options.iter().filter(|o| o.value).count(), 1);
        select.set_value(&json!(null)).unwrap();
        assert_eq!(select.value(), json!(null));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let mut select = region();
        assert!(select.set_value(&json!("west")).is_err());
        assert!(select.set_value(&json!(3)).is_err());
        assert_eq!(select.value(), json!("north"));
    }

    #[test]
    fn test_option_write_clears_siblings() {
        let mut select = region();
        select.set("east", &json!(true)).unwrap();
        assert_eq!(select.value(), json!("east"));
    }

    #[test]
    fn test_option_conditions_keep_single_selection() {
        let mut select = region();
        let mut ctx = BTreeMap::new();
        ctx.insert("capacityMW".to_string(), json!(80));
        // `south` is derived true while `north` is still selected
        assert!(select.validate("", &ctx).unwrap());
        assert_eq!(select.options.iter().filter(|o| o.value).count(), 1);
        assert_eq!(select.value(), json!("south"));
        assert!(!select.validate("", &ctx).unwrap());
        assert_eq!(select.value(), json!("south"));
    }

    #[test]
    fn test_disabled_select_contributes_nothing() {
        let mut select = region();
        select.common.disabled = true;
        assert!(select.applicable_features().is_empty());
    }

    #[test]
    fn test_schema_lists_options() {
        let schema = region().schema();
        assert_eq!(schema["enum"], json!(["north", "south", "east"]));
        assert_eq!(schema["widget"]["formlyConfig"]["type"], json!("select"));
        assert_eq!(schema["widget"]["formlyConfig"]["props"]["options"][1]["label"], json!("South"));
        assert_eq!(schema["value"], json!("north"));
    }
}
