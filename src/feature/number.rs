//! @acp:module "Number"
//! @acp:summary "Integer leaf feature"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::{coerce_int, TagLookup};

use super::common::{lenient_int, FeatureCommon};
use super::{Feature, FeatureType};

/// @acp:summary "Integer answer; contributes its value while enabled"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Number {
    #[serde(flatten)]
    pub common: FeatureCommon,

    #[serde(default, deserialize_with = "lenient_int")]
    pub value: i64,

    #[serde(default, deserialize_with = "lenient_int")]
    pub default: i64,
}

impl Feature for Number {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Number
    }

    fn common(&self) -> &FeatureCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut FeatureCommon {
        &mut self.common
    }

    fn children(&self) -> Vec<&dyn Feature> {
        Vec::new()
    }

    fn value(&self) -> Value {
        json!(self.value)
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        let mismatch = || CheckmateError::type_mismatch(&self.common.tag, "integer", value);
        self.value = match value {
            Value::Number(_) | Value::String(_) => coerce_int(value).map_err(|_| mismatch())?,
            _ => return Err(mismatch()),
        };
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        self.value = self.default;
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        let derived = self
            .common
            .derive_value(tag, ctx)?
            .map(|v| coerce_int(&v))
            .transpose()?;
        let disabled = self.common.derive_disabled(ctx)?;

        let mut changed = false;
        if let Some(derived) = derived {
            if derived != self.value {
                self.value = derived;
                changed = true;
            }
        }
        Ok(self.common.commit_disabled(disabled) || changed)
    }

    fn applicable_features(&self) -> Vec<&dyn Feature> {
        if !self.common.disabled && !self.is_inert() {
            vec![self as &dyn Feature]
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.value = 0;
    }

    fn schema(&self) -> Value {
        let mut schema = self
            .common
            .schema_base(FeatureType::Number, "number", Map::new(), None);
        if self.value != 0 {
            schema.insert("value".to_string(), json!(self.value));
        }
        if self.default != 0 {
            schema.insert("default".to_string(), json!(self.default));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn number(def: Value) -> Number {
        let mut number: Number = serde_json::from_value(def).unwrap();
        number.apply_defaults().unwrap();
        number
    }

    #[test]
    fn test_set_value_rounds_floats() {
        let mut n = number(json!({"tag": "capacityMW"}));
        n.set_value(&json!(3.7)).unwrap();
        assert_eq!(n.value(), json!(4));
        n.set_value(&json!("-2.5")).unwrap();
        assert_eq!(n.value(), json!(-3));
    }

    #[test]
    fn test_set_value_rejects_garbage_and_keeps_value() {
        let mut n = number(json!({"tag": "capacityMW", "default": 7}));
        let err = n.set_value(&json!("x")).unwrap_err();
        assert!(matches!(err, CheckmateError::TypeMismatch { ref tag, .. } if tag == "capacityMW"));
        assert!(n.set_value(&json!(true)).is_err());
        assert_eq!(n.value(), json!(7));
    }

    #[test]
    fn test_definition_accepts_float_default() {
        let n = number(json!({"tag": "surfaceHa", "default": 1.5, "value": null}));
        assert_eq!(n.value, 2);
    }

    #[test]
    fn test_condition_derives_value() {
        let mut n = number(json!({"tag": "total", "condition": "a + b"}));
        let mut ctx = BTreeMap::new();
        ctx.insert("a".to_string(), json!(2));
        ctx.insert("b".to_string(), json!(3.4));
        assert!(n.validate("", &ctx).unwrap());
        assert_eq!(n.value, 5);
        assert_eq!(n.applicable_features().len(), 1);
    }
}
