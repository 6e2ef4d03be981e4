//! @acp:module "Text"
//! @acp:summary "Free text leaf feature, wire type `string`"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::{coerce_string, TagLookup};

use super::common::{lenient_text, FeatureCommon};
use super::{Feature, FeatureType};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Text {
    #[serde(flatten)]
    pub common: FeatureCommon,

    #[serde(default, deserialize_with = "lenient_text")]
    pub value: String,

    #[serde(default, deserialize_with = "lenient_text")]
    pub default: String,
}

impl Feature for Text {
    fn feature_type(&self) -> FeatureType {
        FeatureType::String
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
        Value::String(self.value.clone())
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        self.value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(CheckmateError::type_mismatch(&self.common.tag, "string", other))
            }
        };
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        self.value = self.default.clone();
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        let derived = self
            .common
            .derive_value(tag, ctx)?
            .map(|v| coerce_string(&v))
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
        self.value.clear();
    }

    fn schema(&self) -> Value {
        let mut schema = self
            .common
            .schema_base(FeatureType::String, "string", Map::new(), None);
        if !self.value.is_empty() {
            schema.insert("value".to_string(), json!(self.value));
        }
        if !self.default.is_empty() {
            schema.insert("default".to_string(), json!(self.default));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_stringifies_scalars() {
        let mut text: Text = serde_json::from_value(json!({"tag": "site"})).unwrap();
        text.set_value(&json!(12)).unwrap();
        assert_eq!(text.value(), json!("12"));
        text.set_value(&json!(false)).unwrap();
        assert_eq!(text.value(), json!("false"));
        assert!(text.set_value(&json!(["a"])).is_err());
        assert!(text.set_value(&json!(null)).is_err());
        assert_eq!(text.value(), json!("false"));
    }
}
