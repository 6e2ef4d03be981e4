//! @acp:module "Checkbox"
//! @acp:summary "Boolean leaf feature"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{CheckmateError, Result};
use crate::expr::{coerce_bool, TagLookup};

use super::common::{nullable, FeatureCommon};
use super::{Feature, FeatureType};

/// @acp:summary "Yes/no answer; contributes its tag when true"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Checkbox {
    #[serde(flatten)]
    pub common: FeatureCommon,

    #[serde(default, deserialize_with = "nullable")]
    pub value: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub default: bool,
}

impl Checkbox {
    pub fn new(tag: &str, title: &str) -> Self {
        Self {
            common: FeatureCommon {
                tag: tag.to_string(),
                title: title.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Shared validation for boolean leaves
    pub(crate) fn validate_bool(
        common: &mut FeatureCommon,
        value: &mut bool,
        tag: &str,
        ctx: &dyn TagLookup,
    ) -> Result<bool> {
        let derived = common
            .derive_value(tag, ctx)?
            .map(|v| coerce_bool(&v))
            .transpose()?;
        let disabled = common.derive_disabled(ctx)?;

        let mut changed = false;
        if let Some(derived) = derived {
            if derived != *value {
                *value = derived;
                changed = true;
            }
        }
        Ok(common.commit_disabled(disabled) || changed)
    }

    pub(crate) fn bool_from(tag: &str, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(CheckmateError::type_mismatch(tag, "bool", other)),
        }
    }
}

impl Feature for Checkbox {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Checkbox
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
        Value::Bool(self.value)
    }

    fn set_value(&mut self, value: &Value) -> Result<()> {
        self.value = Self::bool_from(&self.common.tag, value)?;
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        self.value = self.default;
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        Self::validate_bool(&mut self.common, &mut self.value, tag, ctx)
    }

    fn applicable_features(&self) -> Vec<&dyn Feature> {
        if self.value && !self.common.disabled && !self.is_inert() {
            vec![self as &dyn Feature]
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.value = false;
    }

    fn schema(&self) -> Value {
        let mut schema = self
            .common
            .schema_base(FeatureType::Checkbox, "checkbox", Map::new(), None);
        if self.value {
            schema.insert("value".to_string(), json!(true));
        }
        if self.default {
            schema.insert("default".to_string(), json!(true));
        }
        Value::Object(schema)
    }
}
