//! @acp:module "Select Option"
//! @acp:summary "Boolean choice owned by a select"
//! @acp:domain engine
//! @acp:layer model

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::expr::TagLookup;

use super::common::{nullable, FeatureCommon};
use super::{Checkbox, Feature, FeatureType};

/// @acp:summary "One choice of a select; at most one per select is true"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SelectOption {
    #[serde(flatten)]
    pub common: FeatureCommon,

    #[serde(default, deserialize_with = "nullable")]
    pub value: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub default: bool,
}

impl Feature for SelectOption {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Option
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
        self.value = Checkbox::bool_from(&self.common.tag, value)?;
        Ok(())
    }

    fn apply_defaults(&mut self) -> Result<()> {
        self.common.compile_rules();
        self.value = self.default;
        Ok(())
    }

    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool> {
        Checkbox::validate_bool(&mut self.common, &mut self.value, tag, ctx)
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
            .schema_base(FeatureType::Option, "option", Map::new(), None);
        if self.value {
            schema.insert("value".to_string(), json!(true));
        }
        Value::Object(schema)
    }
}
