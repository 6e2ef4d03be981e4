//! @acp:module "Feature Common"
//! @acp:summary "Fields, rules and schema helpers shared by every feature variant"
//! @acp:domain engine
//! @acp:layer model

use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::expr::{self, coerce_bool, Evaluator, TagLookup};

use super::FeatureType;

/// @acp:summary "Expression rule attached to a feature"
///
/// A rule starts unbound and is compiled by `apply_defaults`. A rule whose
/// source fails to compile stays failed for the lifetime of the feature and
/// never evaluates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    source: String,
    state: RuleState,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum RuleState {
    #[default]
    Unbound,
    Bound(Evaluator),
    Failed(String),
}

impl Rule {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: RuleState::Unbound,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, RuleState::Bound(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, RuleState::Failed(_))
    }

    /// Compile error message, when compilation failed
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            RuleState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Bind the rule to a compiled evaluator
    pub fn compile(&mut self, owner: &str) {
        if self.is_empty() || !matches!(self.state, RuleState::Unbound) {
            return;
        }
        self.state = match expr::compile(&self.source) {
            Ok(evaluator) => RuleState::Bound(evaluator),
            Err(err) => {
                tracing::warn!(tag = owner, "rule disabled: {}", err);
                RuleState::Failed(err.to_string())
            }
        };
    }

    /// Evaluate a bound rule; `None` when there is nothing to evaluate
    pub fn evaluate(&self, ctx: &dyn TagLookup) -> Option<Result<Value>> {
        match &self.state {
            RuleState::Bound(evaluator) => Some(evaluator.evaluate(ctx)),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = Option::<String>::deserialize(deserializer)?;
        Ok(Rule::new(source.unwrap_or_default()))
    }
}

/// @acp:summary "Attributes every feature carries"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureCommon {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,

    #[serde(default, deserialize_with = "nullable")]
    pub tag: String,

    #[serde(default, deserialize_with = "nullable")]
    pub disabled: bool,

    /// Derives the value from the tag index
    #[serde(default)]
    pub condition: Rule,

    /// Derives the disabled flag from the tag index
    #[serde(default, alias = "disabledOn")]
    pub disabled_on: Rule,

    #[serde(default, alias = "infoUrl")]
    pub info_url: Option<String>,
}

impl FeatureCommon {
    pub fn is_inert(&self) -> bool {
        self.condition.is_failed() || self.disabled_on.is_failed()
    }

    pub fn compile_rules(&mut self) {
        let owner = self.tag.clone();
        self.condition.compile(&owner);
        self.disabled_on.compile(&owner);
    }

    /// Evaluate the value rule unless this feature was the one just written
    /// or is disabled
    pub fn derive_value(&self, written: &str, ctx: &dyn TagLookup) -> Result<Option<Value>> {
        if self.disabled || (!self.tag.is_empty() && self.tag == written) {
            return Ok(None);
        }
        self.condition.evaluate(ctx).transpose()
    }

    pub fn derive_disabled(&self, ctx: &dyn TagLookup) -> Result<Option<bool>> {
        match self.disabled_on.evaluate(ctx) {
            Some(value) => Ok(Some(coerce_bool(&value?)?)),
            None => Ok(None),
        }
    }

    /// Store a derived disabled flag, reporting whether it changed
    pub fn commit_disabled(&mut self, disabled: Option<bool>) -> bool {
        match disabled {
            Some(disabled) if disabled != self.disabled => {
                self.disabled = disabled;
                true
            }
            _ => false,
        }
    }

    /// Base UI schema object; callers add variant specific keys
    pub(crate) fn schema_base(
        &self,
        kind: FeatureType,
        schema_type: &str,
        mut props: Map<String, Value>,
        multiple: Option<bool>,
    ) -> Map<String, Value> {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(schema_type));
        schema.insert("title".to_string(), json!(self.title));
        if !self.tag.is_empty() {
            schema.insert("tag".to_string(), json!(self.tag));
        }
        if self.disabled {
            schema.insert("disabled".to_string(), json!(true));
        }
        if let Some(url) = &self.info_url {
            props.insert("info_url".to_string(), json!(url));
        }
        let mut formly = Map::new();
        formly.insert("type".to_string(), json!(kind.as_str()));
        if let Some(multiple) = multiple {
            formly.insert("multiple".to_string(), json!(multiple));
        }
        formly.insert("props".to_string(), Value::Object(props));
        schema.insert("widget".to_string(), json!({ "formlyConfig": formly }));
        schema
    }
}

/// Treat an explicit `null` like an absent field
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer field accepting floats, rounded half away from zero
pub(crate) fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    expr::coerce_int(&value).map_err(serde::de::Error::custom)
}

/// Text field accepting numbers and booleans
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    expr::coerce_string(&value).map_err(serde::de::Error::custom)
}

/// Optional tag list accepting a single tag
pub(crate) fn lenient_tags<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    expr::coerce_tag_list(&value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_rule_compile_failure_is_permanent() {
        let mut rule = Rule::new("capacityMW >=");
        rule.compile("capacity");
        assert!(rule.is_failed());
        assert!(rule.failure().unwrap().contains("capacityMW >="));
        rule.compile("capacity");
        assert!(rule.is_failed());
        assert!(rule.evaluate(&BTreeMap::<String, Value>::new()).is_none());
    }

    #[test]
    fn test_empty_rule_stays_unbound() {
        let mut rule = Rule::new("  ");
        rule.compile("x");
        assert!(!rule.is_bound());
        assert!(!rule.is_failed());
    }

    #[test]
    fn test_common_accepts_both_casings() {
        let common: FeatureCommon =
            serde_json::from_value(json!({"tag": "a", "disabledOn": "b", "infoUrl": "u"})).unwrap();
        assert_eq!(common.disabled_on.source(), "b");
        assert_eq!(common.info_url.as_deref(), Some("u"));

        let common: FeatureCommon =
            serde_json::from_value(json!({"title": null, "disabled_on": "c"})).unwrap();
        assert_eq!(common.title, "");
        assert_eq!(common.disabled_on.source(), "c");
    }

    #[test]
    fn test_derive_value_skips_written_tag() {
        let mut common = FeatureCommon {
            tag: "a".to_string(),
            condition: Rule::new("1 == 1"),
            ..Default::default()
        };
        common.compile_rules();
        let ctx: BTreeMap<String, Value> = BTreeMap::new();
        assert_eq!(common.derive_value("a", &ctx).unwrap(), None);
        assert_eq!(common.derive_value("b", &ctx).unwrap(), Some(json!(true)));
        common.disabled = true;
        assert_eq!(common.derive_value("b", &ctx).unwrap(), None);
    }
}
