//! @acp:module "Tag Index"
//! @acp:summary "Snapshot of applicable feature values used as evaluation context"
//! @acp:domain engine
//! @acp:layer service

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::expr::TagLookup;
use crate::feature::Feature;

/// Tag to value map of every applicable leaf, rebuilt wholesale before each
/// validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagIndex(BTreeMap<String, Value>);

impl TagIndex {
    pub fn rebuild(&mut self, features: &[Box<dyn Feature>]) {
        self.0.clear();
        for feature in features {
            for leaf in feature.applicable_features() {
                if !leaf.tag().is_empty() {
                    self.0.insert(leaf.tag().to_string(), leaf.value());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn get(&self, tag: &str) -> Option<&Value> {
        self.0.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TagLookup for TagIndex {
    fn lookup(&self, tag: &str) -> Option<&Value> {
        self.0.get(tag)
    }
}
