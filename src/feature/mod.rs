//! @acp:module "Features"
//! @acp:summary "Polymorphic checklist nodes with derived values and enablement"
//! @acp:domain engine
//! @acp:layer model
//!
//! A checklist is a tree of features. Every variant exposes the same capability
//! set through the [`Feature`] trait; variants are reconstructed from their wire
//! definition through the type table in [`registry`].
//!
//! | type        | value                         | children          |
//! |-------------|-------------------------------|-------------------|
//! | `checkbox`  | bool                          | none              |
//! | `option`    | bool                          | none              |
//! | `number`    | i64                           | none              |
//! | `string`    | text                          | none              |
//! | `select`    | tag of the true option, or null | options         |
//! | `checklist` | tags of the true checkboxes   | checkboxes        |
//! | `checkform` | property key to child value   | any features      |

pub mod checkbox;
pub mod checkform;
pub mod checklist;
pub mod common;
pub mod number;
pub mod option;
pub mod registry;
pub mod select;
pub mod text;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{CheckmateError, Result};
use crate::expr::TagLookup;

pub use checkbox::Checkbox;
pub use checkform::Checkform;
pub use checklist::Checklist;
pub use common::{FeatureCommon, Rule};
pub use number::Number;
pub use option::SelectOption;
pub use registry::build_feature;
pub use select::Select;
pub use text::Text;

/// Variant discriminator as written in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureType {
    Checkbox,
    Option,
    Number,
    String,
    Select,
    Checklist,
    Checkform,
}

impl FeatureType {
    pub const ALL: [FeatureType; 7] = [
        FeatureType::Checkbox,
        FeatureType::Option,
        FeatureType::Number,
        FeatureType::String,
        FeatureType::Select,
        FeatureType::Checklist,
        FeatureType::Checkform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Checkbox => "checkbox",
            FeatureType::Option => "option",
            FeatureType::Number => "number",
            FeatureType::String => "string",
            FeatureType::Select => "select",
            FeatureType::Checklist => "checklist",
            FeatureType::Checkform => "checkform",
        }
    }

    /// Whether the variant owns child features
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            FeatureType::Select | FeatureType::Checklist | FeatureType::Checkform
        )
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = CheckmateError;

    fn from_str(s: &str) -> Result<Self> {
        FeatureType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CheckmateError::Schema(format!("unknown feature type {:?}", s)))
    }
}

/// @acp:summary "Uniform capability set shared by all feature variants"
pub trait Feature: FeatureClone + fmt::Debug + Send + Sync {
    fn feature_type(&self) -> FeatureType;

    fn common(&self) -> &FeatureCommon;

    fn common_mut(&mut self) -> &mut FeatureCommon;

    /// Child features in their defined, stable order
    fn children(&self) -> Vec<&dyn Feature>;

    fn value(&self) -> Value;

    /// Write a value, rejecting anything not convertible to the native type
    fn set_value(&mut self, value: &Value) -> Result<()>;

    /// Compile rules and seed the default value
    fn apply_defaults(&mut self) -> Result<()>;

    /// Re-derive value and disabled state; returns whether anything changed
    ///
    /// `tag` is the field that was just written: a feature carrying that tag
    /// keeps its value for this round but still refreshes its disabled state.
    fn validate(&mut self, tag: &str, ctx: &dyn TagLookup) -> Result<bool>;

    /// Leaf features that currently contribute to the tag index
    fn applicable_features(&self) -> Vec<&dyn Feature>;

    /// Return every value to its zero state
    fn reset(&mut self);

    /// UI schema document for presentation
    fn schema(&self) -> Value;

    /// Externally addressed write: children first, then this feature
    fn set(&mut self, tag: &str, value: &Value) -> Result<()> {
        if !tag.is_empty() && self.tag() == tag {
            return self.set_value(value);
        }
        Ok(())
    }

    fn tag(&self) -> &str {
        &self.common().tag
    }

    fn set_tag(&mut self, tag: &str) {
        self.common_mut().tag = tag.to_string();
    }

    fn title(&self) -> &str {
        &self.common().title
    }

    fn is_disabled(&self) -> bool {
        self.common().disabled
    }

    /// A rule failed to compile; the feature never surfaces as an answer
    fn is_inert(&self) -> bool {
        self.common().is_inert()
    }
}

/// Boxed cloning so feature trees can be checkpointed
pub trait FeatureClone {
    fn clone_box(&self) -> Box<dyn Feature>;
}

impl<T> FeatureClone for T
where
    T: Feature + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Feature> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Feature> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Depth-first search for a feature by tag
pub fn find_feature<'a>(root: &'a dyn Feature, tag: &str) -> Option<&'a dyn Feature> {
    if !tag.is_empty() && root.tag() == tag {
        return Some(root);
    }
    root.children()
        .into_iter()
        .find_map(|child| find_feature(child, tag))
}

/// True when the feature is disabled or every one of its children is
pub fn is_effectively_disabled(feature: &dyn Feature) -> bool {
    if feature.is_disabled() {
        return true;
    }
    let children = feature.children();
    !children.is_empty() && children.iter().all(|child| child.is_disabled())
}
