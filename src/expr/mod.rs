//! @acp:module "Expressions"
//! @acp:summary "Compile condition strings into evaluators and coerce their results"
//! @acp:domain engine
//! @acp:layer logic
//!
//! Conditions are small boolean/arithmetic expressions over tags:
//!
//! - `capacityMW >= 10`
//! - `"hasPermit" in tags and not ("inProtectedArea" in tags)`
//! - `tags.region == "north" or surfaceHa * 2 > 40`
//!
//! An [`Evaluator`] is bound to its source string and evaluated against any
//! [`TagLookup`], which keeps this module independent from the project type.

mod eval;
mod parser;

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{describe_value, CheckmateError, Result};

pub use parser::{BinaryOp, Expr};

/// Read-only tag to value lookup used as evaluation context
pub trait TagLookup {
    fn lookup(&self, tag: &str) -> Option<&Value>;
}

impl TagLookup for BTreeMap<String, Value> {
    fn lookup(&self, tag: &str) -> Option<&Value> {
        self.get(tag)
    }
}

impl TagLookup for HashMap<String, Value> {
    fn lookup(&self, tag: &str) -> Option<&Value> {
        self.get(tag)
    }
}

impl TagLookup for serde_json::Map<String, Value> {
    fn lookup(&self, tag: &str) -> Option<&Value> {
        self.get(tag)
    }
}

/// @acp:summary "Compiled expression bound to its source string"
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluator {
    source: String,
    ast: Expr,
}

/// Compile an expression, failing with [`CheckmateError::Compile`] on bad syntax
pub fn compile(expr: &str) -> Result<Evaluator> {
    let ast = parser::parse(expr).map_err(|message| CheckmateError::Compile {
        expr: expr.to_string(),
        message,
    })?;
    Ok(Evaluator {
        source: expr.to_string(),
        ast,
    })
}

impl Evaluator {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate against a context; failures are [`CheckmateError::Eval`]
    pub fn evaluate(&self, ctx: &dyn TagLookup) -> Result<Value> {
        eval::eval(&self.ast, ctx).map_err(|message| CheckmateError::Eval {
            expr: self.source.clone(),
            message,
        })
    }
}

fn coerce_error(value: &Value, target: &'static str) -> CheckmateError {
    CheckmateError::Coerce {
        value: describe_value(value),
        target,
    }
}

/// Coerce an expression result to a boolean
pub fn coerce_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            _ => Err(coerce_error(value, "bool")),
        },
        _ => Err(coerce_error(value, "bool")),
    }
}

/// Coerce an expression result to an integer, rounding half away from zero
pub fn coerce_int(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            n.as_f64()
                .and_then(round_to_i64)
                .ok_or_else(|| coerce_error(value, "integer"))
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(round_to_i64))
                .ok_or_else(|| coerce_error(value, "integer"))
        }
        _ => Err(coerce_error(value, "integer")),
    }
}

/// 2^63; `i64::MAX as f64` rounds up to this value
const I64_UPPER_BOUND: f64 = 9.223372036854775808e18;

fn round_to_i64(f: f64) -> Option<i64> {
    let rounded = f.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < I64_UPPER_BOUND {
        Some(rounded as i64)
    } else {
        None
    }
}

/// Coerce an expression result to text
pub fn coerce_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(coerce_error(value, "string")),
    }
}

/// Coerce an expression result to a list of tags
pub fn coerce_tag_list(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(coerce_error(other, "tag")),
            })
            .collect(),
        _ => Err(coerce_error(value, "tag list")),
    }
}
