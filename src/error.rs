//! @acp:module "Errors"
//! @acp:summary "Crate-wide error taxonomy for loading, validation and rendering"
//! @acp:domain engine
//! @acp:layer model

use thiserror::Error;

/// @acp:summary "Errors produced by the checklist engine"
#[derive(Error, Debug)]
pub enum CheckmateError {
    /// Malformed bundle, missing `$ref` target or unknown feature type
    #[error("Schema error: {0}")]
    Schema(String),

    /// Expression could not be compiled
    #[error("Failed to compile expression {expr:?}: {message}")]
    Compile { expr: String, message: String },

    /// Expression failed at runtime
    #[error("Failed to evaluate expression {expr:?}: {message}")]
    Eval { expr: String, message: String },

    /// Expression result could not be converted to the requested type
    #[error("Cannot coerce {value} to {target}")]
    Coerce { value: String, target: &'static str },

    /// A value written to a feature does not fit its native type
    #[error("Type mismatch for {tag:?}: expected {expected}, got {found}")]
    TypeMismatch {
        tag: String,
        expected: &'static str,
        found: String,
    },

    /// The fixed-point validator hit its pass cap
    #[error("Validation did not converge after {0} passes")]
    Convergence(usize),

    /// External document converter failed
    #[error("Document conversion failed: {0}")]
    Conversion(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

impl CheckmateError {
    /// Build a type mismatch error from the offending JSON value
    pub fn type_mismatch(tag: &str, expected: &'static str, found: &serde_json::Value) -> Self {
        CheckmateError::TypeMismatch {
            tag: tag.to_string(),
            expected,
            found: describe_value(found),
        }
    }
}

/// Short human-readable description of a JSON value for error messages
pub(crate) fn describe_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(a) => format!("array of {}", a.len()),
        Value::Object(_) => "object".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, CheckmateError>;
