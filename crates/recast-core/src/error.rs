//! Error types for recast-core
//!
//! Three failure families exist, matching the phases a record type goes
//! through:
//!
//! - [`SchemaError`] - raised while a schema is being built; never recoverable
//!   at runtime
//! - [`ValidationErrors`] - raised while an instance is constructed or a field
//!   is assigned; carries every offending field found in one pass
//! - [`EncodeError`] - raised when JSON output hits a value no encoder handles

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Result type alias for recast-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Field path used for failures that are not tied to a single field
pub const ROOT: &str = "__root__";

/// Errors that can occur in recast-core
#[derive(Error, Debug)]
pub enum Error {
    /// Schema construction failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Instance validation failed
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// JSON encoding failed
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Failed to parse YAML schema document
    #[error("failed to parse schema document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Template rendering error
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while freezing a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two declarations share one name
    #[error("field '{field}' is declared more than once in '{model}'")]
    DuplicateField {
        /// Model being built
        model: String,
        /// Repeated field name
        field: String,
    },

    /// Two fields (or a field and a computed field) resolve to one external key
    #[error("alias '{alias}' in '{model}' resolves to both '{first}' and '{second}'")]
    AliasCollision {
        /// Model being built
        model: String,
        /// Colliding external key
        alias: String,
        /// Field that claimed the key first
        first: String,
        /// Field that claimed it second
        second: String,
    },

    /// A unit injects a sibling that is processed after the owning field
    #[error(
        "'{unit}' on field '{field}' of '{model}' depends on '{dependency}', which is declared after it"
    )]
    OrderingDependency {
        /// Model being built
        model: String,
        /// Field owning the unit
        field: String,
        /// Transform or validator name
        unit: String,
        /// Requested sibling
        dependency: String,
    },

    /// A unit injects a field that is not declared
    #[error("'{unit}' on field '{field}' of '{model}' depends on undeclared field '{dependency}'")]
    UnknownDependency {
        /// Model being built
        model: String,
        /// Field owning the unit
        field: String,
        /// Transform or validator name
        unit: String,
        /// Requested sibling
        dependency: String,
    },

    /// A bulk transform or validator targets a field that is not declared
    #[error("config of '{model}' targets undeclared field '{field}'")]
    UnknownField {
        /// Model being built
        model: String,
        /// Targeted name
        field: String,
    },

    /// A named transform or validator could not be materialized
    #[error("invalid {kind} '{name}': {message}")]
    InvalidUnit {
        /// `transform`, `validator` or `global validator`
        kind: &'static str,
        /// Unit name
        name: String,
        /// Description of the problem
        message: String,
    },

    /// A field descriptor has a malformed parameter combination
    #[error("invalid field '{field}' in '{model}': {message}")]
    InvalidField {
        /// Model being built
        model: String,
        /// Field name
        field: String,
        /// Description of the problem
        message: String,
    },

    /// A model reference could not be resolved
    #[error("unknown model '{name}' referenced by '{referrer}'")]
    UnknownModel {
        /// Referenced model
        name: String,
        /// Model holding the reference
        referrer: String,
    },

    /// A model was registered twice
    #[error("model '{name}' is already registered")]
    DuplicateModel {
        /// Model name
        name: String,
    },

    /// Model documents reference each other in a cycle
    #[error("cyclic model references between: {}", .models.join(", "))]
    CyclicModels {
        /// Models that could not be ordered
        models: Vec<String>,
    },
}

/// One offending field found during validation
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Field path, e.g. `email` or `employees[1].address.city`
    pub field: String,
    /// Value as seen by the failing step (post-transform where applicable)
    pub value: Value,
    /// Human readable description
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, value: Value, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value,
            message: message.into(),
        }
    }

    /// Qualify this error with the path of the containing field
    pub(crate) fn nested(mut self, prefix: &str) -> Self {
        self.field = if self.field == ROOT {
            prefix.to_string()
        } else if self.field.starts_with('[') {
            format!("{prefix}{}", self.field)
        } else {
            format!("{prefix}.{}", self.field)
        };
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (got {})", self.field, self.message, self.value)
    }
}

/// Aggregated validation failure for one model
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    /// Model that failed to validate
    pub model: String,
    /// Every offending field, in discovery order
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an aggregate from collected field errors
    pub fn new(model: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            model: model.into(),
            errors,
        }
    }

    /// Create an aggregate holding a single error
    pub fn single(
        model: impl Into<String>,
        field: impl Into<String>,
        value: Value,
        message: impl Into<String>,
    ) -> Self {
        Self::new(model, vec![FieldError::new(field, value, message)])
    }

    /// Paths of all offending fields
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// First error reported for `field`
    pub fn find(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// Number of offending entries
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when no entries were collected
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for {}", self.model)?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A value reached JSON output without any encoder able to represent it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot encode {kind} at '{path}' as JSON: {message}")]
pub struct EncodeError {
    /// Output path of the value
    pub path: String,
    /// Kind name of the offending value
    pub kind: String,
    /// Description of the problem
    pub message: String,
}
