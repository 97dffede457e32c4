//! Computed fields
//!
//! Read-only values derived from an instance. They never accept input and are
//! evaluated again on every serialization call.

use std::fmt;
use std::sync::Arc;

use crate::instance::Instance;
use crate::value::Value;

/// Evaluator of a computed field
pub type ComputeFn = dyn Fn(&Instance) -> Value + Send + Sync;

/// A derived, read-only field
#[derive(Clone)]
pub struct ComputedField {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    func: Arc<ComputeFn>,
}

impl ComputedField {
    /// Register an evaluator under `name`
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Instance) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            alias: None,
            func: Arc::new(func),
        }
    }

    /// External name used in serialized output
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used in serialized output
    pub fn serialization_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Evaluate against an instance
    pub fn evaluate(&self, instance: &Instance) -> Value {
        (self.func)(instance)
    }
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .finish()
    }
}
