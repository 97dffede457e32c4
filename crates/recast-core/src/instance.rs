//! Validated record instances

use std::fmt;

use crate::schema::Schema;
use crate::serialize::MappingOptions;
use crate::value::{Mapping, Value};

/// Unknown input keys, as kept by the schema's extra-fields mode
#[derive(Debug, Clone, PartialEq)]
pub enum Extras {
    /// `store` mode: unknown keys and their raw values
    Stored(Mapping),
    /// `ignore` mode: unknown keys were dropped
    Ignored,
    /// `strict` mode: unknown keys are rejected, so there are none
    Rejected,
}

/// A record whose every declared field holds a validated value
#[derive(Clone)]
pub struct Instance {
    pub(crate) schema: Schema,
    pub(crate) values: Mapping,
    pub(crate) extras: Extras,
}

impl Instance {
    /// Schema this instance was constructed from
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Stored value of a declared field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Evaluate a computed field
    pub fn computed(&self, name: &str) -> Option<Value> {
        self.schema
            .computed_field(name)
            .map(|field| field.evaluate(self))
    }

    /// Declared field values keyed by declared name, in declaration order
    pub fn values(&self) -> &Mapping {
        &self.values
    }

    /// Extra-fields record
    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    /// Stored unknown key, in `store` mode
    pub fn extra(&self, key: &str) -> Option<&Value> {
        match &self.extras {
            Extras::Stored(map) => map.get(key),
            _ => None,
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        let options = MappingOptions::default();
        self.schema.same_as(&other.schema)
            && self.to_mapping_with(&options) == other.to_mapping_with(&options)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
