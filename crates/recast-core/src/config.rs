//! Per-type configuration
//!
//! A [`Config`] is resolved once, when its schema is built, and shared
//! read-only by every instance of that schema.
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_core::{builtins, AliasStyle, Config, ExtraFieldsMode, GlobalValidator};
//!
//! let config = Config::new()
//!     .alias_style(AliasStyle::Camel)
//!     .apply_transforms(["email", "username"], vec![builtins::trim(), builtins::lower()])
//!     .global_validator(GlobalValidator::check("admins_are_adults", |v| {
//!         v["role"].as_str() != Some("admin") || v["age"].as_i64() >= Some(18)
//!     }))
//!     .extra_fields_mode(ExtraFieldsMode::Strict);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builtins;
use crate::unit::{GlobalValidator, Transform, Validator};
use crate::value::Value;

/// Alias generator callable
pub type AliasFn = dyn Fn(&str) -> String + Send + Sync;

/// Encoder callable; `None` hands the value to the next encoder in the chain
pub type EncoderFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

/// Handling of input keys that match no declared field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFieldsMode {
    /// Keep unknown keys in the instance's extras
    #[default]
    Store,
    /// Reject construction when unknown keys are present
    Strict,
    /// Drop unknown keys silently
    Ignore,
}

/// Builtin alias generators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AliasStyle {
    /// `user_name` -> `userName`
    Camel,
    /// `user_name` -> `UserName`
    Pascal,
    /// `user_name` -> `user-name`
    Kebab,
}

impl AliasStyle {
    /// Apply the style to a declared name
    pub fn apply(self, name: &str) -> String {
        match self {
            AliasStyle::Camel => builtins::to_camel(name),
            AliasStyle::Pascal => builtins::to_pascal(name),
            AliasStyle::Kebab => builtins::to_kebab(name),
        }
    }
}

/// Fallback serializer for values JSON cannot represent natively
#[derive(Clone)]
pub struct Encoder {
    func: Arc<EncoderFn>,
}

impl Encoder {
    /// Wrap an encoder callable
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Try to encode `value`
    pub fn encode(&self, value: &Value) -> Option<Value> {
        (self.func)(value)
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Encoder")
    }
}

/// Bulk units applied to a set of fields
#[derive(Debug, Clone)]
pub struct BulkRule<U> {
    /// Target fields, by declared name
    pub fields: Vec<String>,
    /// Units applied to every target, in order
    pub units: Vec<U>,
}

/// Per-type settings
#[derive(Clone, Default)]
pub struct Config {
    pub(crate) alias_generator: Option<Arc<AliasFn>>,
    pub(crate) apply_transforms: Vec<BulkRule<Transform>>,
    pub(crate) apply_validators: Vec<BulkRule<Validator>>,
    pub(crate) global_validators: Vec<GlobalValidator>,
    pub(crate) extra_fields_mode: ExtraFieldsMode,
    pub(crate) json_encoder: Option<Encoder>,
}

impl Config {
    /// Default configuration: no aliases, no bulk units, unknown keys stored
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate aliases for fields without an explicit one
    pub fn alias_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.alias_generator = Some(Arc::new(generator));
        self
    }

    /// Generate aliases with a builtin style
    pub fn alias_style(self, style: AliasStyle) -> Self {
        self.alias_generator(move |name| style.apply(name))
    }

    /// Apply transforms to every named field, after its own chain
    pub fn apply_transforms<I, S>(mut self, fields: I, transforms: Vec<Transform>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_transforms.push(BulkRule {
            fields: fields.into_iter().map(Into::into).collect(),
            units: transforms,
        });
        self
    }

    /// Apply validators to every named field, after its own chain
    pub fn apply_validators<I, S>(mut self, fields: I, validators: Vec<Validator>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_validators.push(BulkRule {
            fields: fields.into_iter().map(Into::into).collect(),
            units: validators,
        });
        self
    }

    /// Add a cross-field validator
    pub fn global_validator(mut self, validator: GlobalValidator) -> Self {
        self.global_validators.push(validator);
        self
    }

    /// Choose how unknown input keys are handled
    pub fn extra_fields_mode(mut self, mode: ExtraFieldsMode) -> Self {
        self.extra_fields_mode = mode;
        self
    }

    /// Fallback encoder for JSON output
    pub fn json_encoder(mut self, encoder: Encoder) -> Self {
        self.json_encoder = Some(encoder);
        self
    }

    /// Unknown-key policy
    pub fn extra_mode(&self) -> ExtraFieldsMode {
        self.extra_fields_mode
    }

    /// Configured JSON encoder
    pub fn encoder(&self) -> Option<&Encoder> {
        self.json_encoder.as_ref()
    }

    /// Cross-field validators, in order
    pub fn global_validators(&self) -> &[GlobalValidator] {
        &self.global_validators
    }

    pub(crate) fn generate_alias(&self, name: &str) -> Option<String> {
        self.alias_generator
            .as_ref()
            .map(|generator| generator(name))
            .filter(|alias| alias != name)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("alias_generator", &self.alias_generator.is_some())
            .field("apply_transforms", &self.apply_transforms)
            .field("apply_validators", &self.apply_validators)
            .field("global_validators", &self.global_validators)
            .field("extra_fields_mode", &self.extra_fields_mode)
            .field("json_encoder", &self.json_encoder.is_some())
            .finish()
    }
}
