//! Transform and validator units
//!
//! A unit is a named callable plus an optional bundle of fixed arguments and
//! a declared list of sibling fields it wants injected. Dependencies are
//! declared once, when the unit is created, and checked when the owning
//! schema is built; nothing inspects the callable at run time.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::value::{Mapping, Value};

/// Transform callable: value in, value out
pub type TransformFn = dyn Fn(Value, &Args<'_>) -> Result<Value, String> + Send + Sync;

/// Validator callable: `Ok(true)` passes, `Ok(false)` or `Err` fails
pub type ValidatorFn = dyn Fn(&Value, &Args<'_>) -> Result<bool, String> + Send + Sync;

/// Global validator callable over the full value mapping
pub type GlobalFn = dyn Fn(&Mapping) -> Result<bool, String> + Send + Sync;

static EMPTY: Lazy<Mapping> = Lazy::new(Mapping::new);

/// Sibling values a unit asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Injection {
    /// Only the value and fixed arguments
    #[default]
    None,
    /// Named sibling fields
    Fields(Vec<String>),
    /// Every value resolved so far
    AllValues,
}

impl Injection {
    /// Sibling fields named by this injection
    pub fn dependencies(&self) -> &[String] {
        match self {
            Injection::Fields(fields) => fields,
            _ => &[],
        }
    }
}

/// Arguments visible to a unit call
///
/// Fixed arguments shadow injected siblings of the same name.
pub struct Args<'a> {
    fixed: &'a Mapping,
    injected: Mapping,
    all_values: Option<&'a Mapping>,
}

impl<'a> Args<'a> {
    /// Arguments with nothing fixed and nothing injected
    pub fn empty() -> Args<'static> {
        Args {
            fixed: &EMPTY,
            injected: Mapping::new(),
            all_values: None,
        }
    }

    pub(crate) fn build(fixed: &'a Mapping, injection: &Injection, resolved: &'a Mapping) -> Self {
        let (injected, all_values) = match injection {
            Injection::None => (Mapping::new(), None),
            Injection::Fields(fields) => (
                fields
                    .iter()
                    .map(|f| (f.clone(), resolved.get(f).cloned().unwrap_or_default()))
                    .collect(),
                None,
            ),
            Injection::AllValues => (Mapping::new(), Some(resolved)),
        };
        Self {
            fixed,
            injected,
            all_values,
        }
    }

    /// Look up a fixed argument or injected sibling
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fixed.get(name).or_else(|| self.injected.get(name))
    }

    /// Look up an argument that must be present
    pub fn require(&self, name: &str) -> Result<&Value, String> {
        self.get(name)
            .ok_or_else(|| format!("missing argument '{name}'"))
    }

    /// Numeric argument, if present
    pub fn number(&self, name: &str) -> Result<Option<f64>, String> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("argument '{name}' must be a number, got {value}")),
        }
    }

    /// Non-negative integer argument
    pub fn usize(&self, name: &str) -> Result<usize, String> {
        match self.require(name)? {
            Value::Int(i) if *i >= 0 => Ok(*i as usize),
            other => Err(format!(
                "argument '{name}' must be a non-negative integer, got {other}"
            )),
        }
    }

    /// Every value resolved so far, for units created with
    /// [`Transform::inject_all_values`] or [`Validator::inject_all_values`]
    pub fn all_values(&self) -> Option<&Mapping> {
        self.all_values
    }
}

/// A named value-to-value function applied before validation
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
    args: Mapping,
    injection: Injection,
}

impl Transform {
    /// Create a transform from a fallible callable receiving [`Args`]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value, &Args<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            args: Mapping::new(),
            injection: Injection::None,
        }
    }

    /// Create an infallible transform that only looks at the value
    pub fn map<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::new(name, move |value, _| Ok(func(value)))
    }

    /// Add a fixed keyword argument
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Request a sibling field value as an argument
    pub fn inject(mut self, field: impl Into<String>) -> Self {
        self.injection = push_dependency(self.injection, field.into());
        self
    }

    /// Request every value resolved so far
    pub fn inject_all_values(mut self) -> Self {
        self.injection = Injection::AllValues;
        self
    }

    /// Transform name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed arguments
    pub fn args(&self) -> &Mapping {
        &self.args
    }

    /// Declared injection
    pub fn injection(&self) -> &Injection {
        &self.injection
    }

    pub(crate) fn apply(&self, value: Value, resolved: &Mapping) -> Result<Value, String> {
        let args = Args::build(&self.args, &self.injection, resolved);
        (self.func)(value, &args)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("injection", &self.injection)
            .finish()
    }
}

/// A named predicate applied after transforms
#[derive(Clone)]
pub struct Validator {
    name: String,
    func: Arc<ValidatorFn>,
    args: Mapping,
    injection: Injection,
    message: Option<String>,
}

impl Validator {
    /// Create a validator from a callable receiving [`Args`]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &Args<'_>) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            args: Mapping::new(),
            injection: Injection::None,
            message: None,
        }
    }

    /// Create a validator from a plain predicate
    pub fn check<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |value, _| Ok(func(value)))
    }

    /// Add a fixed keyword argument
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Request a sibling field value as an argument
    pub fn inject(mut self, field: impl Into<String>) -> Self {
        self.injection = push_dependency(self.injection, field.into());
        self
    }

    /// Request every value resolved so far
    pub fn inject_all_values(mut self) -> Self {
        self.injection = Injection::AllValues;
        self
    }

    /// Message reported when the predicate returns false
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Validator name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed arguments
    pub fn args(&self) -> &Mapping {
        &self.args
    }

    /// Declared injection
    pub fn injection(&self) -> &Injection {
        &self.injection
    }

    pub(crate) fn apply(&self, value: &Value, resolved: &Mapping) -> Result<(), String> {
        let args = Args::build(&self.args, &self.injection, resolved);
        match (self.func)(value, &args) {
            Ok(true) => Ok(()),
            Ok(false) => Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("failed validator '{}'", self.name))),
            Err(message) => Err(message),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("injection", &self.injection)
            .finish()
    }
}

/// A cross-field check run after every field and bulk unit
#[derive(Clone)]
pub struct GlobalValidator {
    name: String,
    func: Arc<GlobalFn>,
    message: Option<String>,
}

impl GlobalValidator {
    /// Create a global validator from a fallible callable
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Mapping) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            message: None,
        }
    }

    /// Create a global validator from a plain predicate
    pub fn check<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Mapping) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |values| Ok(func(values)))
    }

    /// Message reported when the predicate returns false
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Validator name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&self, values: &Mapping) -> Result<(), String> {
        match (self.func)(values) {
            Ok(true) => Ok(()),
            Ok(false) => Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("failed global validator '{}'", self.name))),
            Err(message) => Err(format!("global validator '{}': {message}", self.name)),
        }
    }
}

impl fmt::Debug for GlobalValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalValidator")
            .field("name", &self.name)
            .finish()
    }
}

fn push_dependency(injection: Injection, field: String) -> Injection {
    match injection {
        Injection::Fields(mut fields) => {
            if !fields.contains(&field) {
                fields.push(field);
            }
            Injection::Fields(fields)
        }
        _ => Injection::Fields(vec![field]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::mapping;
    use serde_json::json;

    #[test]
    fn test_fixed_args_shadow_injected_values() {
        let resolved = mapping(json!({"limit": 3, "other": 1}));
        let fixed = mapping(json!({"limit": 10}));
        let args = Args::build(
            &fixed,
            &Injection::Fields(vec!["limit".into(), "other".into()]),
            &resolved,
        );
        assert_eq!(args.get("limit"), Some(&Value::Int(10)));
        assert_eq!(args.get("other"), Some(&Value::Int(1)));
        assert!(args.all_values().is_none());
    }

    #[test]
    fn test_missing_dependency_injects_null() {
        let resolved = Mapping::new();
        let fixed = Mapping::new();
        let args = Args::build(&fixed, &Injection::Fields(vec!["gone".into()]), &resolved);
        assert_eq!(args.get("gone"), Some(&Value::Null));
    }

    #[test]
    fn test_transform_with_args() {
        let truncate = Transform::new("truncate", |value, args| {
            let length = args.usize("length")?;
            let text = value.as_str().unwrap_or_default();
            Ok(Value::from(text.chars().take(length).collect::<String>()))
        })
        .arg("length", 3);
        let out = truncate.apply(Value::from("abcdef"), &Mapping::new()).unwrap();
        assert_eq!(out, Value::from("abc"));
    }

    #[test]
    fn test_validator_false_uses_custom_message() {
        let positive = Validator::check("positive", |v| v.as_i64().is_some_and(|i| i > 0))
            .message("must be positive");
        assert!(positive.apply(&Value::Int(1), &Mapping::new()).is_ok());
        assert_eq!(
            positive.apply(&Value::Int(-1), &Mapping::new()).unwrap_err(),
            "must be positive"
        );
    }

    #[test]
    fn test_validator_error_message_passes_through() {
        let failing = Validator::new("boom", |_, _| Err("exploded".to_string()));
        assert_eq!(
            failing.apply(&Value::Null, &Mapping::new()).unwrap_err(),
            "exploded"
        );
    }

    #[test]
    fn test_inject_accumulates_dependencies() {
        let unit = Validator::check("x", |_| true).inject("a").inject("b").inject("a");
        assert_eq!(unit.injection().dependencies(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_inject_all_values_exposes_mapping() {
        let resolved = mapping(json!({"a": 1}));
        let unit = Transform::new("sum", |value, args| {
            let base = args.all_values().and_then(|m| m.get("a")).and_then(Value::as_i64);
            Ok(Value::Int(value.as_i64().unwrap_or(0) + base.unwrap_or(0)))
        })
        .inject_all_values();
        assert_eq!(unit.apply(Value::Int(2), &resolved).unwrap(), Value::Int(3));
    }
}
