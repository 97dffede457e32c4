//! Builtin transforms, validators and alias generators
//!
//! Every builtin is available both as a typed constructor for Rust callers
//! and by name through [`transform`] and [`validator`], which schema
//! documents use. Argument problems are reported when the unit is built.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;

use crate::error::SchemaError;
use crate::unit::{Transform, Validator};
use crate::value::{Mapping, Value};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Names accepted by [`transform`]
pub const TRANSFORMS: &[&str] = &[
    "trim",
    "lower",
    "upper",
    "capitalize",
    "collapse_whitespace",
    "truncate",
    "clamp",
    "round",
    "abs",
];

/// Names accepted by [`validator`]
pub const VALIDATORS: &[&str] = &[
    "non_empty",
    "email",
    "min_length",
    "max_length",
    "range",
    "pattern",
    "one_of",
    "equals_field",
];

fn text(name: &'static str, op: fn(&str) -> String) -> Transform {
    Transform::new(name, move |value, _| match value {
        Value::Str(s) => Ok(Value::Str(op(&s))),
        Value::Null => Ok(Value::Null),
        other => Err(format!("expected string, got {}", other.kind_name())),
    })
}

/// Strip leading and trailing whitespace
pub fn trim() -> Transform {
    text("trim", |s| s.trim().to_string())
}

/// Lower-case text
pub fn lower() -> Transform {
    text("lower", str::to_lowercase)
}

/// Upper-case text
pub fn upper() -> Transform {
    text("upper", str::to_uppercase)
}

/// Upper-case the first character, lower-case the rest
pub fn capitalize() -> Transform {
    text("capitalize", |s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    })
}

/// Replace every whitespace run with a single space
pub fn collapse_whitespace() -> Transform {
    text("collapse_whitespace", |s| {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    })
}

/// Keep at most `length` characters
pub fn truncate(length: usize) -> Transform {
    Transform::new("truncate", move |value, _| match value {
        Value::Str(s) => Ok(Value::Str(s.chars().take(length).collect())),
        Value::Null => Ok(Value::Null),
        other => Err(format!("expected string, got {}", other.kind_name())),
    })
    .arg("length", length as i64)
}

/// Bound a number to `[min, max]`; either bound may be open
pub fn clamp(min: Option<f64>, max: Option<f64>) -> Transform {
    let unit = Transform::new("clamp", move |value, _| {
        let Some(number) = value.as_f64() else {
            return match value {
                Value::Null => Ok(Value::Null),
                other => Err(format!("expected number, got {}", other.kind_name())),
            };
        };
        let bounded = match (min, max) {
            (Some(lo), _) if number < lo => lo,
            (_, Some(hi)) if number > hi => hi,
            _ => return Ok(value),
        };
        Ok(match value {
            Value::Int(_) if bounded.fract() == 0.0 => Value::Int(bounded as i64),
            Value::Decimal(_) => rust_decimal::Decimal::try_from(bounded)
                .map(Value::Decimal)
                .unwrap_or(Value::Float(bounded)),
            _ => Value::Float(bounded),
        })
    });
    with_bounds(unit, min, max, |unit, key, value| unit.arg(key, value))
}

/// Round to `digits` decimal places
pub fn round(digits: u32) -> Transform {
    Transform::new("round", move |value, _| match value {
        Value::Float(f) => {
            let exponent = i32::try_from(digits).unwrap_or(i32::MAX).min(f64::MAX_10_EXP);
            let scale = 10f64.powi(exponent);
            let scaled = f * scale;
            // no representable digits at that place
            if !scaled.is_finite() {
                return Ok(Value::Float(f));
            }
            Ok(Value::Float(scaled.round() / scale))
        }
        Value::Decimal(d) => Ok(Value::Decimal(d.round_dp(digits))),
        Value::Int(_) | Value::Null => Ok(value),
        other => Err(format!("expected number, got {}", other.kind_name())),
    })
    .arg("digits", i64::from(digits))
}

/// Absolute value
pub fn abs() -> Transform {
    Transform::new("abs", |value, _| match value {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| format!("absolute value of {i} overflows")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
        Value::Null => Ok(Value::Null),
        other => Err(format!("expected number, got {}", other.kind_name())),
    })
}

/// Reject null, empty text and empty containers
pub fn non_empty() -> Validator {
    Validator::check("non_empty", |value| match value {
        Value::Null => false,
        other => other.len().is_none_or(|n| n > 0),
    })
    .message("must not be empty")
}

/// Require a plausible e-mail address
pub fn email() -> Validator {
    Validator::check("email", |value| {
        value.as_str().is_some_and(|s| EMAIL.is_match(s))
    })
    .message("invalid email address")
}

fn length_of(value: &Value) -> Result<usize, String> {
    value
        .len()
        .ok_or_else(|| format!("expected text, list or map, got {}", value.kind_name()))
}

/// Require at least `min` characters or items
pub fn min_length(min: usize) -> Validator {
    Validator::new("min_length", move |value, _| Ok(length_of(value)? >= min))
        .arg("min", min as i64)
        .message(format!("length must be at least {min}"))
}

/// Allow at most `max` characters or items
pub fn max_length(max: usize) -> Validator {
    Validator::new("max_length", move |value, _| Ok(length_of(value)? <= max))
        .arg("max", max as i64)
        .message(format!("length must be at most {max}"))
}

/// Require a number within `[min, max]`; either bound may be open
pub fn range(min: Option<f64>, max: Option<f64>) -> Validator {
    let message = match (min, max) {
        (Some(lo), Some(hi)) => format!("must be between {lo} and {hi}"),
        (Some(lo), None) => format!("must be at least {lo}"),
        (None, Some(hi)) => format!("must be at most {hi}"),
        (None, None) => "must be a number".to_string(),
    };
    let unit = Validator::new("range", move |value, _| {
        let number = value
            .as_f64()
            .ok_or_else(|| format!("expected number, got {}", value.kind_name()))?;
        Ok(min.is_none_or(|lo| number >= lo) && max.is_none_or(|hi| number <= hi))
    })
    .message(message);
    with_bounds(unit, min, max, |unit, key, value| unit.arg(key, value))
}

/// Require text matching a regular expression
pub fn pattern(regex: &str) -> Result<Validator, SchemaError> {
    let compiled = Regex::new(regex).map_err(|err| SchemaError::InvalidUnit {
        kind: "validator",
        name: "pattern".to_string(),
        message: err.to_string(),
    })?;
    Ok(Validator::check("pattern", move |value| {
        value.as_str().is_some_and(|s| compiled.is_match(s))
    })
    .arg("regex", regex)
    .message(format!("does not match pattern '{regex}'")))
}

/// Require one of the listed values
pub fn one_of<I, V>(values: I) -> Validator
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let allowed: Vec<Value> = values.into_iter().map(Into::into).collect();
    let message = format!("must be one of {}", Value::List(allowed.clone()));
    let check = allowed.clone();
    Validator::check("one_of", move |value| check.contains(value))
        .arg("values", Value::List(allowed))
        .message(message)
}

/// Require the same value as a sibling field declared earlier
pub fn equals_field(field: impl Into<String>) -> Validator {
    let field = field.into();
    let message = format!("must equal field '{field}'");
    let sibling = field.clone();
    Validator::new("equals_field", move |value, args| {
        Ok(args.get(&sibling) == Some(value))
    })
    .inject(field)
    .message(message)
}

fn with_bounds<U>(unit: U, min: Option<f64>, max: Option<f64>, arg: fn(U, String, Value) -> U) -> U {
    let unit = match min {
        Some(lo) => arg(unit, "min".to_string(), Value::Float(lo)),
        None => unit,
    };
    match max {
        Some(hi) => arg(unit, "max".to_string(), Value::Float(hi)),
        None => unit,
    }
}

/// Look up a builtin transform by name
///
/// # Errors
///
/// Returns `SchemaError::InvalidUnit` for unknown names, unexpected
/// arguments and malformed argument values.
pub fn transform(name: &str, args: &Mapping) -> Result<Transform, SchemaError> {
    let args = UnitArgs::new("transform", name, args);
    let unit = match name {
        "trim" => args.none().map(|()| trim())?,
        "lower" => args.none().map(|()| lower())?,
        "upper" => args.none().map(|()| upper())?,
        "capitalize" => args.none().map(|()| capitalize())?,
        "collapse_whitespace" => args.none().map(|()| collapse_whitespace())?,
        "abs" => args.none().map(|()| abs())?,
        "truncate" => {
            args.only(&["length"])?;
            truncate(args.usize("length")?)
        }
        "clamp" => {
            args.only(&["min", "max"])?;
            clamp(args.number("min")?, args.number("max")?)
        }
        "round" => {
            args.only(&["digits"])?;
            let digits = u32::try_from(args.usize("digits")?)
                .map_err(|_| args.invalid("argument 'digits' is too large"))?;
            round(digits)
        }
        _ => return Err(args.invalid(&format!("unknown transform (expected one of: {})", TRANSFORMS.join(", ")))),
    };
    Ok(unit)
}

/// Look up a builtin validator by name
///
/// # Errors
///
/// Returns `SchemaError::InvalidUnit` for unknown names, unexpected
/// arguments and malformed argument values, including invalid regexes.
pub fn validator(name: &str, args: &Mapping) -> Result<Validator, SchemaError> {
    let args = UnitArgs::new("validator", name, args);
    let unit = match name {
        "non_empty" => args.none().map(|()| non_empty())?,
        "email" => args.none().map(|()| email())?,
        "min_length" => {
            args.only(&["min"])?;
            min_length(args.usize("min")?)
        }
        "max_length" => {
            args.only(&["max"])?;
            max_length(args.usize("max")?)
        }
        "range" => {
            args.only(&["min", "max"])?;
            range(args.number("min")?, args.number("max")?)
        }
        "pattern" => {
            args.only(&["regex"])?;
            pattern(args.string("regex")?)?
        }
        "one_of" => {
            args.only(&["values"])?;
            match args.get("values") {
                Some(Value::List(values)) => one_of(values.iter().cloned()),
                _ => return Err(args.invalid("argument 'values' must be a list")),
            }
        }
        "equals_field" => {
            args.only(&["field"])?;
            equals_field(args.string("field")?)
        }
        _ => return Err(args.invalid(&format!("unknown validator (expected one of: {})", VALIDATORS.join(", ")))),
    };
    Ok(unit)
}

struct UnitArgs<'a> {
    kind: &'static str,
    name: &'a str,
    args: &'a Mapping,
}

impl<'a> UnitArgs<'a> {
    fn new(kind: &'static str, name: &'a str, args: &'a Mapping) -> Self {
        Self { kind, name, args }
    }

    fn invalid(&self, message: &str) -> SchemaError {
        SchemaError::InvalidUnit {
            kind: self.kind,
            name: self.name.to_string(),
            message: message.to_string(),
        }
    }

    fn none(&self) -> Result<(), SchemaError> {
        self.only(&[])
    }

    fn only(&self, allowed: &[&str]) -> Result<(), SchemaError> {
        match self.args.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(self.invalid(&format!("unexpected argument '{key}'"))),
            None => Ok(()),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.args.get(key)
    }

    fn usize(&self, key: &str) -> Result<usize, SchemaError> {
        match self.get(key) {
            Some(Value::Int(i)) => usize::try_from(*i)
                .map_err(|_| self.invalid(&format!("argument '{key}' must not be negative"))),
            Some(other) => Err(self.invalid(&format!("argument '{key}' must be an integer, got {other}"))),
            None => Err(self.invalid(&format!("missing argument '{key}'"))),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>, SchemaError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Decimal(d)) => Ok(d.to_f64()),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(&format!("argument '{key}' must be a number, got {value}"))),
        }
    }

    fn string(&self, key: &str) -> Result<&'a str, SchemaError> {
        match self.get(key) {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(self.invalid(&format!("argument '{key}' must be a string, got {other}"))),
            None => Err(self.invalid(&format!("missing argument '{key}'"))),
        }
    }
}

fn words(name: &str) -> impl Iterator<Item = &str> {
    name.split(['_', '-', ' ']).filter(|w| !w.is_empty())
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// `user_name` -> `userName`
pub fn to_camel(name: &str) -> String {
    let mut parts = words(name);
    let mut out = parts.next().unwrap_or_default().to_string();
    for word in parts {
        out.push_str(&title(word));
    }
    out
}

/// `user_name` -> `UserName`
pub fn to_pascal(name: &str) -> String {
    words(name).map(title).collect()
}

/// `user_name` -> `user-name`
pub fn to_kebab(name: &str) -> String {
    words(name).collect::<Vec<_>>().join("-")
}
