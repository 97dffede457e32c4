//! Container, nested-model and primitive kind coercion
//!
//! Runs before a field's transform chain. Scalars are converted to the
//! declared kind; sequences, mappings and nested records are walked
//! recursively and every offending element is reported under an
//! index-bearing path such as `employees[1].address.city`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::FieldError;
use crate::field::{FieldKind, ListSpec, MapSpec};
use crate::schema::Schema;
use crate::value::{Mapping, Value};

/// Coerce `value` to `kind`, reporting failures under `path`
///
/// `context` holds the sibling values resolved so far; item and value
/// validators with injected dependencies read from it.
pub(crate) fn coerce(
    kind: &FieldKind,
    value: Value,
    path: &str,
    context: &Mapping,
) -> Result<Value, Vec<FieldError>> {
    match kind {
        FieldKind::Any => Ok(value),
        FieldKind::List(spec) => coerce_list(spec, value, path, context),
        FieldKind::Map(spec) => coerce_map(spec, value, path, context),
        FieldKind::Model(schema) => coerce_model(schema, value, path),
        scalar => {
            coerce_scalar(scalar, &value).map_err(|message| vec![FieldError::new(path, value, message)])
        }
    }
}

/// Convert a scalar value to a primitive kind
pub fn coerce_scalar(kind: &FieldKind, value: &Value) -> Result<Value, String> {
    let converted = match kind {
        FieldKind::Str => to_str(value),
        FieldKind::Int => to_int(value),
        FieldKind::Float => to_float(value),
        FieldKind::Bool => to_bool(value),
        FieldKind::Decimal => to_decimal(value),
        FieldKind::Date => to_date(value),
        FieldKind::DateTime => to_datetime(value),
        FieldKind::Any => Some(value.clone()),
        container => {
            return Err(format!(
                "expected {}, got {}",
                container.name(),
                value.kind_name()
            ));
        }
    };
    converted.ok_or_else(|| match value {
        Value::Null => format!("expected {}, got null", kind.name()),
        other => format!("cannot convert {other} to {}", kind.name()),
    })
}

fn to_str(value: &Value) -> Option<Value> {
    match value {
        Value::Str(_) => Some(value.clone()),
        Value::Int(i) => Some(Value::Str(i.to_string())),
        Value::Float(f) => Some(Value::Str(f.to_string())),
        Value::Bool(b) => Some(Value::Str(b.to_string())),
        Value::Decimal(d) => Some(Value::Str(d.to_string())),
        Value::Date(d) => Some(Value::Str(d.format("%Y-%m-%d").to_string())),
        Value::DateTime(dt) => Some(Value::Str(dt.to_rfc3339())),
        _ => None,
    }
}

fn to_int(value: &Value) -> Option<Value> {
    let int = match value {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        Value::Float(f) if f.is_finite() => f.trunc().to_i64()?,
        Value::Decimal(d) => d.trunc().to_i64()?,
        Value::Str(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(Value::Int(int))
}

fn to_float(value: &Value) -> Option<Value> {
    let float = match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Decimal(d) => d.to_f64()?,
        Value::Str(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(Value::Float(float))
}

fn to_bool(value: &Value) -> Option<Value> {
    let boolean = match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Decimal(d) => !d.is_zero(),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" | "t" | "enabled" => true,
            "false" | "no" | "n" | "0" | "off" | "f" | "disabled" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Value::Bool(boolean))
}

fn to_decimal(value: &Value) -> Option<Value> {
    let decimal = match value {
        Value::Decimal(d) => *d,
        Value::Int(i) => Decimal::from(*i),
        Value::Float(f) if f.is_finite() => Decimal::from_f64(*f)?,
        Value::Str(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()?
        }
        _ => return None,
    };
    Some(Value::Decimal(decimal))
}

fn to_date(value: &Value) -> Option<Value> {
    let date = match value {
        Value::Date(d) => *d,
        Value::DateTime(dt) => dt.date_naive(),
        Value::Str(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?,
        _ => return None,
    };
    Some(Value::Date(date))
}

fn to_datetime(value: &Value) -> Option<Value> {
    let datetime = match value {
        Value::DateTime(dt) => *dt,
        Value::Date(d) => d.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset(),
        Value::Str(s) => {
            let s = s.trim();
            match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => dt,
                Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()?
                    .and_utc()
                    .fixed_offset(),
            }
        }
        _ => return None,
    };
    Some(Value::DateTime(datetime))
}

fn coerce_list(
    spec: &ListSpec,
    value: Value,
    path: &str,
    context: &Mapping,
) -> Result<Value, Vec<FieldError>> {
    let items = match value {
        Value::List(items) => items,
        other => {
            let message = format!("expected list, got {}", other.kind_name());
            return Err(vec![FieldError::new(path, other, message)]);
        }
    };

    if let Some(min) = spec.min_length {
        if items.len() < min {
            let message = format!("expected at least {min} items, got {}", items.len());
            return Err(vec![FieldError::new(path, Value::List(items), message)]);
        }
    }
    if let Some(max) = spec.max_length {
        if items.len() > max {
            let message = format!("expected at most {max} items, got {}", items.len());
            return Err(vec![FieldError::new(path, Value::List(items), message)]);
        }
    }

    let mut errors = Vec::new();
    let mut coerced = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let item_path = format!("{path}[{index}]");
        let item = match &spec.item_type {
            Some(kind) => match coerce(kind, item, &item_path, context) {
                Ok(item) => item,
                Err(mut item_errors) => {
                    errors.append(&mut item_errors);
                    continue;
                }
            },
            None => item,
        };
        if let Some(validator) = &spec.item_validator {
            if let Err(message) = validator.apply(&item, context) {
                errors.push(FieldError::new(item_path, item, message));
                continue;
            }
        }
        coerced.push(item);
    }

    if errors.is_empty() {
        Ok(Value::List(coerced))
    } else {
        Err(errors)
    }
}

fn coerce_map(
    spec: &MapSpec,
    value: Value,
    path: &str,
    context: &Mapping,
) -> Result<Value, Vec<FieldError>> {
    let entries = match value {
        Value::Map(entries) => entries,
        other => {
            let message = format!("expected map, got {}", other.kind_name());
            return Err(vec![FieldError::new(path, other, message)]);
        }
    };

    let mut errors = Vec::new();
    let mut coerced = Mapping::with_capacity(entries.len());
    for (key, entry) in entries {
        let entry_path = format!("{path}['{key}']");
        if let Some(key_kind) = &spec.key_type {
            if let Err(message) = coerce_scalar(key_kind, &Value::Str(key.clone())) {
                errors.push(FieldError::new(
                    entry_path,
                    Value::Str(key),
                    format!("invalid key: {message}"),
                ));
                continue;
            }
        }
        let entry = match &spec.value_type {
            Some(kind) => match coerce(kind, entry, &entry_path, context) {
                Ok(entry) => entry,
                Err(mut entry_errors) => {
                    errors.append(&mut entry_errors);
                    continue;
                }
            },
            None => entry,
        };
        if let Some(validator) = &spec.value_validator {
            if let Err(message) = validator.apply(&entry, context) {
                errors.push(FieldError::new(entry_path, entry, message));
                continue;
            }
        }
        coerced.insert(key, entry);
    }

    if errors.is_empty() {
        Ok(Value::Map(coerced))
    } else {
        Err(errors)
    }
}

fn coerce_model(schema: &Schema, value: Value, path: &str) -> Result<Value, Vec<FieldError>> {
    schema
        .validate_value(value)
        .map(Value::from)
        .map_err(|failure| {
            failure
                .errors
                .into_iter()
                .map(|error| error.nested(path))
                .collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::unit::Validator;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::int_from_str(FieldKind::Int, Value::from(" 42 "), Value::Int(42))]
    #[case::int_from_float(FieldKind::Int, Value::from(3.9), Value::Int(3))]
    #[case::int_from_negative_float(FieldKind::Int, Value::from(-3.9), Value::Int(-3))]
    #[case::int_from_bool(FieldKind::Int, Value::from(true), Value::Int(1))]
    #[case::float_from_int(FieldKind::Float, Value::from(2), Value::Float(2.0))]
    #[case::float_from_str(FieldKind::Float, Value::from("2.5"), Value::Float(2.5))]
    #[case::str_from_int(FieldKind::Str, Value::from(7), Value::from("7"))]
    #[case::str_from_bool(FieldKind::Str, Value::from(false), Value::from("false"))]
    #[case::bool_yes(FieldKind::Bool, Value::from("Yes"), Value::Bool(true))]
    #[case::bool_off(FieldKind::Bool, Value::from("off"), Value::Bool(false))]
    #[case::bool_enabled(FieldKind::Bool, Value::from("ENABLED"), Value::Bool(true))]
    #[case::bool_from_zero(FieldKind::Bool, Value::from(0), Value::Bool(false))]
    #[case::decimal_from_str(FieldKind::Decimal, Value::from("19.99"), Value::Decimal(Decimal::new(1999, 2)))]
    #[case::decimal_from_int(FieldKind::Decimal, Value::from(5), Value::Decimal(Decimal::from(5)))]
    #[case::date_from_str(
        FieldKind::Date,
        Value::from("2024-02-29"),
        Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    )]
    fn test_scalar_coercion(#[case] kind: FieldKind, #[case] input: Value, #[case] expected: Value) {
        assert_eq!(coerce_scalar(&kind, &input).unwrap(), expected);
    }

    #[rstest]
    #[case::int_from_word(FieldKind::Int, Value::from("abc"))]
    #[case::int_from_list(FieldKind::Int, Value::List(vec![]))]
    #[case::bool_from_word(FieldKind::Bool, Value::from("maybe"))]
    #[case::date_from_garbage(FieldKind::Date, Value::from("29/02/2024"))]
    #[case::str_from_map(FieldKind::Str, Value::Map(Mapping::new()))]
    #[case::str_from_null(FieldKind::Str, Value::Null)]
    fn test_scalar_coercion_failures(#[case] kind: FieldKind, #[case] input: Value) {
        assert!(coerce_scalar(&kind, &input).is_err());
    }

    #[test]
    fn test_int_failure_message() {
        let err = coerce_scalar(&FieldKind::Int, &Value::from("abc")).unwrap_err();
        assert_eq!(err, "cannot convert \"abc\" to int");
    }

    #[test]
    fn test_datetime_accepts_rfc3339_and_naive() {
        let aware = coerce_scalar(&FieldKind::DateTime, &Value::from("2024-01-02T03:04:05+02:00")).unwrap();
        let naive = coerce_scalar(&FieldKind::DateTime, &Value::from("2024-01-02T01:04:05")).unwrap();
        assert_eq!(aware, naive);
    }

    #[test]
    fn test_list_items_are_coerced_and_errors_aggregated() {
        let kind = FieldKind::List(ListSpec::new().item_type(FieldKind::Int));
        let out = coerce(&kind, Value::from(json!(["1", 2, 3.5])), "ids", &Mapping::new()).unwrap();
        assert_eq!(out, Value::from(json!([1, 2, 3])));

        let errors = coerce(&kind, Value::from(json!(["x", 2, "y"])), "ids", &Mapping::new()).unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(paths, vec!["ids[0]", "ids[2]"]);
    }

    #[test]
    fn test_list_length_bounds() {
        let kind = FieldKind::List(ListSpec::new().min_length(1).max_length(2));
        assert!(coerce(&kind, Value::from(json!([])), "tags", &Mapping::new()).is_err());
        assert!(coerce(&kind, Value::from(json!([1, 2, 3])), "tags", &Mapping::new()).is_err());
        assert!(coerce(&kind, Value::from(json!([1])), "tags", &Mapping::new()).is_ok());
    }

    #[test]
    fn test_item_validator_runs_after_coercion() {
        let kind = FieldKind::List(
            ListSpec::new()
                .item_type(FieldKind::Int)
                .item_validator(Validator::check("positive", |v| v.as_i64() > Some(0))),
        );
        let errors = coerce(&kind, Value::from(json!(["5", "-1"])), "scores", &Mapping::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "scores[1]");
        assert_eq!(errors[0].value, Value::Int(-1));
    }

    #[test]
    fn test_map_keys_and_values() {
        let kind = FieldKind::Map(
            MapSpec::new()
                .key_type(FieldKind::Int)
                .value_type(FieldKind::Float),
        );
        let out = coerce(&kind, Value::from(json!({"1": "2.5"})), "prices", &Mapping::new()).unwrap();
        assert_eq!(out, Value::from(json!({"1": 2.5})));

        let errors = coerce(&kind, Value::from(json!({"one": 1})), "prices", &Mapping::new()).unwrap_err();
        assert_eq!(errors[0].field, "prices['one']");
    }

    #[test]
    fn test_nested_model_errors_are_qualified() {
        let address = Schema::builder("Address")
            .field(Field::string("city"))
            .build()
            .unwrap();
        let kind = FieldKind::list_of(FieldKind::Model(address));
        let errors = coerce(
            &kind,
            Value::from(json!([{"city": "Oslo"}, {}])),
            "addresses",
            &Mapping::new(),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "addresses[1].city");
        assert_eq!(errors[0].message, "field required");
    }

    #[test]
    fn test_model_rejects_scalars() {
        let address = Schema::builder("Address").build().unwrap();
        let errors = coerce(&FieldKind::Model(address), Value::from(3), "home", &Mapping::new()).unwrap_err();
        assert_eq!(errors[0].field, "home");
    }
}
