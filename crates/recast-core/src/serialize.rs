//! Serialization and deserialization
//!
//! Instances flatten into a [`Mapping`] keyed by serialization keys (alias if
//! set, else declared name) or into JSON text. Each output channel has its
//! own exclusion flag, so the two projections can differ.
//!
//! Values JSON cannot represent natively go through the encoder chain:
//!
//! ```text
//! per-call encoder ─▶ schema json_encoder ─▶ builtin (date, datetime, decimal)
//!   ─▶ nested record / structured form ─▶ EncodeError
//! ```

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::config::Encoder;
use crate::error::{EncodeError, ROOT, ValidationErrors};
use crate::instance::Instance;
use crate::schema::Schema;
use crate::value::{Mapping, Value};

/// Encoder results are re-encoded at most this many times in a row
const MAX_ENCODER_DEPTH: usize = 16;

/// Output channel an exclusion flag applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `to_mapping`
    Structured,
    /// `to_json`
    Text,
}

/// Options for [`Instance::to_mapping_with`]
#[derive(Debug, Clone, Default)]
pub struct MappingOptions {
    /// Omit keys whose value is null
    pub exclude_none: bool,
    /// Top-level fields to omit, by declared name or alias
    pub exclude_fields: Vec<String>,
}

impl MappingOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit null values
    pub fn exclude_none(mut self) -> Self {
        self.exclude_none = true;
        self
    }

    /// Omit a field by declared name or alias
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude_fields.push(field.into());
        self
    }
}

/// Options for [`Instance::to_json_with`]
#[derive(Debug, Clone, Default)]
pub struct JsonOptions {
    /// Omit keys whose value is null
    pub exclude_none: bool,
    /// Top-level fields to omit, by declared name or alias
    pub exclude_fields: Vec<String>,
    /// Encoder tried before the schema's own
    pub encoder: Option<Encoder>,
    /// Pretty-print with this many spaces per level
    pub indent: Option<usize>,
}

impl JsonOptions {
    /// Default options: compact output, nothing excluded
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit null values
    pub fn exclude_none(mut self) -> Self {
        self.exclude_none = true;
        self
    }

    /// Omit a field by declared name or alias
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.exclude_fields.push(field.into());
        self
    }

    /// Per-call fallback encoder
    pub fn encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Pretty-print output
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }
}

impl Instance {
    /// Flatten into a mapping keyed by serialization keys
    pub fn to_mapping(&self) -> Mapping {
        self.to_mapping_with(&MappingOptions::default())
    }

    /// Flatten into a mapping with explicit options
    ///
    /// Nested records become nested mappings. Computed fields are evaluated
    /// on every call.
    pub fn to_mapping_with(&self, options: &MappingOptions) -> Mapping {
        project(self, Channel::Structured, options.exclude_none, &options.exclude_fields)
            .into_iter()
            .map(|(key, value)| (key, flatten(value, options.exclude_none)))
            .collect()
    }

    /// Serialize to compact JSON text
    pub fn to_json(&self) -> Result<String, EncodeError> {
        self.to_json_with(&JsonOptions::default())
    }

    /// Serialize to JSON text with explicit options
    ///
    /// # Errors
    ///
    /// Returns `EncodeError` naming the path of the first value no encoder
    /// could represent.
    pub fn to_json_with(&self, options: &JsonOptions) -> Result<String, EncodeError> {
        let json = self.to_json_value(options)?;
        let rendered = match options.indent {
            None => serde_json::to_string(&json),
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut buf = Vec::new();
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                json.serialize(&mut serializer)
                    .map(|()| String::from_utf8_lossy(&buf).into_owned())
            }
        };
        rendered.map_err(|err| EncodeError {
            path: ROOT.to_string(),
            kind: "map".to_string(),
            message: err.to_string(),
        })
    }

    /// Text projection as a `serde_json::Value`
    pub fn to_json_value(&self, options: &JsonOptions) -> Result<serde_json::Value, EncodeError> {
        let encoding = JsonEncoding {
            call: options.encoder.as_ref(),
            config: self.schema().config().encoder(),
            exclude_none: options.exclude_none,
        };
        let projected = project(self, Channel::Text, options.exclude_none, &options.exclude_fields);
        encoding.encode_map(&projected, "", 0)
    }
}

impl Schema {
    /// Parse JSON text and construct an instance from it
    ///
    /// Malformed JSON is reported as a validation failure on the root.
    pub fn from_json(&self, text: &str) -> Result<Instance, ValidationErrors> {
        let json: serde_json::Value = serde_json::from_str(text).map_err(|err| {
            ValidationErrors::single(self.name(), ROOT, Value::Null, format!("invalid JSON: {err}"))
        })?;
        self.validate_value(Value::from(json))
    }
}

/// Declared and computed fields visible on `channel`, unflattened
fn project(
    instance: &Instance,
    channel: Channel,
    exclude_none: bool,
    exclude_fields: &[String],
) -> Mapping {
    let schema = instance.schema();
    let excluded = |name: &str, key: &str| exclude_fields.iter().any(|f| f == name || f == key);
    let mut out = Mapping::new();

    for spec in schema.fields() {
        if spec.excluded_from(channel) || excluded(spec.name(), spec.serialization_key()) {
            continue;
        }
        let value = instance.get(spec.name()).cloned().unwrap_or_default();
        if exclude_none && value.is_null() {
            continue;
        }
        out.insert(spec.serialization_key().to_string(), value);
    }

    for computed in schema.computed_fields() {
        if excluded(computed.name(), computed.serialization_key()) {
            continue;
        }
        let value = computed.evaluate(instance);
        if exclude_none && value.is_null() {
            continue;
        }
        out.insert(computed.serialization_key().to_string(), value);
    }

    out
}

/// Replace nested records with their structured mappings
fn flatten(value: Value, exclude_none: bool) -> Value {
    match value {
        Value::Model(instance) => {
            let options = MappingOptions {
                exclude_none,
                exclude_fields: Vec::new(),
            };
            Value::Map(instance.to_mapping_with(&options))
        }
        Value::List(items) => Value::List(items.into_iter().map(|v| flatten(v, exclude_none)).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, flatten(v, exclude_none)))
                .collect(),
        ),
        other => other,
    }
}

struct JsonEncoding<'a> {
    call: Option<&'a Encoder>,
    config: Option<&'a Encoder>,
    exclude_none: bool,
}

impl JsonEncoding<'_> {
    fn encode(&self, value: &Value, path: &str, depth: usize) -> Result<serde_json::Value, EncodeError> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(i) => Ok(serde_json::Value::from(*i)),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Float(f) if f.is_finite() => Ok(serde_json::Value::from(*f)),
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.encode(item, &format!("{}[{i}]", display_path(path)), depth))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Map(entries) => self.encode_map(entries, path, depth),
            other => self.fallback(other, path, depth),
        }
    }

    fn encode_map(&self, entries: &Mapping, path: &str, depth: usize) -> Result<serde_json::Value, EncodeError> {
        let mut object = serde_json::Map::with_capacity(entries.len());
        for (key, value) in entries {
            let child = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            object.insert(key.clone(), self.encode(value, &child, depth)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    fn fallback(&self, value: &Value, path: &str, depth: usize) -> Result<serde_json::Value, EncodeError> {
        let fail = |message: String| EncodeError {
            path: display_path(path).to_string(),
            kind: value.kind_name().to_string(),
            message,
        };
        if depth >= MAX_ENCODER_DEPTH {
            return Err(fail("encoder output did not converge".to_string()));
        }

        for encoder in [self.call, self.config].into_iter().flatten() {
            if let Some(encoded) = encoder.encode(value) {
                return self.encode(&encoded, path, depth + 1);
            }
        }

        match value {
            Value::Date(date) => Ok(serde_json::Value::String(date.format("%Y-%m-%d").to_string())),
            Value::DateTime(datetime) => Ok(serde_json::Value::String(datetime.to_rfc3339())),
            Value::Decimal(decimal) => Ok(serde_json::Value::String(decimal.to_string())),
            Value::Model(instance) => {
                let nested = JsonEncoding {
                    call: self.call,
                    config: instance.schema().config().encoder(),
                    exclude_none: self.exclude_none,
                };
                let projected = project(instance, Channel::Text, self.exclude_none, &[]);
                nested.encode_map(&projected, path, depth)
            }
            Value::Object(object) => match object.to_structured() {
                Some(structured) => self.encode(&structured, path, depth + 1),
                None => Err(fail(format!("no encoder for {}", object.type_name()))),
            },
            Value::Float(f) => Err(fail(format!("non-finite float {f}"))),
            _ => Err(fail("unsupported value".to_string())),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { ROOT } else { path }
}

/// Lenient serde form: dates as ISO strings, decimals as strings, nested
/// records as their text projection, opaque objects as their structured
/// form or type name
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Decimal(d) => serializer.collect_str(d),
            Value::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            Value::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => serialize_mapping(entries, serializer),
            Value::Model(instance) => {
                serialize_mapping(&project(instance, Channel::Text, false, &[]), serializer)
            }
            Value::Object(object) => match object.to_structured() {
                Some(structured) => structured.serialize(serializer),
                None => serializer.collect_str(&format_args!("<{}>", object.type_name())),
            },
        }
    }
}

fn serialize_mapping<S: Serializer>(entries: &Mapping, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}
