//! Field descriptors
//!
//! A [`Field`] declares one attribute of a record type: its kind, default,
//! requiredness, transform and validator chains, alias and exclusion flags.
//! The schema builder freezes each descriptor into a [`FieldSpec`].

use crate::schema::Schema;
use crate::serialize::Channel;
use crate::unit::{Transform, Validator};
use crate::value::Value;

/// Declared type of a field
#[derive(Debug, Clone, Default)]
pub enum FieldKind {
    /// Generic field; values pass through uncoerced
    #[default]
    Any,
    /// Text
    Str,
    /// Integer
    Int,
    /// Float
    Float,
    /// Boolean
    Bool,
    /// Fixed-point decimal
    Decimal,
    /// Calendar date
    Date,
    /// Timestamp
    DateTime,
    /// Sequence of items
    List(ListSpec),
    /// Keyed mapping
    Map(MapSpec),
    /// Nested record
    Model(Schema),
}

impl FieldKind {
    /// List kind with the given item kind
    pub fn list_of(item: FieldKind) -> Self {
        FieldKind::List(ListSpec::new().item_type(item))
    }

    /// Map kind with the given value kind
    pub fn map_of(value: FieldKind) -> Self {
        FieldKind::Map(MapSpec::new().value_type(value))
    }

    /// Human readable kind name, e.g. `list<Address>`
    pub fn name(&self) -> String {
        match self {
            FieldKind::Any => "any".to_string(),
            FieldKind::Str => "string".to_string(),
            FieldKind::Int => "int".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Decimal => "decimal".to_string(),
            FieldKind::Date => "date".to_string(),
            FieldKind::DateTime => "datetime".to_string(),
            FieldKind::List(spec) => match &spec.item_type {
                Some(item) => format!("list<{}>", item.name()),
                None => "list".to_string(),
            },
            FieldKind::Map(spec) => match (&spec.key_type, &spec.value_type) {
                (None, None) => "map".to_string(),
                (key, value) => format!(
                    "map<{}, {}>",
                    key.as_ref().map_or("string".to_string(), |k| k.name()),
                    value.as_ref().map_or("any".to_string(), |v| v.name())
                ),
            },
            FieldKind::Model(schema) => schema.name().to_string(),
        }
    }
}

/// Constraints of a sequence field
#[derive(Debug, Clone, Default)]
pub struct ListSpec {
    /// Kind every item is coerced to
    pub item_type: Option<Box<FieldKind>>,
    /// Validator run on each coerced item
    pub item_validator: Option<Validator>,
    /// Minimum number of items
    pub min_length: Option<usize>,
    /// Maximum number of items
    pub max_length: Option<usize>,
}

impl ListSpec {
    /// Unconstrained list
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce every item to `kind`
    pub fn item_type(mut self, kind: FieldKind) -> Self {
        self.item_type = Some(Box::new(kind));
        self
    }

    /// Validate every item
    pub fn item_validator(mut self, validator: Validator) -> Self {
        self.item_validator = Some(validator);
        self
    }

    /// Require at least `n` items
    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    /// Allow at most `n` items
    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }
}

/// Constraints of a mapping field
#[derive(Debug, Clone, Default)]
pub struct MapSpec {
    /// Kind every key must parse as
    pub key_type: Option<Box<FieldKind>>,
    /// Kind every value is coerced to
    pub value_type: Option<Box<FieldKind>>,
    /// Validator run on each coerced value
    pub value_validator: Option<Validator>,
}

impl MapSpec {
    /// Unconstrained mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Check keys against `kind`
    pub fn key_type(mut self, kind: FieldKind) -> Self {
        self.key_type = Some(Box::new(kind));
        self
    }

    /// Coerce every value to `kind`
    pub fn value_type(mut self, kind: FieldKind) -> Self {
        self.value_type = Some(Box::new(kind));
        self
    }

    /// Validate every value
    pub fn value_validator(mut self, validator: Validator) -> Self {
        self.value_validator = Some(validator);
        self
    }
}

/// Declaration of one field, consumed by [`crate::SchemaBuilder::field`]
///
/// # Example
///
/// ```rust,ignore
/// use recast_core::{builtins, Field};
///
/// let email = Field::string("email")
///     .transform(builtins::trim())
///     .transform(builtins::lower())
///     .validate(builtins::email());
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) default: Option<Value>,
    pub(crate) required: Option<bool>,
    pub(crate) nullable: bool,
    pub(crate) transforms: Vec<Transform>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) alias: Option<String>,
    pub(crate) exclude: bool,
    pub(crate) exclude_from_structured: bool,
    pub(crate) exclude_from_text: bool,
}

impl Field {
    /// Declare a field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: None,
            nullable: false,
            transforms: Vec::new(),
            validators: Vec::new(),
            alias: None,
            exclude: false,
            exclude_from_structured: false,
            exclude_from_text: false,
        }
    }

    /// Generic field
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Any)
    }

    /// Text field
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Str)
    }

    /// Integer field
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// Float field
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Boolean field
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Decimal field
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    /// Date field
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    /// Timestamp field
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Sequence field
    pub fn list(name: impl Into<String>, spec: ListSpec) -> Self {
        Self::new(name, FieldKind::List(spec))
    }

    /// Mapping field
    pub fn map(name: impl Into<String>, spec: MapSpec) -> Self {
        Self::new(name, FieldKind::Map(spec))
    }

    /// Nested record field
    pub fn model(name: impl Into<String>, schema: &Schema) -> Self {
        Self::new(name, FieldKind::Model(schema.clone()))
    }

    /// Append a transform to the chain
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Append several transforms, in order
    pub fn transforms(mut self, transforms: impl IntoIterator<Item = Transform>) -> Self {
        self.transforms.extend(transforms);
        self
    }

    /// Append a validator to the chain
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Append several validators, in order
    pub fn validators(mut self, validators: impl IntoIterator<Item = Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    /// Value used when the input omits the field
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Override requiredness
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Accept null and treat absence as null
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// External name used by mappings and JSON
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Leave the field out of every serialized output
    pub fn exclude(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// Leave the field out of `to_mapping` output only
    pub fn exclude_from_structured(mut self) -> Self {
        self.exclude_from_structured = true;
        self
    }

    /// Leave the field out of `to_json` output only
    pub fn exclude_from_text(mut self) -> Self {
        self.exclude_from_text = true;
        self
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Frozen field declaration owned by a schema
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) default: Option<Value>,
    pub(crate) required: bool,
    pub(crate) nullable: bool,
    pub(crate) transforms: Vec<Transform>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) alias: Option<String>,
    pub(crate) exclude: bool,
    pub(crate) exclude_from_structured: bool,
    pub(crate) exclude_from_text: bool,
}

impl FieldSpec {
    pub(crate) fn freeze(field: Field, alias: Option<String>) -> Self {
        let required = field
            .required
            .unwrap_or(field.default.is_none() && !field.nullable);
        Self {
            name: field.name,
            kind: field.kind,
            default: field.default,
            required,
            nullable: field.nullable,
            transforms: field.transforms,
            validators: field.validators,
            alias,
            exclude: field.exclude,
            exclude_from_structured: field.exclude_from_structured,
            exclude_from_text: field.exclude_from_text,
        }
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Default value, if any
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether absence without a default is a failure
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether null is accepted as-is
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Explicit or generated alias
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Key used in serialized output
    pub fn serialization_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Per-field transform chain
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Per-field validator chain
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Whether the field is left out of `channel`
    pub fn excluded_from(&self, channel: Channel) -> bool {
        self.exclude
            || match channel {
                Channel::Structured => self.exclude_from_structured,
                Channel::Text => self.exclude_from_text,
            }
    }
}
