//! Declarative schema documents
//!
//! Record types can be declared in YAML and materialized through the same
//! [`SchemaBuilder`] Rust callers use.
//!
//! # Example
//!
//! ```yaml
//! name: User
//! config:
//!   alias_generator: camel
//!   extra_fields_mode: strict
//!   apply_transforms:
//!     - { fields: [email, username], transforms: [trim] }
//!   global_validators:
//!     - "age >= 18 or role != 'admin'"
//! fields:
//!   - name: email
//!     type: string
//!     transforms: [trim, lower]
//!     validators: [email]
//!   - name: age
//!     type: int
//!     validators: [{ range: { min: 0, max: 120 } }]
//!   - { name: address, type: Address, optional: true }
//! computed:
//!   - { name: full_name, template: "{{ first_name }} {{ last_name }}" }
//! ```
//!
//! Global validators are minijinja expressions and computed fields are
//! minijinja templates, both evaluated over the declared-name value mapping.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::builtins;
use crate::computed::ComputedField;
use crate::config::{AliasStyle, Config, ExtraFieldsMode};
use crate::error::{Result, SchemaError};
use crate::field::{Field, FieldKind, ListSpec, MapSpec};
use crate::schema::{Registry, Schema};
use crate::unit::{GlobalValidator, Transform, Validator};
use crate::value::{Mapping, Value};

/// One record type declared in YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Type name, also used for references from other documents
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Type configuration
    #[serde(default)]
    pub config: ConfigDocument,

    /// Fields, in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDocument>,

    /// Computed fields
    #[serde(default)]
    pub computed: Vec<ComputedDocument>,
}

/// Alias generator setting
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AliasSetting {
    /// No generated aliases
    None,
    /// `user_name` -> `userName`
    Camel,
    /// `user_name` -> `UserName`
    Pascal,
    /// `user_name` -> `user-name`
    Kebab,
}

/// `config:` block of a schema document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
    /// Alias generator for fields without an explicit alias
    #[serde(default)]
    pub alias_generator: Option<AliasSetting>,

    /// Unknown-key policy
    #[serde(default)]
    pub extra_fields_mode: ExtraFieldsMode,

    /// Bulk transforms
    #[serde(default)]
    pub apply_transforms: Vec<BulkTransforms>,

    /// Bulk validators
    #[serde(default)]
    pub apply_validators: Vec<BulkValidators>,

    /// Cross-field checks
    #[serde(default)]
    pub global_validators: Vec<GlobalDocument>,
}

/// Transforms applied to a set of fields
#[derive(Debug, Clone, Deserialize)]
pub struct BulkTransforms {
    /// Target fields
    pub fields: Vec<String>,
    /// Transforms, in order
    pub transforms: Vec<UnitRef>,
}

/// Validators applied to a set of fields
#[derive(Debug, Clone, Deserialize)]
pub struct BulkValidators {
    /// Target fields
    pub fields: Vec<String>,
    /// Validators, in order
    pub validators: Vec<UnitRef>,
}

/// A global validator expression
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GlobalDocument {
    /// Bare expression
    Expr(String),
    /// Expression with a name and failure message
    Named {
        /// Validator name
        #[serde(default)]
        name: Option<String>,
        /// minijinja expression that must be truthy
        expr: String,
        /// Message reported on failure
        #[serde(default)]
        message: Option<String>,
    },
}

/// Reference to a builtin transform or validator
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnitRef {
    /// `trim`
    Name(String),
    /// `{ range: { min: 0, max: 120 } }`
    WithArgs(IndexMap<String, Option<serde_json::Value>>),
}

impl UnitRef {
    fn resolve(&self, kind: &'static str) -> std::result::Result<(String, Mapping), SchemaError> {
        match self {
            UnitRef::Name(name) => Ok((name.clone(), Mapping::new())),
            UnitRef::WithArgs(map) => {
                let mut entries = map.iter();
                let (Some((name, args)), None) = (entries.next(), entries.next()) else {
                    return Err(SchemaError::InvalidUnit {
                        kind,
                        name: map.keys().cloned().collect::<Vec<_>>().join(", "),
                        message: "a unit reference must have exactly one key".to_string(),
                    });
                };
                let args = match args {
                    None => Mapping::new(),
                    Some(serde_json::Value::Object(_)) => Value::from(args.clone())
                        .into_mapping()
                        .unwrap_or_default(),
                    Some(_) => {
                        return Err(SchemaError::InvalidUnit {
                            kind,
                            name: name.clone(),
                            message: "arguments must be a mapping".to_string(),
                        });
                    }
                };
                Ok((name.clone(), args))
            }
        }
    }

    fn transform(&self) -> std::result::Result<Transform, SchemaError> {
        let (name, args) = self.resolve("transform")?;
        builtins::transform(&name, &args)
    }

    fn validator(&self) -> std::result::Result<Validator, SchemaError> {
        let (name, args) = self.resolve("validator")?;
        builtins::validator(&name, &args)
    }
}

/// One field entry of a schema document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    /// Declared name
    pub name: String,

    /// Kind name or referenced model name
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Item kind of a list
    #[serde(default)]
    pub items: Option<String>,

    /// Validator run on each list item
    #[serde(default)]
    pub item_validator: Option<UnitRef>,

    /// Minimum list length
    #[serde(default)]
    pub min_length: Option<usize>,

    /// Maximum list length
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Key kind of a map
    #[serde(default)]
    pub keys: Option<String>,

    /// Value kind of a map
    #[serde(default)]
    pub values: Option<String>,

    /// Validator run on each map value
    #[serde(default)]
    pub value_validator: Option<UnitRef>,

    /// Default value
    #[serde(default)]
    pub default: Option<serde_json::Value>,

    /// Explicit requiredness
    #[serde(default)]
    pub required: Option<bool>,

    /// Accept null and treat absence as null
    #[serde(default)]
    pub optional: bool,

    /// External name
    #[serde(default)]
    pub alias: Option<String>,

    /// Transforms, in order
    #[serde(default)]
    pub transforms: Vec<UnitRef>,

    /// Validators, in order
    #[serde(default)]
    pub validators: Vec<UnitRef>,

    /// Leave out of every output
    #[serde(default)]
    pub exclude: bool,

    /// Leave out of mapping output
    #[serde(default)]
    pub exclude_from_structured: bool,

    /// Leave out of JSON output
    #[serde(default)]
    pub exclude_from_text: bool,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

fn default_kind() -> String {
    "any".to_string()
}

/// A computed field rendered from a template
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputedDocument {
    /// Declared name
    pub name: String,
    /// External name
    #[serde(default)]
    pub alias: Option<String>,
    /// minijinja template rendered over the declared-name values
    ///
    /// Syntax is checked when the schema is built. A template that fails
    /// at render time (unknown function or filter, bad operands) logs a
    /// warning and evaluates to null, so every output channel carries
    /// `null` for the field.
    pub template: String,
}

fn primitive(name: &str) -> Option<FieldKind> {
    let kind = match name {
        "any" => FieldKind::Any,
        "string" | "str" => FieldKind::Str,
        "int" | "integer" => FieldKind::Int,
        "float" | "number" => FieldKind::Float,
        "bool" | "boolean" => FieldKind::Bool,
        "decimal" => FieldKind::Decimal,
        "date" => FieldKind::Date,
        "datetime" => FieldKind::DateTime,
        "list" => FieldKind::List(ListSpec::new()),
        "map" => FieldKind::Map(MapSpec::new()),
        _ => return None,
    };
    Some(kind)
}

impl SchemaDocument {
    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Model names this document refers to
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for field in &self.fields {
            let names = [Some(&field.kind), field.items.as_ref(), field.values.as_ref()];
            for name in names.into_iter().flatten() {
                if primitive(name).is_none() && !refs.contains(&name.as_str()) {
                    refs.push(name);
                }
            }
        }
        refs
    }

    /// Build the schema, resolving model references against `registry`
    pub fn build(&self, registry: &Registry) -> std::result::Result<Schema, SchemaError> {
        let mut builder = Schema::builder(&self.name).config(self.config.build(&self.name)?);
        for field in &self.fields {
            builder = builder.field(field.build(&self.name, registry)?);
        }
        for computed in &self.computed {
            builder = builder.computed(computed.build(&self.name)?);
        }
        builder.build()
    }
}

impl ConfigDocument {
    fn build(&self, model: &str) -> std::result::Result<Config, SchemaError> {
        let mut config = Config::new().extra_fields_mode(self.extra_fields_mode);
        config = match self.alias_generator {
            None | Some(AliasSetting::None) => config,
            Some(AliasSetting::Camel) => config.alias_style(AliasStyle::Camel),
            Some(AliasSetting::Pascal) => config.alias_style(AliasStyle::Pascal),
            Some(AliasSetting::Kebab) => config.alias_style(AliasStyle::Kebab),
        };
        for rule in &self.apply_transforms {
            let units = rule
                .transforms
                .iter()
                .map(UnitRef::transform)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            config = config.apply_transforms(rule.fields.iter().cloned(), units);
        }
        for rule in &self.apply_validators {
            let units = rule
                .validators
                .iter()
                .map(UnitRef::validator)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            config = config.apply_validators(rule.fields.iter().cloned(), units);
        }
        for global in &self.global_validators {
            config = config.global_validator(global.build(model)?);
        }
        Ok(config)
    }
}

impl GlobalDocument {
    fn build(&self, model: &str) -> std::result::Result<GlobalValidator, SchemaError> {
        let (name, expr, message) = match self {
            GlobalDocument::Expr(expr) => (expr.clone(), expr.clone(), None),
            GlobalDocument::Named { name, expr, message } => (
                name.clone().unwrap_or_else(|| expr.clone()),
                expr.clone(),
                message.clone(),
            ),
        };

        check_expression(&expr).map_err(|err| SchemaError::InvalidUnit {
            kind: "global validator",
            name: name.clone(),
            message: format!("{model}: {err}"),
        })?;

        let validator = GlobalValidator::new(name, move |values| {
            let env = minijinja::Environment::new();
            let compiled = env.compile_expression(&expr).map_err(|err| err.to_string())?;
            let result = compiled.eval(values).map_err(|err| err.to_string())?;
            Ok(result.is_true())
        });
        Ok(match message {
            Some(message) => validator.message(message),
            None => validator,
        })
    }
}

impl FieldDocument {
    fn kind(
        &self,
        name: &str,
        model: &str,
        registry: &Registry,
    ) -> std::result::Result<FieldKind, SchemaError> {
        if let Some(kind) = primitive(name) {
            return Ok(kind);
        }
        registry
            .get(name)
            .cloned()
            .map(FieldKind::Model)
            .ok_or_else(|| SchemaError::UnknownModel {
                name: name.to_string(),
                referrer: model.to_string(),
            })
    }

    fn build(&self, model: &str, registry: &Registry) -> std::result::Result<Field, SchemaError> {
        let invalid = |message: &str| SchemaError::InvalidField {
            model: model.to_string(),
            field: self.name.clone(),
            message: message.to_string(),
        };

        let kind = match self.kind(&self.kind, model, registry)? {
            FieldKind::List(mut spec) => {
                if let Some(items) = &self.items {
                    spec = spec.item_type(self.kind(items, model, registry)?);
                }
                if let Some(validator) = &self.item_validator {
                    spec = spec.item_validator(validator.validator()?);
                }
                spec.min_length = self.min_length;
                spec.max_length = self.max_length;
                FieldKind::List(spec)
            }
            FieldKind::Map(mut spec) => {
                if let Some(keys) = &self.keys {
                    spec = spec.key_type(self.kind(keys, model, registry)?);
                }
                if let Some(values) = &self.values {
                    spec = spec.value_type(self.kind(values, model, registry)?);
                }
                if let Some(validator) = &self.value_validator {
                    spec = spec.value_validator(validator.validator()?);
                }
                FieldKind::Map(spec)
            }
            other => {
                if self.items.is_some() || self.min_length.is_some() || self.max_length.is_some() {
                    return Err(invalid("items and length bounds need type: list"));
                }
                if self.keys.is_some() || self.values.is_some() {
                    return Err(invalid("keys and values need type: map"));
                }
                other
            }
        };

        let mut field = Field::new(&self.name, kind);
        if let Some(default) = &self.default {
            field = field.default(Value::from(default.clone()));
        }
        if let Some(required) = self.required {
            field = field.required(required);
        }
        if self.optional {
            field = field.optional();
        }
        if let Some(alias) = &self.alias {
            field = field.alias(alias);
        }
        for unit in &self.transforms {
            field = field.transform(unit.transform()?);
        }
        for unit in &self.validators {
            field = field.validate(unit.validator()?);
        }
        if self.exclude {
            field = field.exclude();
        }
        if self.exclude_from_structured {
            field = field.exclude_from_structured();
        }
        if self.exclude_from_text {
            field = field.exclude_from_text();
        }
        Ok(field)
    }
}

impl ComputedDocument {
    fn build(&self, model: &str) -> std::result::Result<ComputedField, SchemaError> {
        check_template(&self.template).map_err(|err| SchemaError::InvalidUnit {
            kind: "computed field",
            name: self.name.clone(),
            message: format!("{model}: {err}"),
        })?;

        let template = self.template.clone();
        let name = self.name.clone();
        let computed = ComputedField::new(&self.name, move |instance| {
            let env = minijinja::Environment::new();
            match env.render_str(&template, instance.values()) {
                Ok(rendered) => Value::Str(rendered),
                Err(err) => {
                    tracing::warn!(field = %name, error = %err, "computed template failed to render");
                    Value::Null
                }
            }
        });
        Ok(match &self.alias {
            Some(alias) => computed.alias(alias),
            None => computed,
        })
    }
}

fn check_expression(expr: &str) -> std::result::Result<(), minijinja::Error> {
    let env = minijinja::Environment::new();
    env.compile_expression(expr).map(|_| ())
}

fn check_template(source: &str) -> std::result::Result<(), minijinja::Error> {
    let env = minijinja::Environment::new();
    env.template_from_str(source).map(|_| ())
}

impl Registry {
    /// Build and register documents, in dependency order
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for duplicate names, references to models that
    /// are neither registered nor among `documents`, reference cycles, and
    /// any error raised while building an individual schema.
    pub fn add_documents(
        &mut self,
        documents: Vec<SchemaDocument>,
    ) -> std::result::Result<(), SchemaError> {
        let mut pending: IndexMap<String, SchemaDocument> = IndexMap::new();
        for document in documents {
            if self.contains(&document.name) || pending.contains_key(&document.name) {
                return Err(SchemaError::DuplicateModel {
                    name: document.name,
                });
            }
            pending.insert(document.name.clone(), document);
        }

        for document in pending.values() {
            for reference in document.references() {
                if !self.contains(reference) && !pending.contains_key(reference) {
                    return Err(SchemaError::UnknownModel {
                        name: reference.to_string(),
                        referrer: document.name.clone(),
                    });
                }
            }
        }

        while !pending.is_empty() {
            let ready = pending
                .values()
                .position(|document| document.references().iter().all(|r| self.contains(r)));
            let Some(index) = ready else {
                return Err(SchemaError::CyclicModels {
                    models: pending.keys().cloned().collect(),
                });
            };
            let Some((_, document)) = pending.shift_remove_index(index) else {
                break;
            };
            let schema = document.build(self)?;
            tracing::debug!(model = %schema.name(), "registered schema document");
            self.register(schema)?;
        }
        Ok(())
    }

    /// Load every document of a YAML string (documents separated by `---`)
    pub fn load_str(yaml: &str) -> Result<Self> {
        let mut registry = Registry::new();
        registry.add_documents(parse_documents(yaml)?)?;
        Ok(registry)
    }

    /// Load a single YAML file or every `*.yaml`/`*.yml` file under a directory
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Self::load_dir(path);
        }
        let contents = std::fs::read_to_string(path)?;
        Self::load_str(&contents)
    }

    /// Load every `*.yaml`/`*.yml` file under a directory, in file name order
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut documents = Vec::new();
        for entry in walkdir::WalkDir::new(dir.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
        {
            tracing::debug!("Loading schema documents from {}", entry.path().display());
            let contents = std::fs::read_to_string(entry.path())?;
            documents.extend(parse_documents(&contents)?);
        }

        let mut registry = Registry::new();
        registry.add_documents(documents)?;
        Ok(registry)
    }
}

fn parse_documents(yaml: &str) -> Result<Vec<SchemaDocument>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        documents.push(SchemaDocument::deserialize(document)?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::mapping;
    use serde_json::json;

    const USER: &str = r#"
name: User
config:
  alias_generator: camel
  apply_validators:
    - { fields: [email, first_name], validators: [non_empty] }
  global_validators:
    - expr: "age >= 18 or role != 'admin'"
      message: admins must be adults
fields:
  - name: email
    type: string
    transforms: [trim, lower]
    validators: [email]
  - name: first_name
    type: string
  - name: last_name
    type: string
  - name: age
    type: int
    validators: [{ range: { min: 0, max: 120 } }]
  - { name: role, type: string, default: user }
computed:
  - { name: full_name, template: "{{ first_name }} {{ last_name }}" }
"#;

    #[test]
    fn test_parse_and_build_document() {
        let registry = Registry::load_str(USER).unwrap();
        let user = registry.get("User").unwrap();
        assert_eq!(user.field("first_name").unwrap().alias(), Some("firstName"));

        let instance = user
            .construct(mapping(json!({
                "email": " ADA@Example.com ",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "age": 36
            })))
            .unwrap();
        assert_eq!(instance.get("email"), Some(&Value::from("ada@example.com")));
        assert_eq!(instance.get("role"), Some(&Value::from("user")));
        assert_eq!(instance.computed("full_name"), Some(Value::from("Ada Lovelace")));
        assert_eq!(instance.to_mapping()["fullName"], Value::from("Ada Lovelace"));
    }

    #[test]
    fn test_global_expression() {
        let registry = Registry::load_str(USER).unwrap();
        let err = registry
            .get("User")
            .unwrap()
            .construct(mapping(json!({
                "email": "kid@example.com",
                "firstName": "K",
                "lastName": "Id",
                "age": 12,
                "role": "admin"
            })))
            .unwrap_err();
        assert_eq!(err.errors[0].message, "admins must be adults");
    }

    #[test]
    fn test_documents_build_in_dependency_order() {
        let yaml = r#"
name: Company
fields:
  - { name: employees, type: list, items: Employee, min_length: 1 }
---
name: Employee
fields:
  - { name: name, type: string }
  - { name: address, type: Address, optional: true }
---
name: Address
fields:
  - { name: city, type: string }
"#;
        let registry = Registry::load_str(yaml).unwrap();
        let names: Vec<_> = registry.schemas().map(Schema::name).collect();
        assert_eq!(names, vec!["Address", "Employee", "Company"]);

        let err = registry
            .get("Company")
            .unwrap()
            .construct(mapping(json!({
                "employees": [{"name": "A"}, {"name": "B", "address": {}}]
            })))
            .unwrap_err();
        assert_eq!(err.fields(), vec!["employees[1].address.city"]);
    }

    #[test]
    fn test_unknown_model_reference() {
        let err = Registry::load_str("name: A\nfields:\n  - { name: b, type: Missing }\n").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Schema(SchemaError::UnknownModel { name, .. }) if name == "Missing"
        ));
    }

    #[test]
    fn test_cyclic_references() {
        let yaml = "name: A\nfields: [{ name: b, type: B }]\n---\nname: B\nfields: [{ name: a, type: A }]\n";
        let err = Registry::load_str(yaml).unwrap_err();
        assert!(matches!(err, crate::Error::Schema(SchemaError::CyclicModels { .. })));
    }

    #[test]
    fn test_unit_reference_with_two_keys_is_rejected() {
        let yaml = "name: A\nfields:\n  - { name: b, type: int, validators: [{ range: {min: 1}, abs: }] }\n";
        let err = Registry::load_str(yaml).unwrap_err();
        assert!(matches!(err, crate::Error::Schema(SchemaError::InvalidUnit { .. })));
    }

    #[test]
    fn test_unknown_document_keys_are_rejected() {
        assert!(SchemaDocument::from_yaml("name: A\nfeilds: []\n").is_err());
    }

    #[test]
    fn test_render_failure_evaluates_to_null() {
        let yaml = r#"
name: A
fields:
  - { name: x, type: string }
computed:
  - { name: shout, template: "{{ nope(x) }}" }
"#;
        let registry = Registry::load_str(yaml).unwrap();
        let instance = registry
            .get("A")
            .unwrap()
            .construct(mapping(json!({"x": "a"})))
            .unwrap();
        assert_eq!(instance.computed("shout"), Some(Value::Null));
        assert_eq!(instance.to_json().unwrap(), r#"{"x":"a","shout":null}"#);
    }

    #[test]
    fn test_bad_template_is_rejected_at_build() {
        let yaml = "name: A\ncomputed:\n  - { name: x, template: \"{{ unclosed\" }\n";
        let err = Registry::load_str(yaml).unwrap_err();
        assert!(matches!(err, crate::Error::Schema(SchemaError::InvalidUnit { kind: "computed field", .. })));
    }
}
