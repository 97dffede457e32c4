//! Schema registry and type builder
//!
//! A [`SchemaBuilder`] collects field declarations in order, resolves the
//! type's [`Config`] and freezes the result into a [`Schema`]: an immutable,
//! cheaply clonable handle shared by every instance of the type.
//!
//! Building runs once per record type:
//!
//! ```text
//! Declared ──build()──▶ Building ──checks pass──▶ Frozen (Schema)
//!                          │
//!                          └──▶ SchemaError
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::computed::ComputedField;
use crate::config::Config;
use crate::error::SchemaError;
use crate::field::{Field, FieldKind, FieldSpec};
use crate::unit::{Injection, Transform, Validator};

/// One frozen field plus its bulk layer
///
/// Bulk units from [`Config::apply_transforms`] and
/// [`Config::apply_validators`] are kept apart from the field's own chain and
/// always run after it.
#[derive(Debug)]
pub(crate) struct FieldEntry {
    pub(crate) spec: FieldSpec,
    pub(crate) bulk_transforms: Vec<Transform>,
    pub(crate) bulk_validators: Vec<Validator>,
}

/// What an external input key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyTarget {
    /// Declared name of the field at this index
    Name(usize),
    /// Alias of the field at this index
    Alias(usize),
    /// Name or alias of a computed field
    Computed,
}

struct SchemaInner {
    name: String,
    fields: Vec<FieldEntry>,
    keys: HashMap<String, KeyTarget>,
    computed: Vec<ComputedField>,
    config: Config,
}

/// Frozen per-type metadata
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    /// Start declaring a record type
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.inner.fields.iter().map(|entry| &entry.spec)
    }

    /// Look up a field by declared name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        match self.inner.keys.get(name) {
            Some(KeyTarget::Name(index)) => Some(&self.inner.fields[*index].spec),
            _ => None,
        }
    }

    /// Computed fields, in registration order
    pub fn computed_fields(&self) -> &[ComputedField] {
        &self.inner.computed
    }

    /// Resolved configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// True when both handles point at the same frozen schema
    pub fn same_as(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn entries(&self) -> &[FieldEntry] {
        &self.inner.fields
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<KeyTarget> {
        self.inner.keys.get(key).copied()
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        match self.lookup(name) {
            Some(KeyTarget::Name(index)) => Some(index),
            _ => None,
        }
    }

    pub(crate) fn computed_field(&self, name: &str) -> Option<&ComputedField> {
        self.inner.computed.iter().find(|c| c.name == name)
    }

    /// Text table of the field layout
    pub fn describe(&self) -> String {
        let mut out = format!("{} ({:?} extra fields)\n", self.name(), self.config().extra_mode());
        for entry in self.entries() {
            let spec = &entry.spec;
            let mut flags = Vec::new();
            if spec.is_required() {
                flags.push("required".to_string());
            }
            if spec.is_nullable() {
                flags.push("optional".to_string());
            }
            if let Some(default) = spec.default_value() {
                flags.push(format!("default={default}"));
            }
            if spec.exclude {
                flags.push("excluded".to_string());
            }
            if spec.exclude_from_structured {
                flags.push("excluded-from-mapping".to_string());
            }
            if spec.exclude_from_text {
                flags.push("excluded-from-json".to_string());
            }
            let units: Vec<&str> = spec
                .transforms()
                .iter()
                .map(Transform::name)
                .chain(entry.bulk_transforms.iter().map(Transform::name))
                .chain(spec.validators().iter().map(Validator::name))
                .chain(entry.bulk_validators.iter().map(Validator::name))
                .collect();
            let _ = writeln!(
                out,
                "  {:<20} {:<20} {:<16} {} [{}]",
                spec.name(),
                spec.serialization_key(),
                spec.kind().name(),
                flags.join(","),
                units.join(" -> ")
            );
        }
        for computed in self.computed_fields() {
            let _ = writeln!(
                out,
                "  {:<20} {:<20} {:<16} computed",
                computed.name(),
                computed.serialization_key(),
                "-"
            );
        }
        out
    }

    /// Stable hash of the field layout, for cache keys and change detection
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.describe().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.inner.name)
            .field(
                "fields",
                &self.fields().map(FieldSpec::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Collects declarations for one record type
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
    computed: Vec<ComputedField>,
    config: Config,
}

impl SchemaBuilder {
    /// Start an empty declaration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            computed: Vec::new(),
            config: Config::default(),
        }
    }

    /// Declare the next field
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Register a computed field
    pub fn computed(mut self, computed: ComputedField) -> Self {
        self.computed.push(computed);
        self
    }

    /// Replace the type configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Freeze the declaration
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if:
    /// - a field or computed field name is declared twice
    /// - a field descriptor is malformed
    /// - two fields resolve to the same external key
    /// - a unit injects an undeclared field, or a field processed after its owner
    /// - a bulk rule targets an undeclared field
    pub fn build(self) -> Result<Schema, SchemaError> {
        let SchemaBuilder {
            name: model,
            fields,
            mut computed,
            config,
        } = self;

        let mut keys: HashMap<String, KeyTarget> = HashMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut entries: Vec<FieldEntry> = Vec::with_capacity(fields.len());

        for field in fields {
            check_field(&model, &field)?;
            if owners.contains_key(&field.name) {
                return Err(duplicate_or_collision(&model, &field.name, &owners));
            }
            let alias = field
                .alias
                .clone()
                .or_else(|| config.generate_alias(&field.name));
            let index = entries.len();
            claim(&model, &mut keys, &mut owners, &field.name, &field.name, KeyTarget::Name(index))?;
            if let Some(alias) = &alias {
                claim(&model, &mut keys, &mut owners, alias, &field.name, KeyTarget::Alias(index))?;
            }
            entries.push(FieldEntry {
                spec: FieldSpec::freeze(field, alias),
                bulk_transforms: Vec::new(),
                bulk_validators: Vec::new(),
            });
        }

        for field in &mut computed {
            if owners.contains_key(&field.name) {
                return Err(duplicate_or_collision(&model, &field.name, &owners));
            }
            if field.alias.is_none() {
                field.alias = config.generate_alias(&field.name);
            }
            claim(&model, &mut keys, &mut owners, &field.name, &field.name, KeyTarget::Computed)?;
            if let Some(alias) = &field.alias {
                claim(&model, &mut keys, &mut owners, alias, &field.name, KeyTarget::Computed)?;
            }
        }

        let positions: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.spec.name.clone(), i))
            .collect();

        for (position, entry) in entries.iter().enumerate() {
            let spec = &entry.spec;
            let mut units: Vec<(&str, &Injection)> = spec
                .transforms
                .iter()
                .map(|t| (t.name(), t.injection()))
                .chain(spec.validators.iter().map(|v| (v.name(), v.injection())))
                .collect();
            match &spec.kind {
                FieldKind::List(list) => {
                    if let Some(v) = &list.item_validator {
                        units.push((v.name(), v.injection()));
                    }
                }
                FieldKind::Map(map) => {
                    if let Some(v) = &map.value_validator {
                        units.push((v.name(), v.injection()));
                    }
                }
                _ => {}
            }
            for (unit, injection) in units {
                check_dependencies(&model, &positions, spec.name(), Some(position), unit, injection)?;
            }
        }

        for rule in &config.apply_transforms {
            for target in &rule.fields {
                let index = bulk_target(&model, &positions, target)?;
                for unit in &rule.units {
                    check_dependencies(&model, &positions, target, None, unit.name(), unit.injection())?;
                }
                entries[index].bulk_transforms.extend(rule.units.iter().cloned());
            }
        }

        for rule in &config.apply_validators {
            for target in &rule.fields {
                let index = bulk_target(&model, &positions, target)?;
                for unit in &rule.units {
                    check_dependencies(&model, &positions, target, None, unit.name(), unit.injection())?;
                }
                entries[index].bulk_validators.extend(rule.units.iter().cloned());
            }
        }

        tracing::debug!(
            model = %model,
            fields = entries.len(),
            computed = computed.len(),
            extra_fields_mode = ?config.extra_fields_mode,
            "schema frozen"
        );

        Ok(Schema {
            inner: Arc::new(SchemaInner {
                name: model,
                fields: entries,
                keys,
                computed,
                config,
            }),
        })
    }
}

fn check_field(model: &str, field: &Field) -> Result<(), SchemaError> {
    let invalid = |message: &str| SchemaError::InvalidField {
        model: model.to_string(),
        field: field.name.clone(),
        message: message.to_string(),
    };
    if field.name.is_empty() {
        return Err(invalid("field name must not be empty"));
    }
    if field.alias.as_deref() == Some("") {
        return Err(invalid("alias must not be empty"));
    }
    if field.nullable && field.required == Some(true) {
        return Err(invalid("an optional field cannot be required"));
    }
    if let FieldKind::List(list) = &field.kind {
        if let (Some(min), Some(max)) = (list.min_length, list.max_length) {
            if min > max {
                return Err(invalid("min_length exceeds max_length"));
            }
        }
    }
    Ok(())
}

fn duplicate_or_collision(
    model: &str,
    name: &str,
    owners: &HashMap<String, String>,
) -> SchemaError {
    match owners.get(name) {
        Some(owner) if owner != name => SchemaError::AliasCollision {
            model: model.to_string(),
            alias: name.to_string(),
            first: owner.clone(),
            second: name.to_string(),
        },
        _ => SchemaError::DuplicateField {
            model: model.to_string(),
            field: name.to_string(),
        },
    }
}

fn claim(
    model: &str,
    keys: &mut HashMap<String, KeyTarget>,
    owners: &mut HashMap<String, String>,
    key: &str,
    owner: &str,
    target: KeyTarget,
) -> Result<(), SchemaError> {
    if let Some(first) = owners.get(key) {
        if first != owner {
            return Err(SchemaError::AliasCollision {
                model: model.to_string(),
                alias: key.to_string(),
                first: first.clone(),
                second: owner.to_string(),
            });
        }
        return Ok(());
    }
    owners.insert(key.to_string(), owner.to_string());
    keys.insert(key.to_string(), target);
    Ok(())
}

fn check_dependencies(
    model: &str,
    positions: &HashMap<String, usize>,
    field: &str,
    position: Option<usize>,
    unit: &str,
    injection: &Injection,
) -> Result<(), SchemaError> {
    for dependency in injection.dependencies() {
        match positions.get(dependency) {
            None => {
                return Err(SchemaError::UnknownDependency {
                    model: model.to_string(),
                    field: field.to_string(),
                    unit: unit.to_string(),
                    dependency: dependency.clone(),
                });
            }
            Some(&index) if position.is_some_and(|p| index >= p) => {
                return Err(SchemaError::OrderingDependency {
                    model: model.to_string(),
                    field: field.to_string(),
                    unit: unit.to_string(),
                    dependency: dependency.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn bulk_target(
    model: &str,
    positions: &HashMap<String, usize>,
    target: &str,
) -> Result<usize, SchemaError> {
    positions
        .get(target)
        .copied()
        .ok_or_else(|| SchemaError::UnknownField {
            model: model.to_string(),
            field: target.to_string(),
        })
}

/// Named collection of frozen schemas
///
/// Used to resolve nested model references in schema documents.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: IndexMap<String, Schema>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frozen schema under its own name
    pub fn register(&mut self, schema: Schema) -> Result<(), SchemaError> {
        if self.schemas.contains_key(schema.name()) {
            return Err(SchemaError::DuplicateModel {
                name: schema.name().to_string(),
            });
        }
        self.schemas.insert(schema.name().to_string(), schema);
        Ok(())
    }

    /// Look up a schema by name
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Whether a schema of this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schemas, in registration order
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::config::AliasStyle;
    use crate::unit::Validator;
    use crate::value::Value;

    #[test]
    fn test_build_keeps_declaration_order() {
        let schema = Schema::builder("User")
            .field(Field::string("name"))
            .field(Field::int("age"))
            .field(Field::string("email"))
            .build()
            .unwrap();
        let names: Vec<_> = schema.fields().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["name", "age", "email"]);
        assert!(schema.field("age").is_some());
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let err = Schema::builder("User")
            .field(Field::string("name"))
            .field(Field::int("name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { field, .. } if field == "name"));
    }

    #[test]
    fn test_alias_collision_is_rejected() {
        let err = Schema::builder("User")
            .field(Field::string("user_name").alias("name"))
            .field(Field::string("login").alias("name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::AliasCollision { alias, .. } if alias == "name"));
    }

    #[test]
    fn test_alias_shadowing_another_field_name_is_rejected() {
        let err = Schema::builder("User")
            .field(Field::string("user_name").alias("login"))
            .field(Field::string("login"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::AliasCollision { .. }));
    }

    #[test]
    fn test_generated_aliases_can_collide() {
        let err = Schema::builder("User")
            .config(Config::new().alias_style(AliasStyle::Camel))
            .field(Field::string("user_name"))
            .field(Field::string("userName"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::AliasCollision { .. }));
    }

    #[test]
    fn test_computed_field_collision() {
        let err = Schema::builder("User")
            .field(Field::string("full_name"))
            .computed(ComputedField::new("full_name", |_| Value::Null))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn test_injection_of_later_field_is_an_ordering_error() {
        let err = Schema::builder("Signup")
            .field(
                Field::string("password_confirm")
                    .validate(Validator::check("matches", |_| true).inject("password")),
            )
            .field(Field::string("password"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::OrderingDependency { dependency, .. } if dependency == "password"
        ));
    }

    #[test]
    fn test_injection_of_undeclared_field_is_rejected() {
        let err = Schema::builder("Signup")
            .field(Field::string("a").transform(builtins::trim().inject("ghost")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDependency { .. }));
    }

    #[test]
    fn test_bulk_units_may_inject_any_field() {
        let schema = Schema::builder("Signup")
            .config(Config::new().apply_validators(
                ["a"],
                vec![Validator::check("late", |_| true).inject("b")],
            ))
            .field(Field::string("a"))
            .field(Field::string("b"))
            .build();
        assert!(schema.is_ok());
    }

    #[test]
    fn test_bulk_target_must_exist() {
        let err = Schema::builder("User")
            .config(Config::new().apply_transforms(["nope"], vec![builtins::trim()]))
            .field(Field::string("name"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownField { field, .. } if field == "nope"));
    }

    #[test]
    fn test_bulk_layer_is_separate_from_field_chain() {
        let schema = Schema::builder("User")
            .config(Config::new().apply_transforms(["name"], vec![builtins::lower()]))
            .field(Field::string("name").transform(builtins::trim()))
            .build()
            .unwrap();
        let entry = &schema.entries()[0];
        assert_eq!(entry.spec.transforms().len(), 1);
        assert_eq!(entry.bulk_transforms.len(), 1);
        assert_eq!(entry.bulk_transforms[0].name(), "lower");
    }

    #[test]
    fn test_optional_required_conflict_is_malformed() {
        let err = Schema::builder("User")
            .field(Field::string("nick").optional().required(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn test_fingerprint_tracks_layout() {
        let a = Schema::builder("User").field(Field::string("name")).build().unwrap();
        let b = Schema::builder("User").field(Field::string("name")).build().unwrap();
        let c = Schema::builder("User").field(Field::int("name")).build().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = Registry::new();
        let schema = Schema::builder("User").build().unwrap();
        registry.register(schema.clone()).unwrap();
        assert!(matches!(
            registry.register(schema),
            Err(SchemaError::DuplicateModel { .. })
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("User"));
    }
}
