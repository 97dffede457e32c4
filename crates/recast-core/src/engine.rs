//! Validation/transform engine
//!
//! Construction runs the fixed pipeline over raw input:
//!
//! ```text
//! raw mapping
//!   │  resolve keys (alias wins over declared name), split off unknown keys
//!   ▼
//! per field, in declaration order:
//!   coerce ─▶ transforms ─▶ validators        (errors aggregated)
//!   ▼
//! bulk rules, in config order: every apply_transforms ─▶ every apply_validators
//!   ▼
//! global validators over the declared-name value mapping
//!   ▼
//! Instance
//! ```
//!
//! Assignment re-runs the per-field chain and that field's bulk layer only.

use crate::coerce::coerce;
use crate::config::ExtraFieldsMode;
use crate::error::{FieldError, ROOT, ValidationErrors};
use crate::instance::{Extras, Instance};
use crate::schema::{FieldEntry, KeyTarget, Schema};
use crate::value::{Mapping, Value};

impl Schema {
    /// Build an instance from raw input keyed by declared names or aliases
    ///
    /// # Errors
    ///
    /// Returns every offending field at once: missing required fields,
    /// coercion, transform and validator failures, nested element failures,
    /// and (in `strict` mode) every unknown key.
    pub fn construct(&self, raw: Mapping) -> Result<Instance, ValidationErrors> {
        let entries = self.entries();
        let mut supplied: Vec<Option<(Value, bool)>> = vec![None; entries.len()];
        let mut unknown = Mapping::new();

        for (key, value) in raw {
            match self.lookup(&key) {
                Some(KeyTarget::Alias(index)) => supplied[index] = Some((value, true)),
                Some(KeyTarget::Name(index)) => {
                    if !matches!(supplied[index], Some((_, true))) {
                        supplied[index] = Some((value, false));
                    }
                }
                Some(KeyTarget::Computed) => {
                    tracing::trace!(model = %self.name(), key = %key, "ignoring computed field in input");
                }
                None => {
                    unknown.insert(key, value);
                }
            }
        }

        let mode = self.config().extra_mode();
        if mode == ExtraFieldsMode::Strict && !unknown.is_empty() {
            let errors = unknown
                .into_iter()
                .map(|(key, value)| FieldError::new(key, value, "extra field not permitted"))
                .collect();
            return Err(ValidationErrors::new(self.name(), errors));
        }

        let mut values = Mapping::with_capacity(entries.len());
        let mut errors = Vec::new();

        for (entry, supplied) in entries.iter().zip(supplied) {
            let spec = &entry.spec;
            let raw = match supplied {
                Some((value, _)) => value,
                None => match spec.default_value() {
                    Some(default) => default.clone(),
                    None if !spec.is_required() => Value::Null,
                    None => {
                        errors.push(FieldError::new(spec.name(), Value::Null, "field required"));
                        continue;
                    }
                },
            };
            match run_field_chain(entry, raw, &values) {
                Ok(value) => {
                    values.insert(spec.name().to_string(), value);
                }
                Err(mut field_errors) => errors.append(&mut field_errors),
            }
        }

        self.run_bulk_rules(&mut values, &mut errors);

        if !errors.is_empty() {
            tracing::debug!(model = %self.name(), errors = errors.len(), "construction failed");
            return Err(ValidationErrors::new(self.name(), errors));
        }

        let global_errors: Vec<FieldError> = self
            .config()
            .global_validators()
            .iter()
            .filter_map(|validator| {
                tracing::trace!(model = %self.name(), validator = validator.name(), "running global validator");
                validator
                    .apply(&values)
                    .err()
                    .map(|message| FieldError::new(ROOT, Value::Map(values.clone()), message))
            })
            .collect();
        if !global_errors.is_empty() {
            tracing::debug!(model = %self.name(), errors = global_errors.len(), "global validation failed");
            return Err(ValidationErrors::new(self.name(), global_errors));
        }

        let extras = match mode {
            ExtraFieldsMode::Store => Extras::Stored(unknown),
            ExtraFieldsMode::Ignore => {
                if !unknown.is_empty() {
                    tracing::debug!(model = %self.name(), dropped = unknown.len(), "ignoring extra fields");
                }
                Extras::Ignored
            }
            ExtraFieldsMode::Strict => Extras::Rejected,
        };

        tracing::debug!(model = %self.name(), fields = values.len(), "constructed instance");
        Ok(Instance {
            schema: self.clone(),
            values,
            extras,
        })
    }

    /// Build an instance from a structured mapping, e.g. the output of
    /// [`Instance::to_mapping`]
    pub fn from_mapping(&self, mapping: Mapping) -> Result<Instance, ValidationErrors> {
        self.construct(mapping)
    }

    /// Accept a mapping or an existing instance of this schema
    pub fn validate_value(&self, value: impl Into<Value>) -> Result<Instance, ValidationErrors> {
        match value.into() {
            Value::Map(mapping) => self.construct(mapping),
            Value::Model(instance) if instance.schema().same_as(self) => Ok(*instance),
            other => {
                let message = format!("expected mapping or {}, got {}", self.name(), other.kind_name());
                Err(ValidationErrors::single(self.name(), ROOT, other, message))
            }
        }
    }
}

impl Schema {
    /// Run every bulk transform rule in declaration order, then every bulk
    /// validator rule
    ///
    /// A target that fails is dropped from `values` and skipped by later rules.
    fn run_bulk_rules(&self, values: &mut Mapping, errors: &mut Vec<FieldError>) {
        let config = self.config();

        for rule in &config.apply_transforms {
            for target in &rule.fields {
                let Some(current) = self.bulk_input(target, values) else {
                    continue;
                };
                let mut value = current;
                let mut failed = None;
                for transform in &rule.units {
                    tracing::trace!(field = %target, transform = transform.name(), "applying bulk transform");
                    match transform.apply(value.clone(), values) {
                        Ok(next) => value = next,
                        Err(message) => {
                            let message = format!("transform '{}' failed: {message}", transform.name());
                            failed = Some(FieldError::new(target.as_str(), value.clone(), message));
                            break;
                        }
                    }
                }
                match failed {
                    Some(error) => {
                        values.shift_remove(target);
                        errors.push(error);
                    }
                    None => {
                        values.insert(target.clone(), value);
                    }
                }
            }
        }

        for rule in &config.apply_validators {
            for target in &rule.fields {
                let Some(value) = self.bulk_input(target, values) else {
                    continue;
                };
                let failed = rule.units.iter().find_map(|validator| {
                    tracing::trace!(field = %target, validator = validator.name(), "applying bulk validator");
                    validator
                        .apply(&value, values)
                        .err()
                        .map(|message| FieldError::new(target.as_str(), value.clone(), message))
                });
                if let Some(error) = failed {
                    values.shift_remove(target);
                    errors.push(error);
                }
            }
        }
    }

    /// Current value of a bulk target, or `None` when bulk units skip it
    fn bulk_input(&self, target: &str, values: &Mapping) -> Option<Value> {
        let value = values.get(target)?;
        let required = self
            .index_of(target)
            .is_some_and(|index| self.entries()[index].spec.is_required());
        if value.is_null() && !required {
            return None;
        }
        Some(value.clone())
    }
}

impl Instance {
    /// Assign one declared field, re-running its own chain and bulk layer
    ///
    /// The instance is left unchanged when the new value is rejected.
    /// Global validators are not re-run.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ValidationErrors> {
        let value = value.into();
        let model = self.schema.name().to_string();

        if self.schema.computed_field(name).is_some() {
            let message = format!("computed field '{name}' is read-only");
            return Err(ValidationErrors::single(model, name, value, message));
        }
        let Some(index) = self.schema.index_of(name) else {
            let message = format!("unknown field '{name}'");
            return Err(ValidationErrors::single(model, name, value, message));
        };

        let entry = &self.schema.entries()[index];
        let value = run_field_chain(entry, value, &self.values)
            .map_err(|errors| ValidationErrors::new(&model, errors))?;
        let value = run_bulk_layer(entry, value, &self.values)
            .map_err(|error| ValidationErrors::new(&model, vec![error]))?;

        tracing::trace!(model = %model, field = name, "assigned field");
        self.values.insert(name.to_string(), value);
        Ok(())
    }
}

/// Coerce, transform and validate one value, stopping at its first failure
fn run_field_chain(
    entry: &FieldEntry,
    value: Value,
    context: &Mapping,
) -> Result<Value, Vec<FieldError>> {
    let spec = &entry.spec;
    let name = spec.name();
    if value.is_null() && !spec.is_required() {
        return Ok(Value::Null);
    }

    let mut value = coerce(spec.kind(), value, name, context)?;

    for transform in spec.transforms() {
        tracing::trace!(field = name, transform = transform.name(), "applying transform");
        value = transform
            .apply(value.clone(), context)
            .map_err(|message| {
                vec![FieldError::new(
                    name,
                    value.clone(),
                    format!("transform '{}' failed: {message}", transform.name()),
                )]
            })?;
    }

    for validator in spec.validators() {
        tracing::trace!(field = name, validator = validator.name(), "applying validator");
        validator
            .apply(&value, context)
            .map_err(|message| vec![FieldError::new(name, value.clone(), message)])?;
    }

    Ok(value)
}

/// Run the bulk transforms, then bulk validators, configured for one field
fn run_bulk_layer(entry: &FieldEntry, value: Value, context: &Mapping) -> Result<Value, FieldError> {
    let name = entry.spec.name();
    if entry.bulk_transforms.is_empty() && entry.bulk_validators.is_empty() {
        return Ok(value);
    }
    if value.is_null() && !entry.spec.is_required() {
        return Ok(Value::Null);
    }

    let mut value = value;
    for transform in &entry.bulk_transforms {
        tracing::trace!(field = name, transform = transform.name(), "applying bulk transform");
        value = transform.apply(value.clone(), context).map_err(|message| {
            FieldError::new(
                name,
                value.clone(),
                format!("transform '{}' failed: {message}", transform.name()),
            )
        })?;
    }
    for validator in &entry.bulk_validators {
        tracing::trace!(field = name, validator = validator.name(), "applying bulk validator");
        validator
            .apply(&value, context)
            .map_err(|message| FieldError::new(name, value.clone(), message))?;
    }
    Ok(value)
}
