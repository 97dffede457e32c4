//! Recast Core Library
//!
//! This crate provides schema-driven validation, transformation and
//! serialization of records:
//! - Field descriptors with ordered transform and validator chains
//! - Frozen per-type schemas built once and shared read-only
//! - A construction pipeline with aggregated, field-qualified errors
//! - Mapping and JSON conversion honoring aliases and exclusions
//! - Declarative YAML schema documents
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Fields    │────▶│   Schema    │────▶│   Engine    │────▶│  Serialize  │
//! │ (or YAML)   │     │  (frozen)   │     │ + coercion  │     │ mapping/JSON│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_core::{builtins, Field, Schema};
//!
//! let user = Schema::builder("User")
//!     .field(Field::string("email").transforms([builtins::trim(), builtins::lower()]).validate(builtins::email()))
//!     .field(Field::int("age").validate(builtins::range(Some(0.0), Some(120.0))))
//!     .build()?;
//!
//! let instance = user.from_json(r#"{"email": "  A@B.com ", "age": 25}"#)?;
//! assert_eq!(instance.get("email").and_then(|v| v.as_str()), Some("a@b.com"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod coerce;
pub mod computed;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod field;
pub mod instance;
pub mod schema;
pub mod serialize;
pub mod unit;
pub mod value;

pub use computed::ComputedField;
pub use config::{AliasStyle, Config, Encoder, ExtraFieldsMode};
pub use document::SchemaDocument;
pub use error::{EncodeError, Error, FieldError, ROOT, Result, SchemaError, ValidationErrors};
pub use field::{Field, FieldKind, FieldSpec, ListSpec, MapSpec};
pub use instance::{Extras, Instance};
pub use schema::{Registry, Schema, SchemaBuilder};
pub use serialize::{Channel, JsonOptions, MappingOptions};
pub use unit::{Args, GlobalValidator, Injection, Transform, Validator};
pub use value::{CustomValue, Mapping, Value};
