//! CLI command implementations

pub mod check;
pub mod convert;
pub mod inspect;

use std::path::Path;

use anyhow::{Context, Result, bail};
use recast_core::{Registry, Schema};

/// Load schema documents from a file or directory
pub fn load_registry(schemas: &str) -> Result<Registry> {
    let registry = Registry::load_path(schemas)
        .with_context(|| format!("Failed to load schemas from {}", schemas))?;
    tracing::debug!("Loaded {} schema(s) from {}", registry.len(), schemas);
    Ok(registry)
}

/// Look up one model, listing the known names when it is missing
pub fn find_model(registry: &Registry, model: &str) -> Result<Schema> {
    match registry.get(model) {
        Some(schema) => Ok(schema.clone()),
        None => {
            let known: Vec<&str> = registry.schemas().map(Schema::name).collect();
            bail!("Unknown model '{}' (known: {})", model, known.join(", "))
        }
    }
}

/// Read input records from a `.jsonl` file or a `.json` object or array
pub fn read_records(input: &str) -> Result<Vec<serde_json::Value>> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input))?;

    let is_jsonl = Path::new(input)
        .extension()
        .is_some_and(|ext| ext == "jsonl" || ext == "ndjson");

    if is_jsonl {
        return contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid JSON on line {} of {}", i + 1, input))
            })
            .collect();
    }

    let document: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid JSON in {}", input))?;
    match document {
        serde_json::Value::Array(records) => Ok(records),
        record @ serde_json::Value::Object(_) => Ok(vec![record]),
        other => bail!(
            "Expected a JSON object or array of objects in {}, got {}",
            input,
            kind_of(&other)
        ),
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
