//! Schema inspection command

use anyhow::Result;

use super::{find_model, load_registry};

/// Print the field table and fingerprint of each loaded schema
pub fn run(schemas: &str, model: Option<&str>) -> Result<()> {
    let registry = load_registry(schemas)?;

    let selected = match model {
        Some(name) => vec![find_model(&registry, name)?],
        None => registry.schemas().cloned().collect(),
    };

    for schema in &selected {
        print!("{}", schema.describe());
        println!("  fingerprint: {}", schema.fingerprint());
        println!();
    }

    tracing::info!("✓ Inspected {} schema(s)", selected.len());
    Ok(())
}
