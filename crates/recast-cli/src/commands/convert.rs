//! Record normalization command

use anyhow::{Context, Result, bail};
use recast_core::{Instance, JsonOptions};

use super::{find_model, load_registry, read_records};

/// Validate records and write their JSON output
///
/// Nothing is written unless every record validates.
pub fn run(
    schemas: &str,
    model: &str,
    input: &str,
    output: Option<&str>,
    exclude_none: bool,
    pretty: bool,
) -> Result<()> {
    let registry = load_registry(schemas)?;
    let schema = find_model(&registry, model)?;
    let records = read_records(input)?;

    let mut instances: Vec<Instance> = Vec::with_capacity(records.len());
    let mut failed = 0;
    for (i, record) in records.into_iter().enumerate() {
        match schema.validate_value(record) {
            Ok(instance) => instances.push(instance),
            Err(errors) => {
                failed += 1;
                tracing::error!("record {}: {}", i + 1, errors);
            }
        }
    }
    if failed > 0 {
        bail!(
            "{} of {} records failed validation; nothing written",
            failed,
            failed + instances.len()
        );
    }

    let mut options = JsonOptions::new();
    if exclude_none {
        options = options.exclude_none();
    }

    let rendered = if pretty {
        let values = instances
            .iter()
            .map(|instance| instance.to_json_value(&options))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to encode records")?;
        let mut text = serde_json::to_string_pretty(&values)?;
        text.push('\n');
        text
    } else {
        let mut text = String::new();
        for instance in &instances {
            let line = instance
                .to_json_with(&options)
                .context("Failed to encode record")?;
            text.push_str(&line);
            text.push('\n');
        }
        text
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file: {}", path))?;
            tracing::info!("✓ Wrote {} record(s) to {}", instances.len(), path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
