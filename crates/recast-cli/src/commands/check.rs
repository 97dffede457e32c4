//! Record validation command

use anyhow::{Result, bail};

use super::{find_model, load_registry, read_records};

/// Validate every record of the input file against one model
pub fn run(schemas: &str, model: &str, input: &str) -> Result<()> {
    let registry = load_registry(schemas)?;
    let schema = find_model(&registry, model)?;
    let records = read_records(input)?;

    tracing::info!("Checking {} record(s) against {}", records.len(), model);

    let mut failed = 0;
    for (i, record) in records.iter().enumerate() {
        if let Err(errors) = schema.validate_value(record.clone()) {
            failed += 1;
            let details: Vec<String> = errors.errors.iter().map(ToString::to_string).collect();
            println!("record {}: {}", i + 1, details.join("; "));
        }
    }

    if failed > 0 {
        bail!("{} of {} records failed validation", failed, records.len());
    }

    tracing::info!("✓ All {} record(s) are valid", records.len());
    Ok(())
}
