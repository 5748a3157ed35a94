//! JSON Schema validation for genomes.
//!
//! Every genome document is checked against `schema/genome.schema.json`
//! before it is deserialized, so shape errors are reported with the path of
//! the offending value rather than as a bare serde message.

use jsonschema::Validator;
use std::sync::OnceLock;

const GENOME_SCHEMA_JSON: &str = include_str!("../../schema/genome.schema.json");

static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static Validator, String> {
    VALIDATOR
        .get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(GENOME_SCHEMA_JSON)
                .map_err(|e| format!("genome schema is not valid JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("genome schema does not compile: {}", e))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate a genome document against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_genome_schema(genome_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator()
        .map_err(|e| vec![e])?
        .iter_errors(genome_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
