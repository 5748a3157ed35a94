//! Genome parsing and validation.
//!
//! A genome is a YAML (or JSON) document of rules grouped into axioms,
//! principles, and duties. Documents are validated against an embedded JSON
//! Schema, compiled into matchers, and identified by the SHA-256 of their
//! source bytes.

mod parser;
mod schema;

pub use parser::{Genome, GenomeError, GenomeSummary, MatchSpec, RuleSpec};
pub use schema::validate_genome_schema;
