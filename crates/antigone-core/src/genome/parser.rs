//! Genome parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_genome_schema;
use crate::matcher::CompiledRule;
use crate::types::{Category, Stance};

/// Errors that can occur when loading a genome.
#[derive(Error, Debug)]
pub enum GenomeError {
    #[error("Failed to read genome file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Genome schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Genome validation failed: {0}")]
    Validation(String),

    #[error("Failed to compile trigger '{keyword}': {message}")]
    Pattern { keyword: String, message: String },
}

/// Trigger section of an authored rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchSpec {
    /// Literal substrings, any of which triggers the rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Capabilities the command must declare, all of them
    #[serde(default, alias = "requireCaps", skip_serializing_if = "Option::is_none")]
    pub require_caps: Option<Vec<String>>,
}

/// A rule as authored in the genome document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSpec {
    /// Identifier, e.g. "non_harm"
    pub id: String,

    /// Defaults to `warn`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,

    /// Defaults to 0.5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub matcher: Option<MatchSpec>,

    /// Free-form source excerpt the rule was distilled from; not evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenomeDocument {
    #[serde(default, alias = "schemaVersion", alias = "schema")]
    schema_version: Option<String>,

    #[serde(default)]
    axioms: Option<Vec<RuleSpec>>,

    #[serde(default)]
    principles: Option<Vec<RuleSpec>>,

    #[serde(default)]
    duties: Option<Vec<RuleSpec>>,
}

/// A loaded, compiled, and hashed rule set.
///
/// Rules are held as one list in evaluation order: axioms, then principles,
/// then duties, each in document order. A `Genome` is never mutated after
/// loading; serving a different rule set means loading a new one.
#[derive(Debug, Clone)]
pub struct Genome {
    schema_version: Option<String>,
    rules: Vec<CompiledRule>,
    content_hash: String,
}

/// Rule counts and identity of a loaded genome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenomeSummary {
    pub schema_version: Option<String>,
    pub genome_sha256: String,
    pub axioms: usize,
    pub principles: usize,
    pub duties: usize,
    pub inert: usize,
}

impl Genome {
    /// Load a genome from raw document bytes.
    ///
    /// The content hash is the SHA-256 of `bytes` exactly as given. Two
    /// documents with the same rules but different formatting hash
    /// differently, and a caller that re-renders a genome before loading it
    /// gets a new hash. Hash the bytes you ship.
    ///
    /// Documents starting with `{` are parsed as JSON, everything else as
    /// YAML. Missing or null rule sections are empty.
    pub fn load(bytes: &[u8]) -> Result<Self, GenomeError> {
        let content_hash = hex::encode(Sha256::digest(bytes));

        let value: serde_json::Value = if looks_like_json(bytes) {
            serde_json::from_slice(bytes)?
        } else {
            serde_yaml::from_slice(bytes)?
        };

        validate_genome_schema(&value).map_err(GenomeError::Schema)?;
        let document: GenomeDocument = serde_json::from_value(value)?;

        let sections = [
            (Category::Axiom, document.axioms),
            (Category::Principle, document.principles),
            (Category::Duty, document.duties),
        ];

        let mut rules = Vec::new();
        for (category, specs) in sections {
            for spec in specs.unwrap_or_default() {
                rules.push(CompiledRule::compile(category, spec)?);
            }
        }

        let genome = Self {
            schema_version: document.schema_version,
            rules,
            content_hash,
        };
        genome.warn_duplicate_ids();

        tracing::info!(
            genome_sha256 = %genome.content_hash,
            rules = genome.rules.len(),
            "Genome loaded"
        );

        Ok(genome)
    }

    /// Load a genome from a YAML or JSON string.
    pub fn from_yaml(yaml: &str) -> Result<Self, GenomeError> {
        Self::load(yaml.as_bytes())
    }

    /// Load a genome from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GenomeError> {
        let bytes = fs::read(path)?;
        Self::load(&bytes)
    }

    /// Lowercase hex SHA-256 of the source bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// All rules in evaluation order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Rules declared under one category, in document order.
    pub fn rules_in(&self, category: Category) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.category() == category)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn summary(&self) -> GenomeSummary {
        GenomeSummary {
            schema_version: self.schema_version.clone(),
            genome_sha256: self.content_hash.clone(),
            axioms: self.rules_in(Category::Axiom).count(),
            principles: self.rules_in(Category::Principle).count(),
            duties: self.rules_in(Category::Duty).count(),
            inert: self.rules.iter().filter(|r| r.is_inert()).count(),
        }
    }

    /// Duplicate ids are legal and scored independently, but usually an
    /// authoring mistake.
    fn warn_duplicate_ids(&self) {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id()) {
                tracing::warn!(rule_id = rule.id(), "Duplicate rule id in genome");
            }
        }
    }
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}
