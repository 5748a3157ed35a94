//! Shared types for genome evaluation.
//!
//! These are the values that cross the core boundary: the stance a rule
//! takes, the category it was declared under, the per-rule hits collected
//! during evaluation, and the final [`Decision`].

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A rule's polarity, and also the ternary outcome of a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Allow,
    Deny,
    /// Rules that omit a stance only ever warn
    #[default]
    Warn,
}

impl Stance {
    /// Lowercase label used on the wire and as a metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Stance::Allow => "allow",
            Stance::Deny => "deny",
            Stance::Warn => "warn",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Stance::Allow),
            "deny" => Ok(Stance::Deny),
            "warn" => Ok(Stance::Warn),
            other => Err(format!("unknown stance: {}", other)),
        }
    }
}

/// The genome section a rule was declared in.
///
/// Categories are informational: every category is evaluated the same way,
/// but the category fixes evaluation order and is reported with each hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Axiom,
    Principle,
    Duty,
}

impl Category {
    /// All categories in evaluation order.
    pub const ALL: [Category; 3] = [Category::Axiom, Category::Principle, Category::Duty];

    /// Name of the genome section holding this category.
    pub fn section(self) -> &'static str {
        match self {
            Category::Axiom => "axioms",
            Category::Principle => "principles",
            Category::Duty => "duties",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Axiom => "axiom",
            Category::Principle => "principle",
            Category::Duty => "duty",
        };
        f.write_str(label)
    }
}

/// One rule that fired for a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    /// Rule identifier from the genome
    pub id: String,

    /// Section the rule came from
    pub category: Category,

    /// Polarity the rule contributes
    pub stance: Stance,

    /// Weight added to the stance subtotal
    pub weight: f64,

    /// Human-readable trace, e.g. `kw:audit;kw:trace;caps:read`
    pub why: String,
}

/// Outcome of evaluating one command against a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// The ternary verdict
    pub decision: Stance,

    /// `allow - deny - 0.5 * warn`; rounded to three decimals when serialized
    #[serde(serialize_with = "serialize_rounded")]
    pub score: f64,

    /// Sum of weights of allow hits
    pub allow: f64,

    /// Sum of weights of deny hits
    pub deny: f64,

    /// Sum of weights of warn hits
    pub warn: f64,

    /// Every rule that fired, in evaluation order
    pub hits: Vec<RuleHit>,

    /// Content hash of the genome in force
    pub genome_sha256: String,
}

impl Decision {
    /// Whether the verdict is `deny`.
    pub fn is_deny(&self) -> bool {
        self.decision == Stance::Deny
    }

    /// Score rounded to three decimals, as reported to callers.
    pub fn rounded_score(&self) -> f64 {
        round3(self.score)
    }

    /// Ids of the rules that fired, in order.
    pub fn hit_ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn serialize_rounded<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(round3(*value))
}
