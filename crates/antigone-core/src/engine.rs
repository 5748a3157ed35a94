//! Decision engine: aggregates rule hits into a verdict.
//!
//! Classification is an ordered two-threshold rule, evaluated in this exact
//! order:
//! 1. `score > 0.3` → ALLOW, where `score = allow - deny - 0.5 * warn`
//! 2. else `deny - allow > 0.2` → DENY
//! 3. else → WARN
//!
//! The two checks look at different quantities and are never folded into
//! one comparison. A strong allow signal wins outright even when some deny
//! weight is present.
//!
//! Subtotals are plain `f64` sums compared exactly against the thresholds.
//! Weights that are not exact binary fractions can land just past a
//! threshold: two allow hits of `0.1` and `0.2` sum to
//! `0.30000000000000004` and classify ALLOW. Authors who need a hard
//! boundary should pick weights that sum exactly (`0.25`, `0.5`, ...).

use crate::command::Command;
use crate::genome::Genome;
use crate::types::{Decision, RuleHit, Stance};

/// Net score a command must exceed to be allowed.
pub const ALLOW_THRESHOLD: f64 = 0.3;

/// Margin of deny over allow weight a command must exceed to be denied.
pub const DENY_MARGIN: f64 = 0.2;

/// Factor applied to the warn subtotal in the composite score.
pub const WARN_FACTOR: f64 = 0.5;

/// Per-stance weight sums for a set of hits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StanceTotals {
    pub allow: f64,
    pub deny: f64,
    pub warn: f64,
}

impl StanceTotals {
    /// Sum hit weights by stance.
    pub fn from_hits(hits: &[RuleHit]) -> Self {
        hits.iter().fold(Self::default(), |mut totals, hit| {
            match hit.stance {
                Stance::Allow => totals.allow += hit.weight,
                Stance::Deny => totals.deny += hit.weight,
                Stance::Warn => totals.warn += hit.weight,
            }
            totals
        })
    }

    /// Composite score: `allow - deny - 0.5 * warn`.
    pub fn score(&self) -> f64 {
        self.allow - self.deny - WARN_FACTOR * self.warn
    }

    /// Apply the two-threshold classifier.
    pub fn classify(&self) -> Stance {
        if self.score() > ALLOW_THRESHOLD {
            Stance::Allow
        } else if (self.deny - self.allow) > DENY_MARGIN {
            Stance::Deny
        } else {
            Stance::Warn
        }
    }
}

/// Evaluate a command against every rule of a genome.
///
/// Pure: the same genome and command always produce the same decision.
pub fn decide(genome: &Genome, command: &Command) -> Decision {
    let hits: Vec<RuleHit> = genome
        .rules()
        .iter()
        .filter_map(|rule| rule.evaluate(command))
        .collect();

    let totals = StanceTotals::from_hits(&hits);
    let decision = totals.classify();

    tracing::debug!(
        decision = %decision,
        score = totals.score(),
        hits = hits.len(),
        "Command evaluated"
    );

    Decision {
        decision,
        score: totals.score(),
        allow: totals.allow,
        deny: totals.deny,
        warn: totals.warn,
        hits,
        genome_sha256: genome.content_hash().to_string(),
    }
}

impl Genome {
    /// Evaluate a command against this genome. See [`decide`].
    pub fn decide(&self, command: &Command) -> Decision {
        decide(self, command)
    }
}
