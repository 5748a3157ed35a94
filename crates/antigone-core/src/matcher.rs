//! Rule matching.
//!
//! Each rule's keyword triggers are compiled once, at genome load, into
//! case-insensitive literal matchers. Triggers are escaped before
//! compilation, so regex metacharacters in a keyword match themselves.
//!
//! Keywords and command text are both brought to Unicode NFC before
//! matching, so canonically equivalent spellings (precomposed `é` versus
//! `e` + U+0301) match each other.
//!
//! A rule fires when both gates pass:
//! - keyword gate: any trigger occurs in the command text
//! - capability gate: every required capability is declared
//!
//! A rule without triggers skips the keyword gate only when it carries a
//! capability requirement; a rule with neither never fires.

use regex::{Regex, RegexBuilder};
use unicode_normalization::UnicodeNormalization;

use crate::command::Command;
use crate::genome::{GenomeError, RuleSpec};
use crate::types::{Category, RuleHit, Stance};

/// Weight given to rules that do not declare one.
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// One compiled keyword trigger.
#[derive(Debug, Clone)]
pub struct Trigger {
    keyword: String,
    pattern: Regex,
}

impl Trigger {
    fn compile(keyword: &str) -> Result<Self, GenomeError> {
        let normalized: String = keyword.nfc().collect();
        let pattern = RegexBuilder::new(&regex::escape(&normalized))
            .case_insensitive(true)
            .unicode(true)
            .build()
            .map_err(|e| GenomeError::Pattern {
                keyword: keyword.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            keyword: keyword.to_string(),
            pattern,
        })
    }

    /// The literal keyword as authored.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Whether the keyword occurs anywhere in `text`, ignoring case and
    /// canonical composition.
    pub fn is_match(&self, text: &str) -> bool {
        self.is_match_nfc(&normalize(text))
    }

    fn is_match_nfc(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

fn normalize(text: &str) -> String {
    text.nfc().collect()
}

/// A rule with its triggers precompiled. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    id: String,
    category: Category,
    stance: Stance,
    weight: f64,
    triggers: Vec<Trigger>,
    required_capabilities: Vec<String>,
}

impl CompiledRule {
    /// Compile a rule declared under `category`.
    pub fn compile(category: Category, spec: RuleSpec) -> Result<Self, GenomeError> {
        let weight = spec.weight.unwrap_or(DEFAULT_WEIGHT);
        if !weight.is_finite() || weight < 0.0 {
            return Err(GenomeError::Validation(format!(
                "rule '{}' in {} has invalid weight {}",
                spec.id,
                category.section(),
                weight
            )));
        }

        let matcher = spec.matcher.unwrap_or_default();
        let keywords = matcher.keywords.unwrap_or_default();
        if keywords.iter().any(|k| k.is_empty()) {
            return Err(GenomeError::Validation(format!(
                "rule '{}' in {} has an empty keyword",
                spec.id,
                category.section()
            )));
        }
        let triggers = keywords
            .iter()
            .map(|k| Trigger::compile(k))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: spec.id,
            category,
            stance: spec.stance.unwrap_or_default(),
            weight,
            triggers,
            required_capabilities: matcher.require_caps.unwrap_or_default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn required_capabilities(&self) -> &[String] {
        &self.required_capabilities
    }

    /// A rule that can never fire: no triggers and no capability gate.
    pub fn is_inert(&self) -> bool {
        self.triggers.is_empty() && self.required_capabilities.is_empty()
    }

    /// Evaluate this rule against a command.
    pub fn evaluate(&self, command: &Command) -> Option<RuleHit> {
        self.matches(&command.text, &command.capabilities)
    }

    /// Evaluate this rule against command text and declared capabilities.
    ///
    /// Returns a [`RuleHit`] when the rule fires. The `why` trace lists
    /// `kw:<keyword>` for every matching trigger in declaration order,
    /// followed by `caps:<c1>,<c2>` when a capability gate was satisfied,
    /// all joined with `;`.
    pub fn matches(&self, text: &str, capabilities: &[String]) -> Option<RuleHit> {
        if self.is_inert() {
            return None;
        }

        let text = normalize(text);
        let mut why: Vec<String> = self
            .triggers
            .iter()
            .filter(|t| t.is_match_nfc(&text))
            .map(|t| format!("kw:{}", t.keyword))
            .collect();

        if !self.triggers.is_empty() && why.is_empty() {
            return None;
        }

        if !self.required_capabilities.is_empty() {
            let satisfied = self
                .required_capabilities
                .iter()
                .all(|cap| capabilities.iter().any(|c| c == cap));
            if !satisfied {
                return None;
            }
            why.push(format!("caps:{}", self.required_capabilities.join(",")));
        }

        Some(RuleHit {
            id: self.id.clone(),
            category: self.category,
            stance: self.stance,
            weight: self.weight,
            why: why.join(";"),
        })
    }
}
