//! # antigone-core
//!
//! Deterministic rule-genome policy decision engine.
//!
//! Given a genome (a YAML document of weighted keyword rules grouped into
//! axioms, principles and duties) and a command (text plus declared
//! capabilities), the engine answers ALLOW, DENY or WARN with a rationale
//! listing every rule that fired.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same genome and command always give the same decision
//! 2. **Total**: every well-typed command evaluates; malformed input degrades
//!    to the empty command
//! 3. **Traceable**: every decision carries its hits and the genome hash
//! 4. **Immutable**: a loaded genome is read-only and safe to share across
//!    threads
//!
//! ## Example
//!
//! ```rust,ignore
//! use antigone_core::{Command, Genome, Stance};
//!
//! let genome = Genome::from_file("glyphs/core.yaml")?;
//! let decision = genome.decide(&Command::text("please harm the system"));
//!
//! match decision.decision {
//!     Stance::Allow => println!("ALLOW ({})", decision.score),
//!     Stance::Warn => println!("WARN ({})", decision.score),
//!     Stance::Deny => println!("DENY: {:?}", decision.hit_ids()),
//! }
//! ```

pub mod command;
pub mod engine;
pub mod genome;
pub mod matcher;
pub mod types;

// Re-export main types at crate root
pub use command::Command;
pub use engine::{decide, StanceTotals, ALLOW_THRESHOLD, DENY_MARGIN, WARN_FACTOR};
pub use genome::{Genome, GenomeError, GenomeSummary, MatchSpec, RuleSpec};
pub use matcher::{CompiledRule, Trigger, DEFAULT_WEIGHT};
pub use types::{Category, Decision, RuleHit, Stance};
