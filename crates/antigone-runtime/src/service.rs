//! Policy service: gating policy and observability around the engine.
//!
//! The service is transport-agnostic. The HTTP router in [`crate::http`]
//! is a thin layer over these methods.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use antigone_core::{Command, Decision, Genome, GenomeError, GenomeSummary};

use crate::audit::{AuditEmitter, AuditEvent};
use crate::config::DecisionMode;
use crate::metrics::PolicyMetrics;
use crate::store::GenomeStore;
use crate::RuntimeError;

/// Refusal reason recorded when a DENY blocks an action.
pub const DISSONANCE: &str = "dissonance";

/// Result of a gated action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActResult {
    /// Action refused; only produced in gate mode for a DENY
    Blocked { reason: String, decision: Decision },

    /// Action may proceed; the decision is attached for observability
    Passed { echo: String, decision: Decision },
}

impl ActResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ActResult::Blocked { .. })
    }

    pub fn decision(&self) -> &Decision {
        match self {
            ActResult::Blocked { decision, .. } | ActResult::Passed { decision, .. } => decision,
        }
    }
}

/// Liveness and identity of the active policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub ready: bool,
    pub mode: DecisionMode,
    pub genome_sha256: String,
    pub rules: usize,
}

/// The policy service. Cheap to clone; clones share genome, metrics and
/// audit emitter.
#[derive(Clone)]
pub struct PolicyService {
    genome: GenomeStore,
    mode: DecisionMode,
    metrics: Arc<PolicyMetrics>,
    audit: AuditEmitter,
}

impl PolicyService {
    /// Create a service serving `genome` in `mode`.
    pub fn new(genome: Genome, mode: DecisionMode, audit: AuditEmitter) -> Result<Self, RuntimeError> {
        let metrics = PolicyMetrics::new()?;
        metrics.set_active_genome(genome.content_hash());

        tracing::info!(
            mode = %mode,
            genome_sha256 = %genome.content_hash(),
            audit = audit.is_enabled(),
            "Policy service ready"
        );

        Ok(Self {
            genome: GenomeStore::new(genome),
            mode,
            metrics: Arc::new(metrics),
            audit,
        })
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    /// Snapshot of the active genome.
    pub fn genome(&self) -> Arc<Genome> {
        self.genome.current()
    }

    /// Evaluate without gating. Emits a `policy.decision` audit event.
    pub fn check(&self, command: &Command) -> Decision {
        let decision = self.evaluate(command);
        self.audit.emit(AuditEvent::decision(decision.clone(), self.mode));
        decision
    }

    /// Evaluate and apply the operating mode.
    ///
    /// In gate mode a DENY is refused and emits a `policy.refusal` event.
    /// Everything else passes through with the decision attached.
    pub fn act(&self, command: &Command) -> ActResult {
        let decision = self.evaluate(command);

        if self.mode == DecisionMode::Gate && decision.is_deny() {
            self.metrics.record_refusal(DISSONANCE);
            tracing::info!(
                hits = ?decision.hit_ids(),
                score = decision.score,
                "Action refused"
            );
            self.audit.emit(AuditEvent::refusal(
                decision.clone(),
                self.mode,
                command.text.clone(),
            ));
            return ActResult::Blocked {
                reason: DISSONANCE.to_string(),
                decision,
            };
        }

        ActResult::Passed {
            echo: command.text.clone(),
            decision,
        }
    }

    pub fn health(&self) -> Health {
        let genome = self.genome.current();
        Health {
            ready: true,
            mode: self.mode,
            genome_sha256: genome.content_hash().to_string(),
            rules: genome.len(),
        }
    }

    /// Prometheus text exposition of the service metrics.
    pub fn metrics(&self) -> Result<String, RuntimeError> {
        self.metrics.export()
    }

    /// Atomically replace the active genome.
    ///
    /// The `antigone_genome_info` label is updated inside the same swap, so
    /// it never names a genome other than the one in force.
    pub fn reload(&self, genome: Genome) -> GenomeSummary {
        let summary = genome.summary();
        let metrics = &self.metrics;
        self.genome
            .replace_with(genome, |next| metrics.set_active_genome(next.content_hash()));
        summary
    }

    /// Load a genome from `path` and swap it in. On error the active
    /// genome keeps serving.
    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<GenomeSummary, GenomeError> {
        let genome = Genome::from_file(path)?;
        Ok(self.reload(genome))
    }

    fn evaluate(&self, command: &Command) -> Decision {
        let started = Instant::now();
        let genome = self.genome.current();
        let decision = genome.decide(command);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.record_decision(decision.decision, elapsed_ms);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditError, AuditEventType, AuditSink};
    use antigone_core::Stance;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::time::Duration;

    const GENOME: &str = r#"
axioms:
  - id: non_harm
    stance: deny
    weight: 1.0
    match:
      keywords: [harm]
principles:
  - id: transparency
    stance: allow
    weight: 0.6
    match:
      keywords: [audit, trace]
"#;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn deliver(&self, event: &AuditEvent) -> Result<(), AuditError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn service(mode: DecisionMode) -> PolicyService {
        PolicyService::new(Genome::from_yaml(GENOME).unwrap(), mode, AuditEmitter::disabled()).unwrap()
    }

    #[test]
    fn test_check_never_blocks() {
        let svc = service(DecisionMode::Gate);
        let decision = svc.check(&Command::text("please harm the system"));
        assert_eq!(decision.decision, Stance::Deny);
    }

    #[test]
    fn test_gate_blocks_deny() {
        let svc = service(DecisionMode::Gate);
        let result = svc.act(&Command::text("please harm the system"));

        assert!(result.is_blocked());
        match result {
            ActResult::Blocked { reason, decision } => {
                assert_eq!(reason, DISSONANCE);
                assert_eq!(decision.hit_ids(), vec!["non_harm"]);
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn test_gate_passes_non_deny() {
        let svc = service(DecisionMode::Gate);
        for text in ["audit and trace logs", "", "nothing to see"] {
            let result = svc.act(&Command::text(text));
            assert!(!result.is_blocked());
            if let ActResult::Passed { echo, .. } = result {
                assert_eq!(echo, text);
            }
        }
    }

    #[test]
    fn test_warn_mode_never_blocks() {
        let svc = service(DecisionMode::Warn);
        let result = svc.act(&Command::text("please harm the system"));

        assert!(!result.is_blocked());
        assert_eq!(result.decision().decision, Stance::Deny);
    }

    #[test]
    fn test_mode_does_not_change_decision() {
        let warn = service(DecisionMode::Warn);
        let gate = service(DecisionMode::Gate);

        for text in ["please harm the system", "audit and trace logs", "audit but slightly harm", ""] {
            let cmd = Command::text(text);
            assert_eq!(warn.check(&cmd), gate.check(&cmd));
            assert_eq!(warn.act(&cmd).decision(), gate.act(&cmd).decision());
        }
    }

    #[test]
    fn test_health_reports_identity() {
        let svc = service(DecisionMode::Gate);
        let health = svc.health();
        assert!(health.ready);
        assert_eq!(health.mode, DecisionMode::Gate);
        assert_eq!(health.genome_sha256, svc.genome().content_hash());
        assert_eq!(health.rules, 2);
    }

    #[test]
    fn test_metrics_count_outcomes_and_refusals() {
        let svc = service(DecisionMode::Gate);
        svc.check(&Command::text("audit"));
        svc.act(&Command::text("harm"));
        svc.act(&Command::text("harm again"));

        let text = svc.metrics().unwrap();
        assert!(text.contains(r#"antigone_decisions_total{decision="allow"} 1"#));
        assert!(text.contains(r#"antigone_decisions_total{decision="deny"} 2"#));
        assert!(text.contains(r#"antigone_refusals_total{reason="dissonance"} 2"#));
        assert!(text.contains("antigone_decision_ms_count 3"));
        assert!(text.contains(&format!(
            r#"antigone_genome_info{{sha256="{}"}} 1"#,
            svc.health().genome_sha256
        )));
    }

    #[test]
    fn test_reload_swaps_genome() {
        let svc = service(DecisionMode::Gate);
        let before = svc.health().genome_sha256;

        let summary = svc.reload(
            Genome::from_yaml("principles:\n  - id: harm_ok\n    stance: allow\n    match: { keywords: [harm] }\n")
                .unwrap(),
        );
        assert_eq!(summary.principles, 1);
        assert_ne!(svc.health().genome_sha256, before);
        assert!(!svc.act(&Command::text("harm")).is_blocked());

        let text = svc.metrics().unwrap();
        assert!(!text.contains(&before));
    }

    #[test]
    fn test_concurrent_reloads_keep_genome_info_consistent() {
        let svc = service(DecisionMode::Gate);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    let yaml = format!("# revision {}\nprinciples:\n  - id: p{}\n    stance: allow\n", i, i);
                    for _ in 0..20 {
                        svc.reload(Genome::from_yaml(&yaml).unwrap());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = svc.metrics().unwrap();
        let info: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("antigone_genome_info{"))
            .collect();
        assert_eq!(
            info,
            vec![format!(r#"antigone_genome_info{{sha256="{}"}} 1"#, svc.health().genome_sha256)]
        );
    }

    #[test]
    fn test_failed_reload_keeps_serving() {
        let svc = service(DecisionMode::Gate);
        let before = svc.health().genome_sha256;

        assert!(svc.reload_from_path("/nonexistent/genome.yaml").is_err());
        assert_eq!(svc.health().genome_sha256, before);
        assert!(svc.act(&Command::text("harm")).is_blocked());
    }

    #[tokio::test]
    async fn test_audit_events_for_check_and_refusal() {
        let sink = Arc::new(RecordingSink::default());
        let svc = PolicyService::new(
            Genome::from_yaml(GENOME).unwrap(),
            DecisionMode::Gate,
            AuditEmitter::new(sink.clone(), Duration::from_secs(1)),
        )
        .unwrap();

        svc.check(&Command::text("audit"));
        svc.act(&Command::text("harm"));
        svc.act(&Command::text("trace"));

        // Deliveries are detached; give them a moment to land.
        for _ in 0..50 {
            if sink.events.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        let kinds: Vec<AuditEventType> = events.iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&AuditEventType::Decision));
        assert!(kinds.contains(&AuditEventType::Refusal));

        let refusal = events
            .iter()
            .find(|e| e.event_type == AuditEventType::Refusal)
            .unwrap();
        assert_eq!(refusal.cmd.as_deref(), Some("harm"));
        assert_eq!(refusal.mode, DecisionMode::Gate);
    }

    proptest! {
        #[test]
        fn prop_mode_never_changes_decision(text in "(harm|audit|trace|please| ){0,10}") {
            let warn = service(DecisionMode::Warn);
            let gate = service(DecisionMode::Gate);
            let cmd = Command::text(text);

            let gated = gate.act(&cmd);
            prop_assert_eq!(warn.check(&cmd), gate.check(&cmd));
            let warned = warn.act(&cmd);
            prop_assert_eq!(warned.decision(), gated.decision());
            prop_assert_eq!(gated.is_blocked(), gated.decision().is_deny());
        }
    }
}
