//! Decision metrics in Prometheus text exposition format.
//!
//! Each service owns its own [`Registry`]; nothing is registered globally.

use antigone_core::Stance;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::RuntimeError;

/// Latency buckets for decisions, in milliseconds.
const DECISION_MS_BUCKETS: &[f64] = &[5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0];

/// Metrics recorded by the policy service.
pub struct PolicyMetrics {
    registry: Registry,

    /// Decision latency
    pub decision_ms: Histogram,

    /// Decisions by outcome
    pub decisions_total: IntCounterVec,

    /// Refused actions by reason
    pub refusals_total: IntCounterVec,

    /// 1 for the active genome, labelled by its hash
    pub genome_info: IntGaugeVec,
}

impl PolicyMetrics {
    /// Create and register all metrics in a fresh registry.
    pub fn new() -> Result<Self, RuntimeError> {
        let registry = Registry::new();

        let decision_ms = Histogram::with_opts(
            HistogramOpts::new("antigone_decision_ms", "Decision latency in milliseconds")
                .buckets(DECISION_MS_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(decision_ms.clone()))?;

        let decisions_total = IntCounterVec::new(
            Opts::new("antigone_decisions_total", "Decisions by outcome"),
            &["decision"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let refusals_total = IntCounterVec::new(
            Opts::new("antigone_refusals_total", "Refused actions by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(refusals_total.clone()))?;

        let genome_info = IntGaugeVec::new(
            Opts::new("antigone_genome_info", "Active genome, labelled by sha256"),
            &["sha256"],
        )?;
        registry.register(Box::new(genome_info.clone()))?;

        Ok(Self {
            registry,
            decision_ms,
            decisions_total,
            refusals_total,
            genome_info,
        })
    }

    /// Record one decision and how long it took.
    pub fn record_decision(&self, decision: Stance, elapsed_ms: f64) {
        self.decision_ms.observe(elapsed_ms);
        self.decisions_total
            .with_label_values(&[decision.as_str()])
            .inc();
    }

    /// Record one refused action.
    pub fn record_refusal(&self, reason: &str) {
        self.refusals_total.with_label_values(&[reason]).inc();
    }

    /// Mark `sha256` as the only active genome.
    pub fn set_active_genome(&self, sha256: &str) {
        self.genome_info.reset();
        self.genome_info.with_label_values(&[sha256]).set(1);
    }

    /// Encode every metric in the text exposition format.
    pub fn export(&self) -> Result<String, RuntimeError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| RuntimeError::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
