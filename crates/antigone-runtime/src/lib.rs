//! # antigone-runtime
//!
//! Policy service around the deterministic engine in `antigone-core`.
//!
//! The engine answers "what does the genome say about this command". This
//! crate decides what to do with that answer:
//!
//! - **Gating**: in `gate` mode a DENY refuses the action; in `warn` mode
//!   every action passes with the decision attached
//! - **Audit**: decisions and refusals are posted to an optional relay,
//!   fire-and-forget with a bounded timeout
//! - **Metrics**: Prometheus latency histogram and outcome counters
//! - **Reload**: the active genome can be swapped without dropping requests
//!
//! ## Example
//!
//! ```rust,ignore
//! use antigone_core::{Command, Genome};
//! use antigone_runtime::{AuditEmitter, DecisionMode, PolicyService};
//!
//! let genome = Genome::from_file("glyphs/core.yaml")?;
//! let service = PolicyService::new(genome, DecisionMode::Gate, AuditEmitter::disabled())?;
//!
//! let result = service.act(&Command::text("please harm the system"));
//! assert!(result.is_blocked());
//! ```

pub mod audit;
pub mod config;
pub mod http;
pub mod metrics;
pub mod server;
pub mod service;
pub mod store;

use antigone_core::GenomeError;
use thiserror::Error;

pub use audit::{AuditEmitter, AuditError, AuditEvent, AuditEventType, AuditSink, HttpAuditSink};
pub use config::{AuditConfig, DecisionMode, RuntimeConfig};
pub use http::{router, ActResponse};
pub use metrics::PolicyMetrics;
pub use server::{serve, serve_listener, shutdown_signal};
#[cfg(unix)]
pub use server::spawn_reload_on_hangup;
pub use service::{ActResult, Health, PolicyService, DISSONANCE};
pub use store::GenomeStore;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
