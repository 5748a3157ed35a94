//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::RuntimeError;

/// How the service treats a DENY on `act`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    /// Decisions are informational; nothing is blocked
    #[default]
    Warn,

    /// A DENY blocks the action
    Gate,
}

impl DecisionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionMode::Warn => "warn",
            DecisionMode::Gate => "gate",
        }
    }
}

impl fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(DecisionMode::Warn),
            "gate" => Ok(DecisionMode::Gate),
            other => Err(RuntimeError::Config(format!(
                "unknown decision mode '{}', expected 'warn' or 'gate'",
                other
            ))),
        }
    }
}

/// Audit relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Base URL of the event relay; events are POSTed to `<base>/event`.
    /// `None` disables emission.
    #[serde(default)]
    pub relay_base: Option<String>,

    /// Upper bound on a single delivery attempt (in milliseconds)
    #[serde(with = "duration_millis", default = "default_audit_timeout")]
    pub timeout: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

fn default_audit_timeout() -> Duration {
    Duration::from_millis(2500)
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            relay_base: None,
            timeout: default_audit_timeout(),
        }
    }
}

impl AuditConfig {
    /// Build from a relay base address; an empty string disables emission.
    pub fn from_relay(relay_base: &str, timeout: Duration) -> Self {
        let trimmed = relay_base.trim().trim_end_matches('/');
        Self {
            relay_base: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.relay_base.is_some()
    }
}

/// Configuration for a policy service process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Genome document to load at startup
    pub genome_path: PathBuf,

    /// Operating mode
    #[serde(default)]
    pub mode: DecisionMode,

    /// Audit relay
    #[serde(default)]
    pub audit: AuditConfig,

    /// HTTP listen address
    pub listen_addr: SocketAddr,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            genome_path: PathBuf::from("glyphs/core.yaml"),
            mode: DecisionMode::Warn,
            audit: AuditConfig::default(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
        }
    }
}

impl RuntimeConfig {
    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.genome_path.as_os_str().is_empty() {
            return Err(RuntimeError::Config("genome path is empty".to_string()));
        }

        if self.audit.timeout.is_zero() {
            return Err(RuntimeError::Config(
                "audit timeout must be greater than zero".to_string(),
            ));
        }

        if let Some(base) = &self.audit.relay_base {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(RuntimeError::Config(format!(
                    "audit relay '{}' must be an http(s) URL",
                    base
                )));
            }
        }

        Ok(())
    }
}
