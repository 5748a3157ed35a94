//! Antigone CLI
//!
//! - `serve`: run the policy service over HTTP
//! - `check`: evaluate one command offline against a genome
//! - `hash`: print the content hash and rule counts of a genome

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use antigone_core::{Command, Decision, Genome, GenomeSummary};
use antigone_runtime::{AuditConfig, AuditEmitter, DecisionMode, PolicyService, RuntimeConfig};

/// Exit code for `check --fail-on-deny` when the verdict is DENY.
const EXIT_DENIED: u8 = 2;

#[derive(Parser)]
#[command(name = "antigone")]
#[command(about = "Deterministic rule-genome policy decisions", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, env = "ANTIGONE_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the policy service over HTTP
    Serve(ServeArgs),

    /// Evaluate a command against a genome and print the decision
    Check(CheckArgs),

    /// Print the content hash and rule counts of a genome
    Hash(HashArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Genome document (YAML or JSON)
    #[arg(long, env = "GENOME_PATH", default_value = "glyphs/core.yaml")]
    genome: PathBuf,

    /// Operating mode: warn or gate
    #[arg(long, env = "DECISION_MODE", default_value = "warn")]
    mode: String,

    /// Audit relay base URL; empty disables audit events
    #[arg(long, env = "RELAY_BASE", default_value = "")]
    relay: String,

    /// Audit delivery timeout, e.g. 2500ms or 3s
    #[arg(long, env = "AUDIT_TIMEOUT", default_value = "2500ms", value_parser = humantime::parse_duration)]
    audit_timeout: Duration,

    /// Listen address
    #[arg(long, env = "ANTIGONE_LISTEN_ADDR", default_value = "127.0.0.1:8787")]
    listen: SocketAddr,
}

#[derive(Args)]
struct CheckArgs {
    /// Genome document (YAML or JSON)
    #[arg(long, env = "GENOME_PATH", default_value = "glyphs/core.yaml")]
    genome: PathBuf,

    /// Capability granted to the command (repeatable)
    #[arg(long = "cap")]
    caps: Vec<String>,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when the verdict is DENY
    #[arg(long)]
    fail_on_deny: bool,

    /// Command text; multiple words are joined with spaces
    #[arg(required = true)]
    text: Vec<String>,
}

#[derive(Args)]
struct HashArgs {
    /// Genome document (YAML or JSON)
    #[arg(long, env = "GENOME_PATH", default_value = "glyphs/core.yaml")]
    genome: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Check(args) => run_check(args),
        Commands::Hash(args) => run_hash(args),
    }
}

/// Filter from `ANTIGONE_LOG`, then `RUST_LOG`, then `info`. Logs go to
/// stderr so `check` and `hash` output stays machine-readable.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_env("ANTIGONE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

impl ServeArgs {
    fn into_config(self) -> Result<RuntimeConfig> {
        let mode: DecisionMode = self.mode.parse()?;
        let config = RuntimeConfig {
            genome_path: self.genome,
            mode,
            audit: AuditConfig::from_relay(&self.relay, self.audit_timeout),
            listen_addr: self.listen,
        };
        config.validate()?;
        Ok(config)
    }
}

async fn run_serve(args: ServeArgs) -> Result<ExitCode> {
    let config = args.into_config()?;

    let genome = Genome::from_file(&config.genome_path)
        .with_context(|| format!("Failed to load genome {}", config.genome_path.display()))?;
    let audit = AuditEmitter::from_config(&config.audit)?;
    let service = PolicyService::new(genome, config.mode, audit)?;

    #[cfg(unix)]
    antigone_runtime::spawn_reload_on_hangup(service.clone(), config.genome_path.clone())
        .context("Failed to install SIGHUP handler")?;

    antigone_runtime::serve(service, config.listen_addr, antigone_runtime::shutdown_signal())
        .await
        .with_context(|| format!("Server on {} failed", config.listen_addr))?;

    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let genome = Genome::from_file(&args.genome)
        .with_context(|| format!("Failed to load genome {}", args.genome.display()))?;

    let command = Command::text(args.text.join(" ")).with_capabilities(args.caps);
    let decision = genome.decide(&command);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print!("{}", render_decision(&decision));
    }

    if args.fail_on_deny && decision.is_deny() {
        return Ok(ExitCode::from(EXIT_DENIED));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_hash(args: HashArgs) -> Result<ExitCode> {
    let genome = Genome::from_file(&args.genome)
        .with_context(|| format!("Failed to load genome {}", args.genome.display()))?;
    let summary = genome.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(ExitCode::SUCCESS)
}

fn render_decision(decision: &Decision) -> String {
    let mut out = format!(
        "{} score={:.3} allow={:.3} deny={:.3} warn={:.3}\n",
        decision.decision.as_str().to_uppercase(),
        decision.rounded_score(),
        decision.allow,
        decision.deny,
        decision.warn,
    );
    for hit in &decision.hits {
        out.push_str(&format!(
            "  {:<9} {:<24} {:<5} {:.3}  {}\n",
            hit.category.section(),
            hit.id,
            hit.stance.as_str(),
            hit.weight,
            hit.why
        ));
    }
    out.push_str(&format!("genome {}\n", decision.genome_sha256));
    out
}

fn render_summary(summary: &GenomeSummary) -> String {
    let mut out = format!("{}\n", summary.genome_sha256);
    if let Some(version) = &summary.schema_version {
        out.push_str(&format!("schema     {}\n", version));
    }
    out.push_str(&format!("axioms     {}\n", summary.axioms));
    out.push_str(&format!("principles {}\n", summary.principles));
    out.push_str(&format!("duties     {}\n", summary.duties));
    if summary.inert > 0 {
        out.push_str(&format!("inert      {}\n", summary.inert));
    }
    out
}
