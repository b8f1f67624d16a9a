//! # concierge-cli
//!
//! Command-line interface for the employee-data concierge.
//!
//! - `concierge request` - run a request through decision, fetch and audit
//! - `concierge check` - dry-run a decision and show how it was reached
//! - `concierge audit verify/tail` - inspect the tamper-evident audit log

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use concierge_gateway::ConciergeConfig;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Compliance-aware access to employee data.
#[derive(Parser)]
#[command(name = "concierge", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Config file (defaults to <project-root>/concierge.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a request, fetch the permitted rows, and audit it.
    Request {
        #[command(flatten)]
        request: commands::RequestArgs,
        /// Exact-match row filter (repeatable).
        #[arg(long = "filter", value_name = "COLUMN=VALUE", value_parser = commands::parse_pair)]
        filters: Vec<(String, Value)>,
    },
    /// Show the decision for a request without fetching or auditing.
    Check {
        #[command(flatten)]
        request: commands::RequestArgs,
        /// Print the decision and trace as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect the audit log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let result = run(cli);
    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "command failed");
    }
    result
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = match &cli.config {
        Some(path) => ConciergeConfig::from_file(&project_root, path)?,
        None => ConciergeConfig::load(&project_root)?,
    };

    match &cli.command {
        Commands::Request { request, filters } => {
            commands::request::execute(request, filters, &config)
        }
        Commands::Check { request, json } => commands::check::execute(request, *json, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("concierge=info".parse()?)
        .add_directive("concierge_gateway=info".parse()?)
        .add_directive("concierge_policy=info".parse()?)
        .add_directive("concierge_audit=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
