//! fact-aggregator CLI
//! Runs one extraction against the configured sources, or inspects/clears
//! checkpoints.
//!
//! Config comes from `--config`, `$AGGREGATOR_CONFIG_PATH`,
//! `config/aggregator.toml` or `config/aggregator.json`, in that order.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fact_aggregator::ingest::checkpoint::CheckpointStore;
use fact_aggregator::{AggregatorConfig, Orchestrator};

#[derive(Debug, Parser)]
#[command(name = "fact-aggregator", version, about = "Tiered multi-source fact aggregation")]
struct Cli {
    /// Config file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query every configured source and print the merged result
    Extract {
        #[arg(long)]
        query: String,
        /// Required categories, comma separated
        #[arg(long, value_delimiter = ',')]
        require: Vec<String>,
        /// Run the gap-fill pass when fewer unique facts than this were found
        #[arg(long)]
        min_facts: Option<usize>,
        /// Print facts and report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
    /// Inspect or remove checkpoints
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Debug, Subcommand)]
enum CheckpointAction {
    List,
    Clear {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        source: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fact_aggregator=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AggregatorConfig> {
    match path {
        Some(p) => AggregatorConfig::load_from(p),
        None => AggregatorConfig::load_default(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Extract {
            query,
            require,
            min_facts,
            json,
            metrics,
        } => {
            let exporter = if metrics {
                Some(fact_aggregator::metrics::install_prometheus()?)
            } else {
                None
            };

            let orch = Orchestrator::from_config(&cfg)?;
            let required: Vec<String> = require
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted; cancelling in-flight calls");
                    on_signal.cancel();
                }
            });

            let (facts, report) = orch
                .extract_with_cancel(&query, &required, min_facts, cancel)
                .await;

            if json {
                let out = serde_json::json!({ "facts": facts, "report": report });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&out).context("serializing output")?
                );
            } else {
                for f in facts.iter() {
                    let year = f.year().map(|y| format!(" ({y})")).unwrap_or_default();
                    let entity = f.entity().map(|e| format!(" [{e}]")).unwrap_or_default();
                    println!(
                        "{}{}{} = {} <{}, p{}, c{:.2}>",
                        f.metric(),
                        entity,
                        year,
                        f.value(),
                        f.source(),
                        f.source_priority(),
                        f.confidence()
                    );
                }
                println!();
                println!("{}", report.summary());
            }

            if let Some(m) = exporter {
                println!();
                print!("{}", m.render());
            }
        }
        Command::Checkpoints { action } => {
            let store = CheckpointStore::new(cfg.checkpoint.dir.clone());
            match action {
                CheckpointAction::List => {
                    for cp in store.list_all() {
                        println!(
                            "{} / {}: {}/{} ({:.2}%) updated {}",
                            cp.source,
                            cp.domain,
                            cp.current_index,
                            cp.total_items,
                            cp.progress_percent,
                            cp.last_updated.to_rfc3339()
                        );
                    }
                }
                CheckpointAction::Clear { domain, source } => {
                    if store.clear(&domain, &source) {
                        println!("cleared {source} / {domain}");
                    } else {
                        println!("no checkpoint for {source} / {domain}");
                    }
                }
            }
        }
    }

    Ok(())
}
