use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridcast::scheduler::{Retention, Scheduler};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gridcast",
    about = "Weather-driven demand forecasting and priority grid dispatch"
)]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one cycle per location and print the results
    Run {
        #[arg(short = 'l', long = "location", required = true)]
        locations: Vec<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Print a multi-day weather and demand outlook
    Outlook {
        #[arg(short = 'l', long)]
        location: String,

        #[arg(long, default_value_t = 5)]
        days: u32,

        #[arg(long)]
        pretty: bool,
    },
    /// Repeat cycles on an interval until Ctrl-C
    Watch {
        #[arg(short = 'l', long = "location", required = true)]
        locations: Vec<String>,

        #[arg(long, default_value_t = 300)]
        interval_seconds: u64,
    },
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = gridcast::load_config(cli.config.as_deref())?;
    let pipeline = gridcast::build_pipeline(&config).context("Failed to build pipeline")?;

    match cli.command {
        Command::Run { locations, pretty } => {
            let results = pipeline.coordinator.run_cycles(&locations).await;
            pipeline.coordinator.flush_records().await;

            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            let output: Vec<serde_json::Value> = results
                .into_iter()
                .map(|(location, result)| match result {
                    Ok(cycle) => json!(cycle),
                    Err(e) => json!({ "location": location, "error": e.to_string() }),
                })
                .collect();
            println!("{}", to_json(&output, pretty)?);

            if failed > 0 {
                anyhow::bail!("{failed} of {} cycles failed", output.len());
            }
        }
        Command::Outlook {
            location,
            days,
            pretty,
        } => {
            let outlook = pipeline
                .coordinator
                .outlook(&location, days)
                .await
                .map_err(|e| anyhow::anyhow!("Outlook failed: {e}"))?;
            println!("{}", to_json(&outlook, pretty)?);
        }
        Command::Watch {
            locations,
            interval_seconds,
        } => {
            let mut scheduler = Scheduler::new(
                pipeline.coordinator.clone(),
                locations,
                Duration::from_secs(interval_seconds.max(1)),
            );
            if let Some(store) = pipeline.store.clone() {
                scheduler = scheduler.with_retention(Retention {
                    store,
                    days: config.persistence.retention_days,
                    interval: Duration::from_secs(config.persistence.cleanup_interval_seconds),
                });
            }

            let cancel = scheduler.cancel_token();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Received shutdown signal");
                cancel.cancel();
            });

            scheduler.run().await;
        }
    }

    Ok(())
}
