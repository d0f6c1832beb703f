//! Canary entry point

use canary::{load_weights, sample_histogram, Canary, CanaryConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "canary")]
#[command(about = "Canary - periodic travel planner calls with fault injection")]
#[command(version)]
struct Cli {
    /// Fault weights as a JSON object
    #[arg(long, global = true, env = "FAULT_WEIGHTS")]
    fault_weights: Option<String>,

    /// Fault weights file (JSON, or YAML by extension)
    #[arg(long, global = true)]
    weights_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call the planner on a fixed interval
    Run {
        /// Travel planner base URL
        #[arg(long, default_value = canary::config::DEFAULT_PLANNER_URL, env = "TRAVEL_PLANNER_URL")]
        url: String,

        /// Seconds between cycles
        #[arg(long, default_value = "30", env = "CANARY_INTERVAL")]
        interval: u64,

        /// Destinations to draw from (comma separated)
        #[arg(long, value_delimiter = ',')]
        destinations: Option<Vec<String>>,

        /// Full report every N cycles
        #[arg(long, default_value = "10")]
        report_every: u64,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Draw fault types offline and print the histogram
    Sample {
        /// Number of draws
        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let weights = load_weights(cli.fault_weights.as_deref(), cli.weights_file.as_deref())?;

    match cli.command {
        Commands::Run {
            url,
            interval,
            destinations,
            report_every,
            cycles,
        } => {
            let mut config = CanaryConfig {
                planner_url: url,
                interval: Duration::from_secs(interval),
                weights,
                report_every,
                ..CanaryConfig::default()
            };
            if let Some(destinations) = destinations {
                config.destinations = destinations.iter().map(|d| d.trim().to_string()).collect();
            }

            let mut canary = Canary::new(config)?;

            tokio::select! {
                result = canary.run(cycles) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                }
            }

            let stats = canary.stats();
            tracing::info!(
                cycles = stats.cycles,
                success_rate = stats.success_rate(),
                "Canary stopped"
            );
        }

        Commands::Sample { count } => {
            let mut rng = rand::thread_rng();
            let histogram = sample_histogram(&weights, count, &mut rng);

            println!("{:<22} {:>8} {:>9} {:>9}", "fault", "draws", "observed", "expected");
            for (kind, expected) in weights.iter() {
                let draws = histogram.get(&kind).copied().unwrap_or(0);
                println!(
                    "{:<22} {:>8} {:>8.1}% {:>8.1}%",
                    kind.as_str(),
                    draws,
                    100.0 * draws as f64 / count.max(1) as f64,
                    100.0 * expected
                );
            }
        }
    }

    Ok(())
}
