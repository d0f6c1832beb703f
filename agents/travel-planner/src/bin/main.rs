//! Travel Planner entry point
//!
//! Serves the orchestrator over HTTP, or runs one plan from the command line
//! against remote sub-agents or in-process ones (`--local`).

use agent_faults::{FaultDirective, FaultKind};
use agent_trace::{ChannelSink, MemorySink, SinkConfig, SpanSink, TraceContext, TraceTree};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sub_agent::client::SubAgentClient;
use sub_agent::engine::SubAgent;
use sub_agent::Profile;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_planner::engine::{HttpCaller, LocalCaller, SubAgentCaller};
use travel_planner::handler::{create_router, AppState};
use travel_planner::telemetry::MetricsRegistry;
use travel_planner::{PlanRequest, Planner, PlannerConfig};

#[derive(Parser)]
#[command(name = "travel-planner")]
#[command(about = "Travel Planner - fan-out orchestrator with partial-failure handling")]
#[command(version)]
struct Cli {
    /// Weather sub-agent base URL
    #[arg(long, global = true, default_value = "http://weather-agent:8000", env = "WEATHER_AGENT_URL")]
    weather_url: String,

    /// Events sub-agent base URL
    #[arg(long, global = true, default_value = "http://events-agent:8002", env = "EVENTS_AGENT_URL")]
    events_url: String,

    /// Per-call timeout for sub-agents, in milliseconds
    #[arg(long, global = true, default_value = "30000", env = "SUBAGENT_TIMEOUT_MS")]
    call_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Run one plan and print the response
    Plan {
        /// Destination city
        destination: String,

        /// Orchestrator fault (partial_failure, fan_out_timeout, high_latency)
        #[arg(long)]
        orchestrator_fault: Option<FaultKind>,

        /// Fault for the weather agent
        #[arg(long)]
        weather_fault: Option<FaultKind>,

        /// Fault for the events agent
        #[arg(long)]
        events_fault: Option<FaultKind>,

        /// Run the sub-agents in-process instead of calling them
        #[arg(long)]
        local: bool,
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

    let config = PlannerConfig {
        call_timeout: Duration::from_millis(cli.call_timeout_ms),
        ..PlannerConfig::default()
    };

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let planner = remote_planner(config, &cli.weather_url, &cli.events_url);

            let sink = Arc::new(ChannelSink::new(SinkConfig::from_env("travel-planner")));
            let metrics = Arc::new(MetricsRegistry::new()?);
            let state = Arc::new(AppState::new(planner, sink, metrics));
            let router = create_router(state);

            tracing::info!(
                weather = %cli.weather_url,
                events = %cli.events_url,
                call_timeout_ms = cli.call_timeout_ms,
                "Starting Travel Planner on {}",
                addr
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Plan {
            destination,
            orchestrator_fault,
            weather_fault,
            events_fault,
            local,
        } => {
            let mut request = PlanRequest::new(destination);
            if let Some(kind) = orchestrator_fault {
                request = request.with_orchestrator_fault(FaultDirective::new(kind));
            }
            if let Some(kind) = weather_fault {
                request = request.with_agent_fault("weather", FaultDirective::new(kind));
            }
            if let Some(kind) = events_fault {
                request = request.with_agent_fault("events", FaultDirective::new(kind));
            }

            let sink = Arc::new(MemorySink::new());
            let planner = if local {
                local_planner(config, sink.clone())
            } else {
                remote_planner(config, &cli.weather_url, &cli.events_url)
            };

            let outcome = planner.plan(&request, TraceContext::root()).await?;
            sink.emit(outcome.span);

            println!("{}", serde_json::to_string_pretty(&outcome.response)?);

            if local {
                let tree = TraceTree::from_spans(sink.take());
                tracing::info!(spans = tree.len(), "Collected local trace");
                tree.verify()?;
            }
        }
    }

    Ok(())
}

fn remote_planner(config: PlannerConfig, weather_url: &str, events_url: &str) -> Planner {
    let http = reqwest::Client::new();
    let timeout = config.call_timeout;
    let caller = |url: &str| -> Arc<dyn SubAgentCaller> {
        Arc::new(HttpCaller::new(
            SubAgentClient::with_client(url, http.clone()).with_timeout(timeout),
        ))
    };

    Planner::new(config)
        .with_agent("weather", caller(weather_url))
        .with_agent("events", caller(events_url))
}

fn local_planner(config: PlannerConfig, sink: Arc<MemorySink>) -> Planner {
    let caller = |profile: Profile| -> Arc<dyn SubAgentCaller> {
        Arc::new(LocalCaller::new(SubAgent::new(profile), sink.clone()))
    };

    Planner::new(config)
        .with_agent(Profile::Weather.agent_name(), caller(Profile::Weather))
        .with_agent(Profile::Events.agent_name(), caller(Profile::Events))
}
