//! Sub-Agent entry point
//!
//! Serves the weather or events agent over HTTP, or runs one invocation
//! locally and prints the result.

use agent_faults::{FaultDirective, FaultKind, InjectorConfig};
use agent_trace::{ChannelSink, SinkConfig, TraceContext};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sub_agent::engine::{EngineConfig, SubAgent};
use sub_agent::handler::{create_router, AppState};
use sub_agent::{InvokeRequest, Profile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sub-agent")]
#[command(about = "Sub-Agent - single-hop agent with fault injection")]
#[command(version)]
struct Cli {
    /// Agent profile (weather, events)
    #[arg(long, global = true, default_value = "weather", env = "AGENT_PROFILE")]
    profile: Profile,

    /// How long an injected tool_timeout stalls, in milliseconds
    #[arg(long, global = true, default_value = "35000", env = "TOOL_TIMEOUT_STALL_MS")]
    timeout_budget_ms: u64,

    /// Simulated latency of every tool call, in milliseconds
    #[arg(long, global = true, default_value = "500", env = "TOOL_LATENCY_MS")]
    tool_latency_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (8000 for weather, 8002 for events)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Run one invocation locally and print the result
    Invoke {
        /// Task text
        message: String,

        /// Fault type to inject
        #[arg(short, long)]
        fault: Option<FaultKind>,

        /// Explicit location
        #[arg(short, long)]
        location: Option<String>,
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

    let config = EngineConfig {
        tool_latency: Duration::from_millis(cli.tool_latency_ms),
        injector: InjectorConfig {
            timeout_stall: Duration::from_millis(cli.timeout_budget_ms),
            ..InjectorConfig::default()
        },
    };
    let agent = SubAgent::with_config(cli.profile, config);

    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or_else(|| cli.profile.default_port());
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

            let service_name = format!("{}-agent", cli.profile.agent_name());
            let sink = Arc::new(ChannelSink::new(SinkConfig::from_env(service_name)));
            let state = Arc::new(AppState::new(agent, sink));
            let router = create_router(state);

            tracing::info!(
                profile = %cli.profile,
                agent_id = cli.profile.agent_id(),
                "Starting {} on {}",
                cli.profile.display_name(),
                addr
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Invoke {
            message,
            fault,
            location,
        } => {
            let mut request = InvokeRequest::new(message);
            request.fault = fault.map(FaultDirective::new);
            request.location = location;

            let result = agent.invoke(&request, TraceContext::root()).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.is_ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
