//! Scout — multi-agent research assistant.
//!
//! Two modes:
//! - `scout serve` — start the API server (HTTP intake + per-session
//!   WebSocket event streams)
//! - `scout ask <question>` — run one research session in the terminal
//!   with an in-place progress display

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use scout_core::agents::{builtin_registry, ORCHESTRATOR};
use scout_core::clarify::ClarificationBroker;
use scout_core::config::ScoutConfig;
use scout_core::notify::{ChannelRegistry, ProgressSink};
use scout_core::orchestrator::{OrchestratorConfig, OrchestratorServices, ResearchOrchestrator};
use scout_core::report::ReportAssembler;
use scout_core::runtime::{AgentRuntime, HttpAgentRuntime, HttpRuntimeConfig};

mod printer;

/// Scout - AI Research Assistant
#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Multi-agent research assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Scout API server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one research query in the terminal
    Ask {
        /// The research question
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
                .init();

            let mut config = ScoutConfig::load();
            if let Some(port) = port {
                config.port = port;
            }
            scout_server::start_server(config).await
        }
        Commands::Ask { query } => {
            // Logs go to stderr so they do not disturb the progress display.
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::WARN.into()),
                )
                .with_writer(std::io::stderr)
                .init();

            let query = query.join(" ");
            if query.trim().is_empty() {
                anyhow::bail!("usage: scout ask <question>");
            }
            run_ask(&query).await
        }
    }
}

/// One research session, driven locally. No WebSocket listeners exist in
/// this mode, so clarification requests resolve with the no-listener
/// fallback and the loop keeps going.
async fn run_ask(query: &str) -> Result<()> {
    let config = ScoutConfig::load();

    let registry = builtin_registry();
    registry.validate_handoff_graph()?;
    let registry = Arc::new(registry);

    let runtime: Arc<dyn AgentRuntime> = Arc::new(HttpAgentRuntime::new(HttpRuntimeConfig {
        endpoint: config.runtime_endpoint.clone(),
        model: config.model.clone(),
    }));

    let channels = Arc::new(ChannelRegistry::new());
    let broker = Arc::new(ClarificationBroker::new(
        channels.clone(),
        config.clarification_timeout(),
    ));

    let session_id = Uuid::new_v4().to_string();
    let sink = ProgressSink::spawn(
        session_id.clone(),
        channels.clone(),
        Some(Box::new(printer::ConsolePrinter::new())),
    );

    let orchestrator = ResearchOrchestrator::new(
        OrchestratorServices {
            runtime: runtime.clone(),
            registry: registry.clone(),
            broker,
            sink: sink.clone(),
        },
        OrchestratorConfig {
            session_id,
            entry_agent: ORCHESTRATOR.to_string(),
            max_turns: config.max_turns,
        },
    );

    let outcome = match orchestrator.run(query).await {
        Ok(outcome) => outcome,
        Err(e) => {
            sink.close().await;
            return Err(e.into());
        }
    };

    let assembler = ReportAssembler::new(runtime, registry, config.output_dir.clone());
    let report = assembler.finalize(&outcome, &sink).await;
    sink.close().await;

    println!("\n\n=== Report ===\n\n{}", report.markdown_report);
    if !report.follow_up_questions.is_empty() {
        println!("\nFollow-up questions:");
        for question in &report.follow_up_questions {
            println!("  - {question}");
        }
    }

    Ok(())
}
