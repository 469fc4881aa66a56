//! querybridge service
//!
//! Answers natural-language queries over HTTP:
//! - Gemini function calling as the model provider
//! - an MCP tool peer spawned over stdio, connected at startup and closed
//!   on shutdown
//! - `POST /query` and `GET /health`

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use qb_chat::{create_router, Orchestrator, OrchestratorConfig};
use qb_core::MAX_ITERATIONS;
use qb_llm::{GeminiClient, LlmProvider};
use qb_mcp::{McpConnection, PeerConfig, ToolPeer};

mod middleware;

use middleware::MiddlewareConfig;

#[derive(Parser, Debug)]
#[command(name = "querybridge")]
#[command(about = "Natural-language query service backed by Gemini and an MCP tool peer")]
#[command(version)]
struct Args {
    /// Bind address (host:port)
    #[arg(short, long, env = "QB_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Command that starts the tool peer (e.g. `python`)
    #[arg(long, env = "QB_PEER_COMMAND")]
    peer_command: String,

    /// Argument passed to the tool peer command (repeatable)
    #[arg(
        long = "peer-arg",
        env = "QB_PEER_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    peer_args: Vec<String>,

    /// Extra environment variable for the tool peer, as KEY=VALUE (repeatable)
    #[arg(long = "peer-env", value_parser = parse_key_val)]
    peer_env: Vec<(String, String)>,

    /// Browser origin allowed by CORS (repeatable)
    #[arg(long = "cors-origin", default_value = "http://localhost:3000")]
    cors_origins: Vec<String>,

    /// Maximum model-invoke / tool-dispatch cycles per query
    #[arg(long, default_value_t = MAX_ITERATIONS)]
    max_iterations: usize,

    /// Seconds to wait for the tool peer handshake
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Seconds before an HTTP request is aborted
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from $QB_ENV_FILE, /etc/querybridge/environment or .env
    qb_core::config::load_environment();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("querybridge=info".parse()?)
                .add_directive("qb_chat=info".parse()?)
                .add_directive("qb_mcp=info".parse()?)
                .add_directive("qb_llm=info".parse()?)
                .add_directive("qb_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.max_iterations == 0 {
        bail!("--max-iterations must be at least 1");
    }

    // --- 1. Model provider ---

    let provider = GeminiClient::from_env().context("Failed to configure Gemini provider")?;
    info!("LLM Provider: {} ({})", provider.provider_type(), provider.model());

    // --- 2. Tool peer ---

    let peer_config = args.peer_env.iter().fold(
        PeerConfig::new(&args.peer_command)
            .with_args(&args.peer_args)
            .with_handshake_timeout(Duration::from_secs(args.handshake_timeout_secs)),
        |config, (key, value)| config.with_env(key, value),
    );

    let connection = Arc::new(
        McpConnection::open(peer_config)
            .await
            .with_context(|| format!("Failed to connect to tool peer `{}`", args.peer_command))?,
    );

    match connection.list_tools().await {
        Ok(tools) => info!(
            "Connected to tool peer with tools: {:?}",
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        ),
        Err(e) => warn!("Connected to tool peer but listing tools failed: {}", e),
    }

    // --- 3. HTTP server ---

    let orchestrator = Orchestrator::new(Arc::new(provider), connection.clone()).with_config(
        OrchestratorConfig {
            max_iterations: args.max_iterations,
        },
    );

    let app = middleware::apply(
        create_router(orchestrator),
        &MiddlewareConfig {
            cors_origins: args.cors_origins.clone(),
            timeout: Duration::from_secs(args.request_timeout_secs),
            request_logging: true,
        },
    );

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("HTTP Server listening on {}", args.bind);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // --- 4. Shutdown ---

    connection.close().await;
    info!("Tool peer connection closed");

    if let Err(e) = served {
        error!("HTTP server exited: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
