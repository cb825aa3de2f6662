//! Bloomloop CLI
//!
//! Main entry point for serving adaptive learning sessions over HTTP.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bloomloop_engine::{create_router, AppState, Config, LlmOracle, MemorySink, SessionRegistry};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Interval between idle-session sweeps (in seconds).
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Bloomloop - Adaptive Learning Session Server
///
/// Serves learning sessions that calibrate questions to Bloom's taxonomy,
/// adapting the difficulty level to the learner's answers.
#[derive(Parser, Debug)]
#[command(name = "bloomloop")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: bloomloop.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing subscriber with appropriate filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Bloomloop starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the session server.
///
/// 1. Load and validate config
/// 2. Construct the oracle (fails fast on a missing API key)
/// 3. Start the idle-session sweep task
/// 4. Serve the HTTP API until Ctrl+C
async fn run_server(args: Args) -> anyhow::Result<()> {
    // Load configuration
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    // Construct the oracle up front so a missing key fails at startup
    let oracle = Arc::new(LlmOracle::from_config(&config.oracle).map_err(|e| {
        anyhow::anyhow!("{e}")
    })?);

    let sink = Arc::new(MemorySink::new());
    let app_state = AppState::new(config.clone(), oracle, Some(sink));
    let registry = Arc::clone(&app_state.registry);

    // Periodic idle-session sweep; sessionTtlSecs = 0 disables it
    let sweep_handle = if config.session_ttl_secs > 0 {
        let ttl = Duration::from_secs(config.session_ttl_secs);
        Some(tokio::spawn(spawn_sweep_task(registry, ttl)))
    } else {
        tracing::info!("Session expiry disabled");
        None
    };

    // Serve the HTTP API
    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let router = create_router(app_state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Bloomloop API server running on http://{addr}");
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

    if let Some(handle) = sweep_handle {
        handle.abort();
    }

    println!("Server stopped");
    Ok(())
}

/// Periodically expires idle sessions.
async fn spawn_sweep_task(registry: Arc<SessionRegistry>, ttl: Duration) {
    let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        let expired = registry.expire_idle(ttl).await;
        if expired > 0 {
            tracing::debug!(expired, "idle-session sweep complete");
        }
    }
}

/// Resolves once Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Strategy: {}", config.strategy);
    println!("  Policy: {:?}", config.policy.kind);
    if let Some(level) = config.initial_level {
        println!("  Initial level: {level}");
    }
    println!(
        "  Max failed attempts per chunk: {}",
        config.max_failed_attempts_per_chunk
    );
    println!(
        "  Max generation attempts: {}",
        config.max_generation_attempts
    );
    println!("  Oracle model: {}", config.oracle.model);
    if config.session_ttl_secs > 0 {
        println!("  Session TTL: {}s", config.session_ttl_secs);
    } else {
        println!("  Session TTL: disabled");
    }
}
