//! openapi-bridge-mcp: MCP stdio server for an OpenAPI 3.x specification.
//!
//! Takes a specification path or URL, projects its operations as MCP tools,
//! and serves JSON-RPC over stdin/stdout, making the corresponding HTTP
//! calls on `tools/call`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use openapi_bridge_mcp::config;
use openapi_bridge_mcp::error::StartupError;
use openapi_bridge_mcp::http::{AuthScheme, ClientOptions, RetryingClient};
use openapi_bridge_mcp::loader::SpecSource;
use openapi_bridge_mcp::mcp::server::Server;
use openapi_bridge_mcp::mcp::transport::StdioTransport;
use openapi_bridge_mcp::mcp::types::ServerInfo;
use openapi_bridge_mcp::openapi::SpecDocument;
use openapi_bridge_mcp::secret::resolve_secret_reference;

/// MCP stdio server for an OpenAPI specification.
///
/// The spec argument can be a local file path, an HTTP(S) URL, or "-" to
/// read the document from stdin (JSON-RPC input then comes from the
/// controlling TTY). Auth values may be given directly or as 1Password
/// secret references (op://vault/item/field), resolved at start-up via the
/// op CLI.
#[derive(Parser, Debug)]
#[command(name = "openapi-bridge-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path or URL of the OpenAPI specification ("-" for stdin)
    #[arg(value_name = "SPEC_PATH_OR_URL")]
    spec: String,

    /// Bearer token value (will be prefixed with 'Bearer ')
    #[arg(long, value_name = "TOKEN")]
    bearer_auth: Option<String>,

    /// Basic auth value (user:pass or already base64, prefixed with 'Basic ')
    #[arg(long, value_name = "CREDENTIALS", conflicts_with = "bearer_auth")]
    basic_auth: Option<String>,

    /// Raw value for the Authorization header
    #[arg(
        long,
        value_name = "VALUE",
        conflicts_with_all = ["bearer_auth", "basic_auth"]
    )]
    raw_auth: Option<String>,

    /// Maximum number of retries for failed requests
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60, value_name = "SECONDS")]
    timeout: u64,

    /// Maximum requests per second (0 for no limit)
    #[arg(short, long, default_value_t = 0)]
    rps: u32,

    /// Path to an operation filter configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Enable debug level logging to stderr
    #[arg(short, long, conflicts_with = "silent")]
    verbose: bool,

    /// Disable all logging
    #[arg(short, long)]
    silent: bool,
}

/// Initialises the tracing subscriber.
///
/// Logging always goes to stderr; stdout carries protocol messages only.
fn init_tracing(verbose: bool, silent: bool) {
    let default_level = if silent {
        "off"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the configured auth flag, if any, into a header value.
async fn build_auth(args: &Args) -> Result<Option<reqwest::header::HeaderValue>, StartupError> {
    let scheme = if let Some(token) = &args.bearer_auth {
        let (resolved, was_secret) = resolve_secret_reference(token)
            .await
            .map_err(openapi_bridge_mcp::error::AuthError::Secret)?;
        if was_secret {
            debug!("resolved bearer auth from 1Password");
        }
        Some(AuthScheme::Bearer(resolved))
    } else if let Some(credentials) = &args.basic_auth {
        let (resolved, was_secret) = resolve_secret_reference(credentials)
            .await
            .map_err(openapi_bridge_mcp::error::AuthError::Secret)?;
        if was_secret {
            debug!("resolved basic auth from 1Password");
        }
        Some(AuthScheme::Basic(resolved))
    } else if let Some(value) = &args.raw_auth {
        let (resolved, was_secret) = resolve_secret_reference(value)
            .await
            .map_err(openapi_bridge_mcp::error::AuthError::Secret)?;
        if was_secret {
            debug!("resolved raw auth from 1Password");
        }
        Some(AuthScheme::Raw(resolved))
    } else {
        None
    };

    scheme
        .map(|s| s.header_value())
        .transpose()
        .map_err(StartupError::Auth)
}

/// Builds and runs the server until EOF or a termination signal.
async fn run(args: Args) -> Result<(), StartupError> {
    let filter = config::load_filter(args.config.as_deref())?;
    let auth = build_auth(&args).await?;

    let client = RetryingClient::new(ClientOptions {
        retries: args.retries,
        timeout: Duration::from_secs(args.timeout),
        rps: args.rps,
        auth,
    })?;

    let source = SpecSource::parse(&args.spec)?;
    let spec_data = source.load(&client).await?;
    let spec = SpecDocument::from_slice(&spec_data)?;

    let info = ServerInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let mut server = Server::new(spec, Arc::new(client), info).with_filter(filter);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    let input = source.rpc_input().await?;
    let transport = StdioTransport::new(input, tokio::io::stdout());

    info!("MCP server ready, waiting for client connection...");
    transport
        .run(&mut server, shutdown_rx)
        .await
        .map_err(|source| StartupError::Transport { source })
}

/// Translates termination signals into the shutdown channel.
#[cfg(unix)]
fn spawn_signal_listener(shutdown: tokio::sync::watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
            return;
        };
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            return;
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
        }

        let _ = shutdown.send(true);
    });
}

/// Translates Ctrl+C into the shutdown channel.
#[cfg(windows)]
fn spawn_signal_listener(shutdown: tokio::sync::watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        let _ = shutdown.send(true);
    });
}

/// Entry point for the openapi-bridge-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(args.verbose, args.silent);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        spec = %args.spec,
        "Starting openapi-bridge-mcp server"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
