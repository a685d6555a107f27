//
// Purpose:
//
// This Rust application implements an MCP (Model Context Protocol) server that acts as a
// bridge to a Vectra AI platform (Brain). It exposes Vectra detections, hosts, accounts,
// assignments and search as tools that can be invoked by MCP clients (e.g., AI models,
// automation scripts).
//
// Structure:
// - `main()`: Entry point of the application. Loads `.env`, initializes logging (tracing),
//   builds the Vectra client, the tool registry and the dispatcher, then serves the
//   `VectraToolsServer` over the selected transport.
//
// - `VectraToolsServer` (`server` module): implements `rmcp::ServerHandler`. It lists the
//   registered tools and forwards `call_tool` requests to the `ToolDispatcher`.
//
// - `tools` module: typed parameter structs, the tool catalog, the registry and the
//   dispatcher that validates arguments before any upstream call.
//
// - `vectra` module:
//   - `VectraClient`: Handles communication with the Vectra REST API.
//   - `SessionManager`: Exchanges the API key for short-lived bearer tokens.
//   - Retry, rate limiting, pagination and record normalization.
//
// Workflow:
// 1. Server starts and listens for MCP requests on stdio (or HTTP).
// 2. MCP client sends a `call_tool` request.
// 3. The dispatcher looks the tool up, validates the arguments and runs the handler.
// 4. The handler calls the Vectra client, which attaches a valid session token.
// 5. The result (`status: ok` with a payload, or `status: error` with a kind and message)
//    is packaged into a `CallToolResult` and sent back to the MCP client.
//
// Configuration:
// The server requires `VECTRA_BASE_URL` and `VECTRA_API_KEY` environment variables
// to connect to the Vectra instance. Logging is controlled by `LOG_LEVEL`, `LOG_FORMAT`
// and `RUST_LOG`.

use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use mcp_server_vectra::config::{LogFormat, LoggingConfig, VectraConfig};
use mcp_server_vectra::server::VectraToolsServer;
use mcp_server_vectra::tools::{ToolDispatcher, ToolRegistry};
use mcp_server_vectra::transport::{self, TransportKind};
use mcp_server_vectra::vectra::VectraClient;

#[derive(Parser, Debug)]
#[command(name = "mcp-server-vectra")]
#[command(about = "Vectra AI Security Platform MCP Server")]
struct Args {
    /// Transport used to talk to MCP clients
    #[arg(long, env = "VECTRA_MCP_TRANSPORT", value_enum, default_value = "stdio")]
    transport: TransportKind,

    /// Bind address for HTTP transports
    #[arg(long, env = "VECTRA_MCP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port for HTTP transports
    #[arg(long, env = "VECTRA_MCP_PORT", default_value_t = 8000)]
    port: u16,

    /// Force debug logging
    #[arg(long, env = "VECTRA_MCP_DEBUG")]
    debug: bool,
}

fn init_tracing(logging: &LoggingConfig, debug: bool) {
    let level = if debug { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let logging = LoggingConfig::from_env()?;
    init_tracing(&logging, args.debug);

    tracing::info!("Starting Vectra MCP Server...");

    let config = VectraConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    tracing::debug!(
        base_url = %config.credential.base_url,
        api_version = %config.credential.api_version,
        verify_tls = config.credential.verify_tls,
        "Creating Vectra client"
    );

    let client = VectraClient::new(&config)?;
    let registry = Arc::new(ToolRegistry::with_catalog()?);
    tracing::info!(tools = registry.len(), transport = ?args.transport, "Server ready");

    let server = VectraToolsServer::new(ToolDispatcher::new(registry, client));
    transport::serve(server, args.transport, &args.host, args.port)
        .await
        .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;
    Ok(())
}
