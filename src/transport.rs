//! Transport wiring: stdio, and the HTTP transports served through axum.

use axum::{routing::get, Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::server::VectraToolsServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportKind {
    Stdio,
    Sse,
    #[value(name = "streamable-http")]
    StreamableHttp,
}

impl TransportKind {
    /// Path the MCP endpoint is mounted at for HTTP transports.
    pub fn mount_path(self) -> Option<&'static str> {
        match self {
            TransportKind::Stdio => None,
            TransportKind::Sse => Some("/sse"),
            TransportKind::StreamableHttp => Some("/mcp"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server initialization error: {0}")]
    Init(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(
    server: VectraToolsServer,
    kind: TransportKind,
    host: &str,
    port: u16,
) -> Result<(), TransportError> {
    match kind.mount_path() {
        None => serve_stdio(server).await,
        Some(path) => serve_http(server, path, host, port).await,
    }
}

pub async fn serve_stdio(server: VectraToolsServer) -> Result<(), TransportError> {
    info!("Using stdio transport");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| TransportError::Init(e.to_string()))?;

    service
        .waiting()
        .await
        .map_err(|e| TransportError::Service(e.to_string()))?;
    info!("stdio transport finished");
    Ok(())
}

pub async fn serve_http(
    server: VectraToolsServer,
    mount_path: &str,
    host: &str,
    port: u16,
) -> Result<(), TransportError> {
    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|source| TransportError::Bind {
            address: address.clone(),
            source,
        })?;

    info!(%address, mcp = %mount_path, "Serving MCP over HTTP");
    info!(%address, "Health endpoint at GET /health");

    axum::serve(listener, http_router(server, mount_path))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

/// MCP service mounted at `mount_path` plus an unauthenticated `/health`.
pub fn http_router(server: VectraToolsServer, mount_path: &str) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest_service(mount_path, service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, VectraConfig};
    use crate::tools::{ToolDispatcher, ToolRegistry};
    use crate::vectra::VectraClient;
    use std::sync::Arc;

    fn test_server() -> VectraToolsServer {
        let config = VectraConfig::new(Credential::new("http://127.0.0.1:9", "unused"));
        let client = VectraClient::new(&config).unwrap();
        let registry = Arc::new(ToolRegistry::with_catalog().unwrap());
        VectraToolsServer::new(ToolDispatcher::new(registry, client))
    }

    #[test]
    fn test_mount_paths() {
        assert_eq!(TransportKind::Stdio.mount_path(), None);
        assert_eq!(TransportKind::Sse.mount_path(), Some("/sse"));
        assert_eq!(TransportKind::StreamableHttp.mount_path(), Some("/mcp"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let router = http_router(test_server(), "/mcp");
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let response = reqwest::get(format!("http://{}/health", address))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }
}
