//! # MCP Server for Vectra AI
//!
//! This library provides an MCP (Model Context Protocol) server implementation
//! for the Vectra AI network detection and response platform. It allows AI models
//! and automation scripts to query and triage Vectra data through a standardized protocol.
//!
//! ## Features
//!
//! - List, count and inspect detections, hosts and accounts
//! - Add and remove notes, read and replace tags
//! - Create, list and delete analyst assignments
//! - Mark detections as fixed
//! - Advanced search over detections, hosts and accounts
//! - OAuth2 client-credential sessions with single-flight refresh
//! - Retry with backoff, client-side rate limiting and cursor pagination
//!
//! ## Usage
//!
//! The server is typically run as a standalone binary that communicates
//! over stdio with MCP clients. SSE and streamable HTTP transports are
//! available for remote clients.

pub mod config;
pub mod server;
pub mod tools;
pub mod transport;
pub mod vectra;

pub use config::{ConfigError, Credential, LoggingConfig, VectraConfig};
pub use server::VectraToolsServer;
pub use tools::{ToolCall, ToolDispatcher, ToolRegistry, ToolResult};
pub use vectra::{client::VectraClient, error::VectraApiError};
