//! MCP tool surface: typed parameters, the tool catalog, the registry and the dispatcher.

pub mod accounts;
pub mod assignments;
pub mod catalog;
pub mod detections;
pub mod dispatcher;
pub mod error;
pub mod hosts;
pub mod management;
pub mod params;
pub mod registry;
pub mod search;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

pub use catalog::{ToolKind, ValidatedCall};
pub use dispatcher::{ErrorDetail, ToolCall, ToolDispatcher, ToolResult};
pub use error::{RegistryError, ToolError};
pub use registry::{ToolDefinition, ToolRegistry};
