use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::error::ToolError;
use super::registry::ToolRegistry;
use super::JsonObject;
use crate::vectra::{ErrorKind, VectraClient};

/// An inbound tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: JsonObject,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one tool call, serialized as the text content of the MCP result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Ok { payload: Value },
    Error { error_detail: ErrorDetail },
}

impl ToolResult {
    pub fn ok(payload: Value) -> Self {
        ToolResult::Ok { payload }
    }

    pub fn from_error(error: &ToolError) -> Self {
        ToolResult::Error {
            error_detail: ErrorDetail {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ToolResult::Error { error_detail } => Some(error_detail.kind),
            ToolResult::Ok { .. } => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","error_detail":{{"kind":"InternalError","message":"failed to serialize result: {}"}}}}"#,
                e
            )
        })
    }
}

/// Validates tool calls against the registry and runs them against the upstream.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    client: VectraClient,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, client: VectraClient) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        let ToolCall { name, arguments } = call;
        debug!(tool = %name, "Tool call received");

        let Some(definition) = self.registry.lookup(&name) else {
            warn!(tool = %name, "Rejected call to unknown tool");
            return ToolResult::from_error(&ToolError::UnknownTool(name));
        };

        let validated = match definition.kind.validate(arguments) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call rejected");
                return ToolResult::from_error(&e);
            }
        };
        debug!(tool = %name, "Tool call validated, executing");

        match run_guarded(validated.execute(&self.client)).await {
            Ok(payload) => {
                debug!(tool = %name, "Tool call completed");
                ToolResult::ok(payload)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::InternalError | ErrorKind::UpstreamError | ErrorKind::AuthError => {
                        error!(tool = %name, kind = %e.kind(), error = %e, "Tool call failed")
                    }
                    _ => warn!(tool = %name, kind = %e.kind(), error = %e, "Tool call failed"),
                }
                ToolResult::from_error(&e)
            }
        }
    }
}

/// Runs a handler future, turning a panic into `ToolError::Internal`.
pub(crate) async fn run_guarded<F>(handler: F) -> Result<Value, ToolError>
where
    F: Future<Output = Result<Value, ToolError>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(ToolError::Internal(format!(
            "tool handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
