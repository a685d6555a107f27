use std::future::Future;
use std::sync::Arc;

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};
use tracing::{info, warn};

use crate::tools::{ToolCall, ToolDispatcher, ToolResult};

#[derive(Clone)]
pub struct VectraToolsServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl VectraToolsServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }
}

/// Drives one tool call until it finishes or `cancelled` resolves. A cancelled
/// call drops `work`, and with it any upstream request still in flight.
pub(crate) async fn run_until_cancelled<W, C>(
    name: &str,
    work: W,
    cancelled: C,
) -> Result<CallToolResult, McpError>
where
    W: Future<Output = ToolResult>,
    C: Future<Output = ()>,
{
    tokio::select! {
        result = work => {
            if let Some(kind) = result.error_kind() {
                info!(tool = %name, %kind, "Tool call finished with error");
            }
            Ok(to_call_tool_result(&result))
        }
        _ = cancelled => {
            warn!(tool = %name, "Tool call cancelled by client");
            Err(McpError::internal_error(format!("tool call '{}' was cancelled", name), None))
        }
    }
}

/// Wraps a tool result as a single JSON text content.
pub fn to_call_tool_result(result: &ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.to_json())];
    if result.is_error() {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for VectraToolsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "This server exposes the Vectra AI security platform to MCP clients.\n\
                Every tool returns a JSON document with 'status' set to 'ok' (result in 'payload') \
                or 'error' (details in 'error_detail' with a 'kind' and a 'message').\n\
                List tools ('list_detections', 'list_hosts', 'list_accounts', 'list_assignments', \
                'list_platform_users' and the 'advanced_search_*' tools) return {count, items, truncated, next_cursor}; \
                pass 'next_cursor' back as 'cursor' to resume and 'limit' to cap the number of items.\n\
                'unified_search' runs one query across accounts, hosts and detections.\n\
                Start an investigation with 'investigate_host' or 'get_detection_summary'; \
                triage with notes, tags, assignments and 'mark_detection_fixed'."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(
            self.dispatcher.registry().tools(),
        ))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        let call = ToolCall::new(name.clone(), request.arguments.unwrap_or_default());

        run_until_cancelled(&name, self.dispatcher.dispatch(call), context.ct.cancelled()).await
    }
}
