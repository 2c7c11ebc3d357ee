//! The MCP protocol surface (spec §6): exactly one tool, `execute`,
//! grounded in the teacher's `mcp_server.rs`/`tools/registry.rs` pair —
//! same `ServerHandler` shape, same `Tool`-from-schema construction,
//! collapsed to a single tool instead of the teacher's four.

use crate::app::App;
use crate::sandbox::Sandbox;
use crate::sandbox_api::SandboxApi;
use opensrc_infrastructure::truncate::truncate_output;
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Arguments for the `execute` tool: a single JavaScript expression
/// evaluating to a callable, per spec §4.7.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteArgs {
    /// A JavaScript expression such as `async () => { ... }` run inside
    /// the sandbox, with the `opensrc` API available as a global.
    pub code: String,
}

fn execute_tool() -> Result<Tool, McpError> {
    let schema = schemars::schema_for!(ExecuteArgs);
    let schema_value = serde_json::to_value(schema).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    let input_schema = schema_value
        .as_object()
        .ok_or_else(|| McpError::internal_error("execute tool schema is not an object".to_string(), None))?
        .clone();

    Ok(Tool {
        name: Cow::Borrowed("execute"),
        title: None,
        description: Some(Cow::Borrowed(
            "Run a JavaScript script against the opensrc API to fetch, index, and search third-party source code. \
             The script must be a single callable expression, e.g. `async () => { return await opensrc.grep(\"TODO\"); }`.",
        )),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: Default::default(),
    })
}

/// Bridges MCP tool calls to the sandbox. Holds the long-lived `App`
/// and builds a fresh `SandboxApi`/`Sandbox` context per call.
#[derive(Clone)]
pub struct OpensrcServer {
    app: Arc<App>,
}

impl OpensrcServer {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    async fn handle_execute(&self, code: &str) -> Result<CallToolResult, McpError> {
        let sandbox = Sandbox::new().await.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let api = Arc::new(SandboxApi::new(Arc::clone(&self.app)));
        let deadline = Duration::from_millis(self.app.config.sandbox_deadline_ms);

        match sandbox.execute(api, code, deadline).await {
            Ok(result) => Ok(CallToolResult { content: vec![Content::text(truncate_output(&result))], is_error: None }),
            Err(e) => Ok(CallToolResult { content: vec![Content::text(e.to_string())], is_error: Some(true) }),
        }
    }
}

impl ServerHandler for OpensrcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "opensrc".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "opensrc - fetch and search third-party source code\n\n\
                 One tool, `execute`, runs a short JavaScript script against the `opensrc` API: \
                 fetch(specs) pulls package or repo source, grep/astGrep/semanticSearch query it, \
                 files/tree/read/readMany browse it. Call opensrc.resolve or opensrc.list first \
                 if you're unsure a source is registered."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _pagination: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult { tools: vec![execute_tool()?], meta: Default::default(), next_cursor: None })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if request.name != "execute" {
            return Err(McpError::invalid_params(format!("unknown tool: {}", request.name), None));
        }
        let args: ExecuteArgs = serde_json::from_value(serde_json::Value::Object(request.arguments.unwrap_or_default()))
            .map_err(|e| McpError::invalid_params(format!("invalid arguments: {e}"), None))?;
        self.handle_execute(&args.code).await
    }
}
