//! MCP handler that forwards `list_tools`/`call_tool` onto the shared
//! [`forge_ide_registry::Registry`].

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use serde_json::{json, Value};
use tracing::{error, info};

use forge_ide_core::contracts::ToolRequest;
use forge_ide_registry::{default_registry, Registry};

/// MCP server handler that exposes every registered forge_ide tool.
#[derive(Clone)]
pub struct ForgeIdeToolServer {
    registry: Arc<Registry>,
    default_working_dir: PathBuf,
}

impl ForgeIdeToolServer {
    pub fn new(default_working_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(default_registry()),
            default_working_dir: default_working_dir.into(),
        }
    }

    /// Convert one registry descriptor into an MCP [`Tool`] definition.
    fn to_mcp_tool(desc: &forge_ide_registry::ToolDescriptor) -> Tool {
        let schema: JsonObject = match desc.input_schema.clone() {
            Value::Object(map) => map.into_iter().collect(),
            _ => serde_json::Map::new().into_iter().collect(),
        };
        Tool::new(
            Cow::Owned(desc.name.clone()),
            Cow::Owned(desc.description.clone()),
            Arc::new(schema),
        )
    }

    /// Pull an optional `working_dir` override out of the call arguments,
    /// falling back to the server's default. The remaining keys become
    /// the tool's own params.
    fn split_working_dir(&self, arguments: Option<JsonObject>) -> (String, Value) {
        let mut map: serde_json::Map<String, Value> = arguments.map(|o| o.into_iter().collect()).unwrap_or_default();
        let working_dir = match map.remove("working_dir") {
            Some(Value::String(s)) => s,
            _ => self.default_working_dir.to_string_lossy().into_owned(),
        };
        (working_dir, Value::Object(map))
    }
}

impl Default for ForgeIdeToolServer {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

#[allow(clippy::manual_async_fn)]
impl ServerHandler for ForgeIdeToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            let tools = self.registry.list_tools().iter().map(Self::to_mcp_tool).collect();
            Ok(ListToolsResult { tools, next_cursor: None })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        info!("MCP tool call: {}", request.name);

        let (working_dir, params) = self.split_working_dir(request.arguments);

        let tool_request = ToolRequest {
            name: request.name.to_string(),
            params,
            working_dir,
        };

        let response = self.registry.dispatch(tool_request).await;

        if response.success {
            let data = response.data.clone().unwrap_or(Value::Null);
            Ok(CallToolResult {
                content: vec![Content::text(data.to_string())],
                structured_content: Some(json!({ "success": true, "data": data })),
                is_error: Some(false),
                meta: None,
            })
        } else {
            let error = response.error.clone().unwrap_or(Value::Null);
            error!("tool '{}' failed: {}", request.name, error);
            Ok(CallToolResult {
                content: vec![Content::text(error.to_string())],
                structured_content: Some(json!({ "success": false, "error": error })),
                is_error: Some(true),
                meta: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_creation_defaults_to_cwd() {
        let server = ForgeIdeToolServer::default();
        assert_eq!(server.default_working_dir, std::env::current_dir().unwrap());
    }

    #[tokio::test]
    async fn list_tools_mirrors_the_registry() {
        let server = ForgeIdeToolServer::new(std::env::temp_dir());
        let registry_names: Vec<String> = server.registry.list_tools().into_iter().map(|t| t.name).collect();
        assert!(registry_names.contains(&"read_file".to_string()));
        assert!(registry_names.contains(&"apply_patch".to_string()));
    }

    #[test]
    fn split_working_dir_extracts_override_and_leaves_rest_as_params() {
        let server = ForgeIdeToolServer::new("/default");
        let args: JsonObject = serde_json::from_value(json!({
            "working_dir": "/override",
            "path": "foo.py",
        }))
        .unwrap();
        let (working_dir, params) = server.split_working_dir(Some(args));
        assert_eq!(working_dir, "/override");
        assert_eq!(params, json!({"path": "foo.py"}));
    }

    #[test]
    fn split_working_dir_falls_back_to_default() {
        let server = ForgeIdeToolServer::new("/default");
        let args: JsonObject = serde_json::from_value(json!({"path": "foo.py"})).unwrap();
        let (working_dir, _params) = server.split_working_dir(Some(args));
        assert_eq!(working_dir, "/default");
    }
}
