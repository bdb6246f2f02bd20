//! Name → handler map with validated invocation.
//!
//! `dispatch` never panics: an unknown name, a working directory outside
//! the sandbox, malformed params, or a handler error all resolve to a
//! failed [`ToolResponse`] rather than propagating up to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use forge_ide_core::contracts::{ToolRequest, ToolResponse};
use forge_ide_core::errors::{ForgeIdeError, Result};
use forge_ide_core::workspace::Workspace;
use serde_json::Value;

/// One registered tool: decodes its own params, runs against a workspace,
/// and reports its own JSON Schema for [`Registry::list_tools`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, workspace: Arc<Workspace>, params: Value) -> Result<Value>;
    fn input_schema(&self) -> Value;
}

struct ToolEntry {
    description: &'static str,
    handler: Arc<dyn ToolHandler>,
}

/// Descriptor returned by [`Registry::list_tools`]: `{name, description,
/// input_schema}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Name → handler map. Registration order is preserved (a `BTreeMap`
/// alone would re-sort it) so `list_tools` and a `ToolNotFound`'s
/// `available_tools` read back in the order tools were wired up.
#[derive(Default)]
pub struct Registry {
    order: Vec<String>,
    tools: BTreeMap<String, ToolEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            tools: BTreeMap::new(),
        }
    }

    /// Populate the map. Re-registering an existing name replaces its
    /// handler without disturbing its position in `order`.
    pub fn register(&mut self, name: &str, description: &'static str, handler: Arc<dyn ToolHandler>) {
        if !self.tools.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.tools.insert(name.to_string(), ToolEntry { description, handler });
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| {
                self.tools.get(name).map(|entry| ToolDescriptor {
                    name: name.clone(),
                    description: entry.description.to_string(),
                    input_schema: entry.handler.input_schema(),
                })
            })
            .collect()
    }

    fn available_tools(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Look up `request.name`, resolve `request.working_dir` into a fresh
    /// [`Workspace`], decode `request.params` inside the handler, and
    /// return a uniform [`ToolResponse`] envelope.
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        let Some(entry) = self.tools.get(&request.name) else {
            let err = ForgeIdeError::ToolNotFound {
                tool_name: request.name.clone(),
                available_tools: self.available_tools(),
            };
            return ToolResponse::err(&err);
        };

        let workspace = match Workspace::new(&request.working_dir) {
            Ok(w) => Arc::new(w),
            Err(e) => return ToolResponse::err(&e),
        };

        match entry.handler.call(workspace, request.params).await {
            Ok(data) => ToolResponse {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => ToolResponse::err(&e),
        }
    }
}

/// Decode `params` against `R`, wrapping a failure as a short validation
/// message rather than a `ParseError` (that kind is reserved for the
/// log/diagnostic parsers' own malformed-input cases).
pub(crate) fn decode_params<R: serde::de::DeserializeOwned>(params: Value) -> Result<R> {
    serde_json::from_value(params).map_err(|e| ForgeIdeError::Internal(format!("invalid params: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call(&self, _workspace: Arc<Workspace>, params: Value) -> Result<Value> {
            Ok(params)
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_lists_available_names() {
        let mut registry = Registry::new();
        registry.register("echo", "echoes params", Arc::new(EchoHandler));

        let dir = tempfile::tempdir().unwrap();
        let resp = registry
            .dispatch(ToolRequest {
                name: "frobnicate".into(),
                params: json!({}),
                working_dir: dir.path().to_string_lossy().into_owned(),
            })
            .await;

        assert!(!resp.success);
        let error = resp.error.unwrap();
        assert_eq!(error["kind"], "ToolNotFound");
        assert_eq!(error["available_tools"], json!(["echo"]));
    }

    #[tokio::test]
    async fn dispatch_rejects_working_dir_outside_any_root() {
        let mut registry = Registry::new();
        registry.register("echo", "echoes params", Arc::new(EchoHandler));

        let resp = registry
            .dispatch(ToolRequest {
                name: "echo".into(),
                params: json!({}),
                working_dir: "/definitely/not/a/real/path/xyz".into(),
            })
            .await;

        assert!(!resp.success);
    }

    #[tokio::test]
    async fn dispatch_success_echoes_params_back_as_data() {
        let mut registry = Registry::new();
        registry.register("echo", "echoes params", Arc::new(EchoHandler));

        let dir = tempfile::tempdir().unwrap();
        let resp = registry
            .dispatch(ToolRequest {
                name: "echo".into(),
                params: json!({"a": 1}),
                working_dir: dir.path().to_string_lossy().into_owned(),
            })
            .await;

        assert!(resp.success);
        assert_eq!(resp.data.unwrap(), json!({"a": 1}));
    }

    #[test]
    fn list_tools_preserves_registration_order() {
        let mut registry = Registry::new();
        registry.register("b_tool", "second alphabetically but registered first", Arc::new(EchoHandler));
        registry.register("a_tool", "registered second", Arc::new(EchoHandler));

        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b_tool".to_string(), "a_tool".to_string()]);
    }
}
