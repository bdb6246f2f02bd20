//! MCP server runner with stdio transport.

use std::path::PathBuf;

use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::tool_handler::ForgeIdeToolServer;

/// Configuration for the MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Default working directory for tool calls that don't override it.
    pub working_dir: PathBuf,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl McpServerConfig {
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = path.into();
        self
    }
}

/// stdin/stdout transport pair.
fn stdio() -> (tokio::io::Stdin, tokio::io::Stdout) {
    (tokio::io::stdin(), tokio::io::stdout())
}

/// Run the MCP server with stdio transport. Blocks until the client
/// disconnects.
pub async fn run_mcp_server(config: McpServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Tracing goes to stderr so it never interleaves with the MCP
    // protocol bytes on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    info!("starting forge_ide MCP server (working_dir={})", config.working_dir.display());

    let server = ForgeIdeToolServer::new(config.working_dir);

    let running = server.serve(stdio()).await?;
    info!("MCP server running, waiting for client requests...");
    running.waiting().await?;
    info!("MCP server shutting down");

    tokio::task::yield_now().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_default_uses_cwd() {
        let config = McpServerConfig::default();
        assert_eq!(config.working_dir, std::env::current_dir().unwrap());
    }

    #[test]
    fn config_builder_overrides_working_dir() {
        let config = McpServerConfig::default().with_working_dir("/tmp");
        assert_eq!(config.working_dir, PathBuf::from("/tmp"));
    }
}
