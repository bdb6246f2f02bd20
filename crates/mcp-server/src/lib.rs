//! forge_ide MCP server
//!
//! Exposes every tool in [`forge_ide_registry::default_registry`] over the
//! Model Context Protocol's stdio transport, so any MCP-speaking client
//! can read/write files, search code, apply patches, and run commands
//! against a sandboxed workspace the same way an in-process agent would.
//!
//! ## Usage
//!
//! Run as an MCP server (stdio transport):
//! ```bash
//! forge-ide mcp-server --working-dir /path/to/project
//! ```

mod server;
mod tool_handler;

pub use server::{run_mcp_server, McpServerConfig};
pub use tool_handler::ForgeIdeToolServer;
