//! Name → handler registry and uniform dispatch envelope.
//!
//! This is the seam the surrounding agent pipeline calls through: it
//! never touches [`forge_ide_core::workspace::Workspace`],
//! [`forge_ide_apply_patch`], or [`forge_ide_runner`] directly, only
//! [`Registry::dispatch`] with a [`forge_ide_core::contracts::ToolRequest`].

pub mod build_helpers;
pub mod handlers;
pub mod registry;

pub use registry::{Registry, ToolDescriptor, ToolHandler};

/// Build the registry with every built-in tool wired up, in the order
/// listed. Callers (the MCP server, the CLI) use this unless they need a
/// narrower set for a restricted session.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    handlers::register_all(&mut registry);
    registry
}
