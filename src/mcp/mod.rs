//! MCP Server module
//!
//! Provides MCP tools for makefile interaction:
//! - `list_targets` - List targets with dependencies and descriptions
//! - `run_target` - Run one listed target with a timeout
//!
//! And read-only resources for the makefile text and the target catalog.

pub mod resources;
pub mod server;

pub use server::MakeGateServer;
