//! CLI module for makegate
//!
//! Provides command-line interface with the following subcommands:
//! - `mcp` - Start MCP server over stdio
//! - `list` - List targets in the makefile
//! - `run` - Run one target through the gate
//! - `show` - Print the makefile

pub mod commands;
pub mod mcp;

pub use commands::{Cli, Commands, LogFormat};
pub use mcp::run_mcp_server;
