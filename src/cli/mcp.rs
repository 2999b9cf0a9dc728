//! MCP server launcher
//!
//! Starts the MCP server over stdio.

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};

use crate::context::ServerContext;
use crate::mcp::MakeGateServer;

/// Run the MCP server over stdio until the client disconnects.
///
/// stdout carries the protocol, so nothing else may write to it while the
/// server is running.
///
/// # Arguments
/// * `ctx` - Resolved context shared by every request
pub async fn run_mcp_server(ctx: Arc<ServerContext>) -> Result<()> {
    let server = MakeGateServer::new(ctx);

    tracing::info!("Starting MCP server on stdio");

    let service = server.serve((stdin(), stdout())).await?;
    service.waiting().await?;

    tracing::info!("MCP client disconnected");
    Ok(())
}
