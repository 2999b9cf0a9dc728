//! MCP Server implementation
//!
//! Implements the makegate tools and resources using the rmcp SDK.

use std::sync::Arc;

use rmcp::model::{
    AnnotateAble, Implementation, ListResourcesResult, PaginatedRequestParam, RawResource,
    ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents, ResourcesCapability,
    ServerCapabilities, ServerInfo, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{tool, Error as McpError, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

use super::resources::{self, ResourceKind, UriError, MAKEFILE_URI, TARGETS_URI};
use crate::context::ServerContext;
use crate::error::{ErrorCategory, GateError};
use crate::response::render;
use crate::service::{ExecutionRequest, GateService};

/// MCP Server for makegate
#[derive(Clone)]
pub struct MakeGateServer {
    service: Arc<GateService>,
}

impl MakeGateServer {
    /// Create a server over a resolved context
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            service: Arc::new(GateService::new(ctx)),
        }
    }

    pub fn service(&self) -> &GateService {
        &self.service
    }

    /// Render a gate error as a tool response
    fn tool_error(&self, err: &GateError) -> String {
        tracing::debug!("Request rejected: {} ({})", err, err.kind());
        render(&self.service.formatter().error(err))
    }

    /// Map a gate error onto the protocol's error codes
    fn protocol_error(&self, err: &GateError) -> McpError {
        let response = self.service.formatter().error(err);
        let data = serde_json::to_value(&response).ok();
        match err.category() {
            ErrorCategory::Path => McpError::resource_not_found(response.error.message, data),
            ErrorCategory::Validation => McpError::invalid_params(response.error.message, data),
            ErrorCategory::Execution | ErrorCategory::Internal => {
                McpError::internal_error(response.error.message, data)
            }
        }
    }

    fn resource(uri: &str, name: &str, description: &str, mime_type: &str) -> Resource {
        let mut raw = RawResource::new(uri, name.to_string());
        raw.description = Some(description.to_string());
        raw.mime_type = Some(mime_type.to_string());
        raw.no_annotation()
    }

    /// Resources available right now
    pub async fn available_resources(&self) -> Vec<Resource> {
        let mut resources = Vec::new();

        if self.service.makefile_available() {
            resources.push(Self::resource(
                MAKEFILE_URI,
                "Current Makefile",
                "Contents of the makefile served by this gate",
                "text/plain",
            ));
        }

        match self.service.catalog().await {
            Ok(catalog) if !catalog.is_empty() => resources.push(Self::resource(
                TARGETS_URI,
                "Make Targets",
                "Targets defined in the makefile, as JSON",
                "application/json",
            )),
            Ok(_) => {}
            Err(e) => tracing::debug!("Not listing targets resource: {}", e),
        }

        resources
    }

    /// Text of the resource at `uri`
    pub async fn resource_text(&self, uri: &str) -> Result<String, McpError> {
        let kind = resources::resolve(uri).map_err(|e| match e {
            UriError::UnsupportedScheme(_) => McpError::invalid_params(e.to_string(), None),
            UriError::UnknownPath(_) => McpError::resource_not_found(e.to_string(), None),
        })?;

        match kind {
            ResourceKind::Makefile => self
                .service
                .read_makefile()
                .await
                .map_err(|e| self.protocol_error(&e)),
            ResourceKind::Targets => self
                .service
                .list_targets(None, Some(false))
                .await
                .map(|response| render(&response))
                .map_err(|e| self.protocol_error(&e)),
        }
    }
}

// === Tool Parameter Types ===

/// Parameters for list_targets tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTargetsParams {
    /// Glob matched against the full target name (e.g., "test*")
    #[serde(default)]
    pub pattern: Option<String>,

    /// Only return targets with a `##` description
    #[serde(default)]
    pub documented_only: Option<bool>,
}

// === MCP Tool Implementations ===

#[tool(tool_box)]
impl MakeGateServer {
    /// List targets defined in the makefile
    #[tool(
        description = "List targets defined in the Makefile with their dependencies and descriptions. Optional glob pattern filters by full target name."
    )]
    pub async fn list_targets(&self, #[tool(aggr)] params: ListTargetsParams) -> String {
        match self
            .service
            .list_targets(params.pattern.as_deref(), params.documented_only)
            .await
        {
            Ok(response) => render(&response),
            Err(e) => self.tool_error(&e),
        }
    }

    /// Run a single target
    #[tool(
        description = "Run a Makefile target. Only targets listed by list_targets are accepted. Returns exit code, combined output and whether the run timed out."
    )]
    pub async fn run_target(&self, #[tool(aggr)] params: ExecutionRequest) -> String {
        match self.service.run_target(&params).await {
            Ok(response) => render(&response),
            Err(e) => self.tool_error(&e),
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for MakeGateServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "makegate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Runs targets from a single Makefile without shell access. \
                 Call list_targets first, then run_target with one of the listed names."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.available_resources().await,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.resource_text(&uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}
