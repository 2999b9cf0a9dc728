//! makegate - Makefile target gate for MCP clients
//!
//! Lets an untrusted caller run targets from one Makefile without shell access:
//! - **Discovery** - A tolerant line scan turns the makefile into a target catalog
//! - **Guarding** - Target names are checked against an identifier allow-list and the catalog
//! - **Execution** - make runs as a time-bounded child in its own process group
//! - **Formatting** - Results and errors are shaped for the caller with server paths removed
//!
//! ## MCP Tools
//!
//! - `list_targets` - List targets with dependencies and descriptions
//! - `run_target` - Run one listed target with a timeout
//!
//! ## MCP Resources
//!
//! - `make://localhost/current/makefile` - The makefile text
//! - `make://localhost/targets` - The catalog as JSON

pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod guard;
pub mod mcp;
pub mod paths;
pub mod response;
pub mod service;

pub use catalog::{Catalog, TargetFilter, TargetRecord};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use context::ServerContext;
pub use error::{ErrorCategory, ErrorInfo, ExecutionError, GateError, PathError, ValidationError};
pub use executor::{ExecSpec, Execute, ExecutionResult, ProcessRunner, RunState};
pub use guard::ExecutionGuard;
pub use mcp::MakeGateServer;
pub use paths::PathValidator;
pub use response::{CatalogResponse, ErrorResponse, ResultFormatter, RunTargetResponse};
pub use service::{ExecutionRequest, GateService};
