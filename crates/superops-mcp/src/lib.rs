//! SuperOps MCP Gateway
//!
//! Exposes the SuperOps PSA/RMM GraphQL API to AI assistants via Model Context
//! Protocol. Tools are grouped into domains that the assistant navigates into,
//! so only one domain's catalog is listed at a time.

pub mod client;
pub mod config;
pub mod domains;
pub mod filter;
pub mod navigation;
pub mod server;
pub mod tool;

pub use client::{ClientProvider, GraphqlTransport, SuperOpsClient, SuperOpsError};
pub use config::{ConfigError, Credentials, Region};
pub use domains::{Domain, DomainModule};
pub use navigation::{CallOutcome, Navigator};
pub use server::{GatewayServer, McpError};
pub use tool::{ToolCallResult, ToolDefinition};
