//! SuperOps tool domains.
//!
//! Each domain owns a fixed tool catalog and turns one validated tool call
//! into exactly one GraphQL operation. Modules are stateless; the navigator
//! loads them lazily and keeps them for the process lifetime.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::client::GraphqlTransport;
use crate::tool::{ToolCallResult, ToolDefinition};

pub mod assets;
pub mod clients;
pub mod custom;
pub mod technicians;
pub mod tickets;

/// Closed set of tool domains, in fallback-resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Clients,
    Tickets,
    Assets,
    Technicians,
    Custom,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Clients,
        Domain::Tickets,
        Domain::Assets,
        Domain::Technicians,
        Domain::Custom,
    ];

    /// Lower-case names, used for the `navigate` enum.
    pub const NAMES: [&'static str; 5] = ["clients", "tickets", "assets", "technicians", "custom"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Clients => "clients",
            Domain::Tickets => "tickets",
            Domain::Assets => "assets",
            Domain::Technicians => "technicians",
            Domain::Custom => "custom",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Domain::Clients => "client accounts: list, get, search",
            Domain::Tickets => "service tickets: list, get, create, update, notes, time entries",
            Domain::Assets => "managed devices: list, get, installed software, patches",
            Domain::Technicians => "technicians and technician groups",
            Domain::Custom => "raw GraphQL queries and mutations",
        }
    }

    /// Construct this domain's module.
    pub fn load(self) -> Arc<dyn DomainModule> {
        match self {
            Domain::Clients => Arc::new(clients::ClientsModule),
            Domain::Tickets => Arc::new(tickets::TicketsModule),
            Domain::Assets => Arc::new(assets::AssetsModule),
            Domain::Technicians => Arc::new(technicians::TechniciansModule),
            Domain::Custom => Arc::new(custom::CustomModule),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a name outside the closed domain set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid domain: {0}. Valid domains: clients, tickets, assets, technicians, custom")]
pub struct InvalidDomain(pub String);

impl FromStr for Domain {
    type Err = InvalidDomain;

    /// Exact lower-case names only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| InvalidDomain(s.to_string()))
    }
}

/// A domain's tool catalog and call handler.
#[async_trait]
pub trait DomainModule: Send + Sync {
    fn domain(&self) -> Domain;

    /// The fixed catalog. Pure, no I/O.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Handle one call. Unknown names are rejected before any I/O.
    async fn handle_call(
        &self,
        name: &str,
        args: &Value,
        transport: &dyn GraphqlTransport,
    ) -> ToolCallResult;

    fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name == name)
    }
}

/// One GraphQL document plus its variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub document: Cow<'static, str>,
    pub variables: Option<Value>,
}

impl Operation {
    pub fn new(document: &'static str, variables: Value) -> Self {
        Self {
            document: Cow::Borrowed(document),
            variables: Some(variables),
        }
    }
}

/// `Unknown <domain> tool: <name>`.
pub(crate) fn unknown_tool(domain: Domain, name: &str) -> ToolCallResult {
    ToolCallResult::error(format!("Unknown {} tool: {}", domain, name))
}

/// Send `operation` and shape the `data` payload into a tool result.
pub(crate) async fn run(
    transport: &dyn GraphqlTransport,
    tool: &str,
    operation: Operation,
) -> ToolCallResult {
    match transport
        .execute(&operation.document, operation.variables)
        .await
    {
        Ok(data) => ToolCallResult::json(&data),
        Err(e) => {
            warn!("{} failed: {}", tool, e);
            ToolCallResult::failure(&e)
        }
    }
}

/// Build the operation for a known tool, or send back its error result.
pub(crate) async fn dispatch(
    transport: &dyn GraphqlTransport,
    tool: &str,
    operation: Result<Operation, ToolCallResult>,
) -> ToolCallResult {
    match operation {
        Ok(operation) => run(transport, tool, operation).await,
        Err(rejected) => rejected,
    }
}
