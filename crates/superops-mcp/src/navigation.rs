//! Domain navigation and tool dispatch.
//!
//! The gateway exposes a small menu until the caller picks a domain with
//! `navigate`; then the domain's catalog is listed beside `back`. Calls to
//! tools outside the active domain switch to the owning domain implicitly.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use log::{error, info, warn};
use serde_json::Value;

use crate::client::{ClientProvider, Connection};
use crate::domains::{clients, Domain, DomainModule};
use crate::tool::{Param, ToolCallResult, ToolDefinition};

pub const NAVIGATE: &str = "navigate";
pub const BACK: &str = "back";
pub const TEST_CONNECTION: &str = "test_connection";

/// Result of a tool call plus whether the visible tool menu changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub result: ToolCallResult,
    pub tools_changed: bool,
}

/// Holds the active domain and the lazily loaded domain modules.
pub struct Navigator {
    provider: ClientProvider,
    active: Mutex<Option<Domain>>,
    modules: Mutex<HashMap<Domain, Arc<dyn DomainModule>>>,
}

impl Navigator {
    pub fn new(provider: ClientProvider) -> Self {
        Self {
            provider,
            active: Mutex::new(None),
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// `None` while in domain selection.
    pub fn active_domain(&self) -> Option<Domain> {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_active(&self, domain: Option<Domain>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = domain;
    }

    /// The module for `domain`, loaded on first use and kept afterwards.
    pub fn module(&self, domain: Domain) -> Arc<dyn DomainModule> {
        let mut modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(modules.entry(domain).or_insert_with(|| {
            info!("Loading '{}' domain", domain);
            domain.load()
        }))
    }

    /// Number of modules loaded so far.
    pub fn loaded_modules(&self) -> usize {
        self.modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Tools visible in the current state.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = vec![test_connection_tool()];
        match self.active_domain() {
            None => tools.push(navigate_tool()),
            Some(domain) => {
                tools.push(back_tool());
                tools.extend(self.module(domain).tools());
            }
        }
        tools
    }

    /// Route one `tools/call`.
    pub async fn call_tool(&self, name: &str, args: &Value) -> CallOutcome {
        let before = self.active_domain();
        let result = match name {
            TEST_CONNECTION => self.test_connection().await,
            NAVIGATE => match args.get("domain") {
                Some(Value::String(domain)) => self.navigate(domain),
                Some(other) => self.navigate(&other.to_string()),
                None => ToolCallResult::error(format!(
                    "Missing required parameter: domain. Valid domains: {}",
                    Domain::NAMES.join(", ")
                )),
            },
            BACK => self.back(),
            _ => self.dispatch(name, args).await,
        };
        CallOutcome {
            result,
            tools_changed: self.active_domain() != before,
        }
    }

    /// Enter `domain`. Invalid names leave the state unchanged.
    pub fn navigate(&self, domain: &str) -> ToolCallResult {
        let domain = match domain.parse::<Domain>() {
            Ok(domain) => domain,
            Err(e) => return ToolCallResult::error(e.to_string()),
        };
        let module = self.module(domain);
        self.set_active(Some(domain));
        info!("Navigated to '{}' domain", domain);

        let listing: Vec<String> = module
            .tools()
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect();
        ToolCallResult::text(format!(
            "Navigated to {} domain. Available tools:\n{}\n\nUse '{}' to return to domain selection.",
            domain,
            listing.join("\n"),
            BACK
        ))
    }

    /// Return to domain selection. Idempotent.
    pub fn back(&self) -> ToolCallResult {
        if let Some(previous) = self.active_domain() {
            info!("Leaving '{}' domain", previous);
        }
        self.set_active(None);
        ToolCallResult::text(format!(
            "Returned to domain selection. Available domains:\n{}\n\nUse '{}' to select a domain.",
            domain_listing(),
            NAVIGATE
        ))
    }

    /// Check credentials and round-trip a one-row clients query.
    ///
    /// The reported subdomain and region are those of the transport that ran
    /// the query.
    pub async fn test_connection(&self) -> ToolCallResult {
        if let Err(e) = self.provider.credentials() {
            return ToolCallResult::error(e.to_string());
        }
        let Connection {
            credentials,
            transport,
        } = match self.provider.connection() {
            Ok(connection) => connection,
            Err(e) => return ToolCallResult::error(format!("Connection test failed: {}", e)),
        };
        let check = clients::list_operation(1);
        guarded(TEST_CONNECTION, async move {
            match transport.execute(&check.document, check.variables).await {
                Ok(_) => ToolCallResult::text(format!(
                    "Successfully connected to SuperOps (subdomain: {}, region: {})",
                    credentials.subdomain, credentials.region
                )),
                Err(e) => {
                    warn!("Connection test failed: {}", e);
                    ToolCallResult::error(format!("Connection test failed: {}", e))
                }
            }
        })
        .await
    }

    async fn dispatch(&self, name: &str, args: &Value) -> ToolCallResult {
        let Some(domain) = self.owning_domain(name) else {
            return ToolCallResult::error(format!(
                "Unknown tool: {}. Use '{}' to select a domain first.",
                name, NAVIGATE
            ));
        };

        if let Err(e) = self.provider.credentials() {
            return ToolCallResult::error(e.to_string());
        }
        let transport = match self.provider.get() {
            Ok(transport) => transport,
            Err(e) => return ToolCallResult::error(e.to_string()),
        };

        if self.active_domain() != Some(domain) {
            info!("Switching to '{}' domain for tool '{}'", domain, name);
            self.set_active(Some(domain));
        }

        let module = self.module(domain);
        guarded(name, module.handle_call(name, args, transport.as_ref())).await
    }

    /// The active domain when it owns `name`, else the first domain that does.
    fn owning_domain(&self, name: &str) -> Option<Domain> {
        if let Some(active) = self.active_domain() {
            if self.module(active).has_tool(name) {
                return Some(active);
            }
        }
        Domain::ALL
            .into_iter()
            .find(|&domain| self.module(domain).has_tool(name))
    }
}

/// Run a tool future, turning a panic into an error result.
async fn guarded<F>(tool: &str, call: F) -> ToolCallResult
where
    F: Future<Output = ToolCallResult>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("{} panicked: {}", tool, message);
            ToolCallResult::failure(&message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

fn domain_listing() -> String {
    Domain::ALL
        .iter()
        .map(|d| format!("- {}: {}", d, d.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn navigate_tool() -> ToolDefinition {
    let description = format!(
        "Select a SuperOps domain to work in. Its tools become available after \
         navigating.\n\nDomains:\n{}",
        domain_listing()
    );
    ToolDefinition::new(
        NAVIGATE,
        &description,
        &[Param::string("domain", "The domain to open")
            .one_of(&Domain::NAMES)
            .required()],
    )
}

fn back_tool() -> ToolDefinition {
    ToolDefinition::new(
        BACK,
        "Return to domain selection and hide the current domain's tools.",
        &[],
    )
}

fn test_connection_tool() -> ToolDefinition {
    ToolDefinition::new(
        TEST_CONNECTION,
        "Verify SuperOps credentials and connectivity with a minimal query.",
        &[],
    )
}
