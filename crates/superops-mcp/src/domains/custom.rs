//! Raw GraphQL passthrough for anything the typed domains do not cover.

use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{dispatch, unknown_tool, Domain, DomainModule, Operation};
use crate::client::GraphqlTransport;
use crate::tool::{parse_args, Param, ToolCallResult, ToolDefinition};

pub const QUERY: &str = "superops_custom_query";
pub const MUTATION: &str = "superops_custom_mutation";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QueryArgs {
    query: String,
    #[serde(default)]
    variables: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MutationArgs {
    mutation: String,
    #[serde(default)]
    variables: Option<Map<String, Value>>,
}

/// Forward a caller-supplied document as-is. Blank documents never leave the process.
fn passthrough(
    tool: &str,
    field: &str,
    document: String,
    variables: Option<Map<String, Value>>,
) -> Result<Operation, ToolCallResult> {
    if document.trim().is_empty() {
        return Err(ToolCallResult::error(format!(
            "Invalid arguments for {}: {} must not be empty",
            tool, field
        )));
    }
    Ok(Operation {
        document: Cow::Owned(document),
        variables: variables.map(Value::Object),
    })
}

pub struct CustomModule;

#[async_trait]
impl DomainModule for CustomModule {
    fn domain(&self) -> Domain {
        Domain::Custom
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                QUERY,
                "Run an arbitrary GraphQL query against the SuperOps API. Use when no \
                 typed tool covers the data you need.",
                &[
                    Param::string("query", "GraphQL query document").required(),
                    Param::object("variables", "Variables for the query"),
                ],
            ),
            ToolDefinition::new(
                MUTATION,
                "Run an arbitrary GraphQL mutation against the SuperOps API. Changes \
                 data; prefer the typed ticket tools where they apply.",
                &[
                    Param::string("mutation", "GraphQL mutation document").required(),
                    Param::object("variables", "Variables for the mutation"),
                ],
            ),
        ]
    }

    async fn handle_call(
        &self,
        name: &str,
        args: &Value,
        transport: &dyn GraphqlTransport,
    ) -> ToolCallResult {
        let operation = match name {
            QUERY => parse_args::<QueryArgs>(name, args)
                .and_then(|a| passthrough(name, "query", a.query, a.variables)),
            MUTATION => parse_args::<MutationArgs>(name, args)
                .and_then(|a| passthrough(name, "mutation", a.mutation, a.variables)),
            _ => return unknown_tool(self.domain(), name),
        };
        dispatch(transport, name, operation).await
    }
}
