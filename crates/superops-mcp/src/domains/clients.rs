//! Client account tools: list, get, search.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, unknown_tool, Domain, DomainModule, Operation};
use crate::client::GraphqlTransport;
use crate::filter::{clamp_max, contains_any, FieldSet, ListInput, SortDirection};
use crate::tool::{parse_args, Param, ToolCallResult, ToolDefinition};

pub const LIST: &str = "superops_clients_list";
pub const GET: &str = "superops_clients_get";
pub const SEARCH: &str = "superops_clients_search";

const LIST_DEFAULT: u32 = 50;
const LIST_CAP: u32 = 500;
const SEARCH_DEFAULT: u32 = 20;
const SEARCH_CAP: u32 = 100;

const LIST_QUERY: &str = r#"query getClientList($input: ListInfoInput!) {
  getClientList(input: $input) {
    clients {
      accountId
      name
      stage
      status
      emailDomains
      accountManager { userId name }
      primaryContact { userId name email }
      hqSite { id name }
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

const GET_QUERY: &str = r#"query getClient($input: ClientIdentifierInput!) {
  getClient(input: $input) {
    accountId
    name
    stage
    status
    emailDomains
    accountManager { userId name email }
    primaryContact { userId name email }
    secondaryContact { userId name email }
    hqSite { id name address }
    technicianHierarchy
    customFields
  }
}"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetArgs {
    client_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max: Option<u32>,
}

/// The first page of clients, capped to `first`. Also used as the connection check.
pub fn list_operation(first: u32) -> Operation {
    Operation::new(
        LIST_QUERY,
        ListInput::new(first)
            .order_by("name", SortDirection::Asc)
            .into_variables(),
    )
}

fn list(args: ListArgs) -> Operation {
    let filter = FieldSet::new().optional("status", args.status).build();
    Operation::new(
        LIST_QUERY,
        ListInput::new(clamp_max(args.max, LIST_DEFAULT, LIST_CAP))
            .after(args.cursor)
            .order_by("name", SortDirection::Asc)
            .filter(filter)
            .into_variables(),
    )
}

fn get(args: GetArgs) -> Operation {
    Operation::new(GET_QUERY, json!({ "input": { "accountId": args.client_id } }))
}

fn search(args: SearchArgs) -> Operation {
    Operation::new(
        LIST_QUERY,
        ListInput::new(clamp_max(args.max, SEARCH_DEFAULT, SEARCH_CAP))
            .order_by("name", SortDirection::Asc)
            .filter(Some(contains_any(&["name", "emailDomains"], &args.query)))
            .into_variables(),
    )
}

/// Client account tools.
pub struct ClientsModule;

#[async_trait]
impl DomainModule for ClientsModule {
    fn domain(&self) -> Domain {
        Domain::Clients
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                LIST,
                "List client accounts sorted by name. Supports cursor pagination and \
                 an optional status filter.",
                &[
                    Param::integer("max", "Maximum number of clients to return (max 500)")
                        .default_value(LIST_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                    Param::string("status", "Filter by client status (e.g., \"Active\")"),
                ],
            ),
            ToolDefinition::new(
                GET,
                "Get full details of a client account, including contacts, sites and \
                 custom fields.",
                &[Param::string("clientId", "The client account ID").required()],
            ),
            ToolDefinition::new(
                SEARCH,
                "Search client accounts whose name or email domain contains the query.",
                &[
                    Param::string("query", "Text to search for in client names and email domains")
                        .required(),
                    Param::integer("max", "Maximum number of results (max 100)")
                        .default_value(SEARCH_DEFAULT),
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
            LIST => parse_args(name, args).map(list),
            GET => parse_args(name, args).map(get),
            SEARCH => parse_args(name, args).map(search),
            _ => return unknown_tool(self.domain(), name),
        };
        dispatch(transport, name, operation).await
    }
}
