//! Technician and technician group tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, unknown_tool, Domain, DomainModule, Operation};
use crate::client::GraphqlTransport;
use crate::filter::{clamp_max, FieldSet, ListInput, SortDirection};
use crate::tool::{parse_args, Param, ToolCallResult, ToolDefinition};

pub const LIST: &str = "superops_technicians_list";
pub const GET: &str = "superops_technicians_get";
pub const GROUPS: &str = "superops_technicians_groups";

const LIST_DEFAULT: u32 = 50;
const LIST_CAP: u32 = 500;

const LIST_QUERY: &str = r#"query getTechnicianList($input: ListInfoInput!) {
  getTechnicianList(input: $input) {
    userList {
      userId
      name
      email
      role { roleId name }
      groups { groupId name }
      isActive
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

const GET_QUERY: &str = r#"query getTechnician($input: TechnicianIdentifierInput!) {
  getTechnician(input: $input) {
    userId
    name
    email
    contactNumber
    designation
    role { roleId name }
    groups { groupId name }
    businessFunction
    isActive
  }
}"#;

const GROUPS_QUERY: &str = r#"query getTechnicianGroupList($input: ListInfoInput!) {
  getTechnicianGroupList(input: $input) {
    groups {
      groupId
      name
      description
      members { userId name }
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default = "default_active_only")]
    active_only: bool,
    #[serde(default)]
    group_id: Option<String>,
}

fn default_active_only() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetArgs {
    technician_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GroupsArgs {
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
}

fn list(args: ListArgs) -> Operation {
    let filter = FieldSet::new()
        .set_if(args.active_only, "isActive", true)
        .optional("groupId", args.group_id)
        .build();
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
    Operation::new(GET_QUERY, json!({ "input": { "userId": args.technician_id } }))
}

fn groups(args: GroupsArgs) -> Operation {
    Operation::new(
        GROUPS_QUERY,
        ListInput::new(clamp_max(args.max, LIST_DEFAULT, LIST_CAP))
            .after(args.cursor)
            .order_by("name", SortDirection::Asc)
            .into_variables(),
    )
}

pub struct TechniciansModule;

#[async_trait]
impl DomainModule for TechniciansModule {
    fn domain(&self) -> Domain {
        Domain::Technicians
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                LIST,
                "List technicians sorted by name. Only active technicians unless \
                 activeOnly is false.",
                &[
                    Param::integer("max", "Maximum number of technicians to return (max 500)")
                        .default_value(LIST_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                    Param::boolean("activeOnly", "Only active technicians").default_value(true),
                    Param::string("groupId", "Only members of this technician group"),
                ],
            ),
            ToolDefinition::new(
                GET,
                "Get a technician's profile, role and group memberships.",
                &[Param::string("technicianId", "The technician's user ID").required()],
            ),
            ToolDefinition::new(
                GROUPS,
                "List technician groups sorted by name.",
                &[
                    Param::integer("max", "Maximum number of groups to return (max 500)")
                        .default_value(LIST_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
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
            GROUPS => parse_args(name, args).map(groups),
            _ => return unknown_tool(self.domain(), name),
        };
        dispatch(transport, name, operation).await
    }
}
