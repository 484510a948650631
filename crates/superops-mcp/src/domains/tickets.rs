//! Service ticket tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, unknown_tool, Domain, DomainModule, Operation};
use crate::client::GraphqlTransport;
use crate::filter::{clamp_max, FieldSet, ListInput, SortDirection};
use crate::tool::{parse_args, Param, ToolCallResult, ToolDefinition};

pub const LIST: &str = "superops_tickets_list";
pub const GET: &str = "superops_tickets_get";
pub const CREATE: &str = "superops_tickets_create";
pub const UPDATE: &str = "superops_tickets_update";
pub const ADD_NOTE: &str = "superops_tickets_add_note";
pub const LOG_TIME: &str = "superops_tickets_log_time";

const LIST_DEFAULT: u32 = 50;
const LIST_CAP: u32 = 500;

const PRIORITIES: &[&str] = &["low", "medium", "high", "critical"];
const STATUSES: &[&str] = &["open", "in_progress", "on_hold", "resolved", "closed"];

const LIST_QUERY: &str = r#"query getTicketList($input: ListInfoInput!) {
  getTicketList(input: $input) {
    tickets {
      ticketId
      displayId
      subject
      status
      priority
      createdTime
      updatedTime
      client { accountId name }
      technician { userId name }
      requester { userId name email }
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

const GET_QUERY: &str = r#"query getTicket($input: TicketIdentifierInput!) {
  getTicket(input: $input) {
    ticketId
    displayId
    subject
    description
    status
    priority
    source
    createdTime
    updatedTime
    resolutionTime
    client { accountId name }
    site { id name }
    technician { userId name email }
    techGroup { groupId name }
    requester { userId name email }
    sla { id name }
    customFields
  }
}"#;

const CREATE_MUTATION: &str = r#"mutation createTicket($input: CreateTicketInput!) {
  createTicket(input: $input) {
    ticketId
    displayId
    subject
    status
    priority
    createdTime
  }
}"#;

const UPDATE_MUTATION: &str = r#"mutation updateTicket($input: UpdateTicketInput!) {
  updateTicket(input: $input) {
    ticketId
    displayId
    subject
    status
    priority
    updatedTime
    technician { userId name }
  }
}"#;

const ADD_NOTE_MUTATION: &str = r#"mutation addTicketNote($input: TicketNoteInput!) {
  addTicketNote(input: $input) {
    noteId
    content
    privacy
    addedTime
  }
}"#;

const LOG_TIME_MUTATION: &str = r#"mutation createTimeEntry($input: TimeEntryInput!) {
  createTimeEntry(input: $input) {
    timeEntryId
    timeSpent
    billable
    notes
    createdTime
  }
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    technician_id: Option<String>,
    #[serde(default)]
    unassigned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetArgs {
    ticket_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateArgs {
    subject: String,
    client_id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    technician_id: Option<String>,
    #[serde(default)]
    requester_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateArgs {
    ticket_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    technician_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddNoteArgs {
    ticket_id: String,
    content: String,
    #[serde(default = "default_true")]
    is_private: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LogTimeArgs {
    ticket_id: String,
    minutes: u32,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default = "default_true")]
    billable: bool,
}

fn default_true() -> bool {
    true
}

fn upper(value: Option<String>) -> Option<String> {
    value.map(|v| v.to_uppercase())
}

fn list(args: ListArgs) -> Operation {
    let filter = FieldSet::new()
        .optional("status", args.status)
        .optional("priority", args.priority)
        .optional("clientId", args.client_id)
        .optional("technicianId", args.technician_id)
        .null_if(args.unassigned, "assignee")
        .build();
    Operation::new(
        LIST_QUERY,
        ListInput::new(clamp_max(args.max, LIST_DEFAULT, LIST_CAP))
            .after(args.cursor)
            .order_by("createdTime", SortDirection::Desc)
            .filter(filter)
            .into_variables(),
    )
}

fn get(args: GetArgs) -> Operation {
    Operation::new(GET_QUERY, json!({ "input": { "ticketId": args.ticket_id } }))
}

fn create(args: CreateArgs) -> Operation {
    let input = FieldSet::new()
        .set("subject", args.subject)
        .set("clientId", args.client_id)
        .optional("description", args.description)
        .optional("priority", upper(args.priority))
        .optional("technicianId", args.technician_id)
        .optional("requesterId", args.requester_id)
        .into_object();
    Operation::new(CREATE_MUTATION, json!({ "input": input }))
}

fn update(args: UpdateArgs) -> Operation {
    let input = FieldSet::new()
        .set("ticketId", args.ticket_id)
        .optional("status", upper(args.status))
        .optional("priority", upper(args.priority))
        .optional("technicianId", args.technician_id)
        .optional("subject", args.subject)
        .into_object();
    Operation::new(UPDATE_MUTATION, json!({ "input": input }))
}

fn add_note(args: AddNoteArgs) -> Operation {
    Operation::new(
        ADD_NOTE_MUTATION,
        json!({ "input": {
            "ticketId": args.ticket_id,
            "content": args.content,
            "privacy": if args.is_private { "PRIVATE" } else { "PUBLIC" },
        }}),
    )
}

fn log_time(args: LogTimeArgs) -> Result<Operation, ToolCallResult> {
    if args.minutes == 0 {
        return Err(ToolCallResult::error(format!(
            "Invalid arguments for {}: minutes must be at least 1",
            LOG_TIME
        )));
    }
    let input = FieldSet::new()
        .set("ticketId", args.ticket_id)
        .set("timeSpent", args.minutes)
        .optional("notes", args.notes)
        .set("billable", args.billable)
        .into_object();
    Ok(Operation::new(LOG_TIME_MUTATION, json!({ "input": input })))
}

/// Service ticket tools.
pub struct TicketsModule;

#[async_trait]
impl DomainModule for TicketsModule {
    fn domain(&self) -> Domain {
        Domain::Tickets
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                LIST,
                "List tickets, newest first. Filter by status, priority, client, \
                 technician, or unassigned tickets only.",
                &[
                    Param::integer("max", "Maximum number of tickets to return (max 500)")
                        .default_value(LIST_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                    Param::string("status", "Filter by ticket status"),
                    Param::string("priority", "Filter by ticket priority"),
                    Param::string("clientId", "Only tickets for this client account"),
                    Param::string("technicianId", "Only tickets assigned to this technician"),
                    Param::boolean("unassigned", "Only tickets with no assignee"),
                ],
            ),
            ToolDefinition::new(
                GET,
                "Get full details of a ticket.",
                &[Param::string("ticketId", "The ticket ID").required()],
            ),
            ToolDefinition::new(
                CREATE,
                "Create a new ticket for a client.",
                &[
                    Param::string("subject", "Ticket subject line").required(),
                    Param::string("clientId", "Client account the ticket belongs to").required(),
                    Param::string("description", "Ticket body"),
                    Param::string("priority", "Ticket priority").one_of(PRIORITIES),
                    Param::string("technicianId", "Technician to assign"),
                    Param::string("requesterId", "Requesting end user"),
                ],
            ),
            ToolDefinition::new(
                UPDATE,
                "Update the status, priority, assignee or subject of a ticket.",
                &[
                    Param::string("ticketId", "The ticket ID").required(),
                    Param::string("status", "New status").one_of(STATUSES),
                    Param::string("priority", "New priority").one_of(PRIORITIES),
                    Param::string("technicianId", "Technician to assign"),
                    Param::string("subject", "New subject line"),
                ],
            ),
            ToolDefinition::new(
                ADD_NOTE,
                "Add a note to a ticket. Notes are private unless isPrivate is false.",
                &[
                    Param::string("ticketId", "The ticket ID").required(),
                    Param::string("content", "Note text").required(),
                    Param::boolean("isPrivate", "Hide the note from the requester")
                        .default_value(true),
                ],
            ),
            ToolDefinition::new(
                LOG_TIME,
                "Log time worked against a ticket.",
                &[
                    Param::string("ticketId", "The ticket ID").required(),
                    Param::integer("minutes", "Minutes worked (at least 1)").required(),
                    Param::string("notes", "Work description"),
                    Param::boolean("billable", "Whether the time is billable").default_value(true),
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
            CREATE => parse_args(name, args).map(create),
            UPDATE => parse_args(name, args).map(update),
            ADD_NOTE => parse_args(name, args).map(add_note),
            LOG_TIME => parse_args(name, args).and_then(log_time),
            _ => return unknown_tool(self.domain(), name),
        };
        dispatch(transport, name, operation).await
    }
}
