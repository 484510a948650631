//! Managed device tools: inventory, installed software, patch state.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{dispatch, unknown_tool, Domain, DomainModule, Operation};
use crate::client::GraphqlTransport;
use crate::filter::{clamp_max, FieldSet, ListInput, SortDirection};
use crate::tool::{parse_args, Param, ToolCallResult, ToolDefinition};

pub const LIST: &str = "superops_assets_list";
pub const GET: &str = "superops_assets_get";
pub const SOFTWARE: &str = "superops_assets_software";
pub const PATCHES: &str = "superops_assets_patches";

const LIST_DEFAULT: u32 = 50;
const DETAIL_DEFAULT: u32 = 100;
const CAP: u32 = 500;

const LIST_QUERY: &str = r#"query getAssetList($input: ListInfoInput!) {
  getAssetList(input: $input) {
    assets {
      assetId
      name
      assetClass
      status
      platform
      hostName
      lastCommunicatedTime
      client { accountId name }
      site { id name }
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

const GET_QUERY: &str = r#"query getAsset($input: AssetIdentifierInput!) {
  getAsset(input: $input) {
    assetId
    name
    assetClass
    status
    platform
    hostName
    serialNumber
    manufacturer
    model
    osName
    osVersion
    publicIp
    privateIp
    lastCommunicatedTime
    lastLoggedInUser
    client { accountId name }
    site { id name }
    customFields
  }
}"#;

const SOFTWARE_QUERY: &str = r#"query getAssetSoftwareList($assetId: ID!, $input: ListInfoInput!) {
  getAssetSoftwareList(assetId: $assetId, input: $input) {
    software {
      name
      version
      publisher
      installedDate
    }
    listInfo { hasMore nextCursor totalCount }
  }
}"#;

const PATCHES_QUERY: &str = r#"query getAssetPatchList($assetId: ID!, $input: ListInfoInput!) {
  getAssetPatchList(assetId: $assetId, input: $input) {
    patches {
      patchId
      title
      kbNumber
      severity
      status
      releaseDate
      installedDate
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
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GetArgs {
    asset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SoftwareArgs {
    asset_id: String,
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PatchesArgs {
    asset_id: String,
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// List variables with the asset id beside `input`.
fn for_asset(asset_id: String, input: ListInput) -> Value {
    let mut variables = input.into_variables();
    variables["assetId"] = Value::String(asset_id);
    variables
}

fn list(args: ListArgs) -> Operation {
    let filter = FieldSet::new()
        .optional("clientId", args.client_id)
        .optional("status", args.status)
        .build();
    Operation::new(
        LIST_QUERY,
        ListInput::new(clamp_max(args.max, LIST_DEFAULT, CAP))
            .after(args.cursor)
            .order_by("name", SortDirection::Asc)
            .filter(filter)
            .into_variables(),
    )
}

fn get(args: GetArgs) -> Operation {
    Operation::new(GET_QUERY, json!({ "input": { "assetId": args.asset_id } }))
}

fn software(args: SoftwareArgs) -> Operation {
    let input = ListInput::new(clamp_max(args.max, DETAIL_DEFAULT, CAP))
        .after(args.cursor)
        .order_by("name", SortDirection::Asc);
    Operation::new(SOFTWARE_QUERY, for_asset(args.asset_id, input))
}

fn patches(args: PatchesArgs) -> Operation {
    let input = ListInput::new(clamp_max(args.max, DETAIL_DEFAULT, CAP))
        .after(args.cursor)
        .order_by("releaseDate", SortDirection::Desc)
        .filter(FieldSet::new().optional("status", args.status).build());
    Operation::new(PATCHES_QUERY, for_asset(args.asset_id, input))
}

pub struct AssetsModule;

#[async_trait]
impl DomainModule for AssetsModule {
    fn domain(&self) -> Domain {
        Domain::Assets
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                LIST,
                "List managed assets sorted by name, optionally for one client or status.",
                &[
                    Param::integer("max", "Maximum number of assets to return (max 500)")
                        .default_value(LIST_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                    Param::string("clientId", "Only assets of this client account"),
                    Param::string("status", "Filter by asset status"),
                ],
            ),
            ToolDefinition::new(
                GET,
                "Get hardware, OS and network details of an asset.",
                &[Param::string("assetId", "The asset ID").required()],
            ),
            ToolDefinition::new(
                SOFTWARE,
                "List software installed on an asset.",
                &[
                    Param::string("assetId", "The asset ID").required(),
                    Param::integer("max", "Maximum number of entries (max 500)")
                        .default_value(DETAIL_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                ],
            ),
            ToolDefinition::new(
                PATCHES,
                "List patches for an asset, most recently released first.",
                &[
                    Param::string("assetId", "The asset ID").required(),
                    Param::integer("max", "Maximum number of entries (max 500)")
                        .default_value(DETAIL_DEFAULT),
                    Param::string("cursor", "Pagination cursor from a previous response"),
                    Param::string("status", "Filter by patch status (e.g., \"Missing\")"),
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
            SOFTWARE => parse_args(name, args).map(software),
            PATCHES => parse_args(name, args).map(patches),
            _ => return unknown_tool(self.domain(), name),
        };
        dispatch(transport, name, operation).await
    }
}
