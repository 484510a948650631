//! Tool definitions, call results and argument decoding for the MCP boundary.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ── Tool definition ─────────────────────────────────────────────────

/// A tool advertised through `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, params: &[Param]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: input_schema(params),
        }
    }
}

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
        }
    }
}

/// One named parameter of a tool's input contract.
#[derive(Debug, Clone)]
pub struct Param {
    name: &'static str,
    kind: ParamType,
    description: &'static str,
    one_of: Option<&'static [&'static str]>,
    default: Option<Value>,
    required: bool,
}

impl Param {
    fn new(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            one_of: None,
            default: None,
            required: false,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn object(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Object, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Build `{type: "object", properties, required?}` from parameters.
///
/// `required` is omitted when no parameter is required.
pub fn input_schema(params: &[Param]) -> Value {
    let mut properties = Map::new();
    for p in params {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(p.kind.as_str()));
        prop.insert("description".into(), json!(p.description));
        if let Some(values) = p.one_of {
            prop.insert("enum".into(), json!(values));
        }
        if let Some(default) = &p.default {
            prop.insert("default".into(), default.clone());
        }
        properties.insert(p.name.to_string(), Value::Object(prop));
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));

    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}

// ── Call result ─────────────────────────────────────────────────────

/// A single content block in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

/// Result of a `tools/call`: one text block, optionally flagged as an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
    #[serde(
        rename = "isError",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Pretty-printed JSON payload.
    pub fn json(value: &Value) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::failure(&e),
        }
    }

    /// `Error: <message>` result for a failed operation.
    pub fn failure(err: &dyn fmt::Display) -> Self {
        Self::error(format!("Error: {}", err))
    }

    /// Concatenated text of all blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

// ── Argument decoding ───────────────────────────────────────────────

/// Decode tool arguments into a typed record.
///
/// Missing arguments (`null`) decode as an empty object. Unknown keys and
/// wrong types are rejected with an error result naming the tool.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolCallResult> {
    let args = match args {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(args)
        .map_err(|e| ToolCallResult::error(format!("Invalid arguments for {}: {}", tool, e)))
}

// ── Tests ───────────────────────────────────────────────────────────
