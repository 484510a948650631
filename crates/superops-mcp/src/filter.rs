//! Helpers that turn tool parameters into GraphQL variables.
//!
//! Optional keys appear only when set, empty filters are dropped, and result
//! counts are clamped to each tool's cap.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// `min(requested.unwrap_or(default), cap)`.
pub fn clamp_max(requested: Option<u32>, default: u32, cap: u32) -> u32 {
    requested.unwrap_or(default).min(cap)
}

/// Accumulates keys into a JSON object, skipping absent values.
#[derive(Debug, Default, Clone)]
pub struct FieldSet {
    fields: Map<String, Value>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn optional<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn set_if(self, condition: bool, key: &str, value: impl Into<Value>) -> Self {
        if condition {
            self.set(key, value)
        } else {
            self
        }
    }

    /// Explicit `null`, meaning "field is unset" to the backend.
    pub fn null_if(self, condition: bool, key: &str) -> Self {
        self.set_if(condition, key, Value::Null)
    }

    /// The object, or `None` when no key was set.
    pub fn build(self) -> Option<Value> {
        if self.fields.is_empty() {
            None
        } else {
            Some(Value::Object(self.fields))
        }
    }

    /// The object, even when empty.
    pub fn into_object(self) -> Value {
        Value::Object(self.fields)
    }
}

/// `{or: [{f1: {contains: q}}, {f2: {contains: q}}, ...]}`.
pub fn contains_any(fields: &[&str], query: &str) -> Value {
    let clauses: Vec<Value> = fields
        .iter()
        .map(|field| {
            let mut clause = Map::new();
            clause.insert(field.to_string(), json!({ "contains": query }));
            Value::Object(clause)
        })
        .collect();
    json!({ "or": clauses })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: SortDirection,
}

/// Paging, ordering and filtering input shared by list operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    pub first: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl ListInput {
    pub fn new(first: u32) -> Self {
        Self {
            first,
            after: None,
            order_by: None,
            filter: None,
        }
    }

    /// Opaque pagination cursor, passed through verbatim.
    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.after = cursor;
        self
    }

    pub fn order_by(mut self, field: &'static str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy { field, direction });
        self
    }

    pub fn filter(mut self, filter: Option<Value>) -> Self {
        self.filter = filter;
        self
    }

    /// `{input: {...}}`.
    pub fn into_variables(self) -> Value {
        json!({ "input": self })
    }
}
