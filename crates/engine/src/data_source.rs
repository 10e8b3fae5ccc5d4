//! External list data sources.
//!
//! A list is a query against an external record store (model + domain).
//! The workbook only stores the definition and whatever rows the host has
//! loaded for it; fetching is someone else's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row returned by a list query: field name -> value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Definition of a list data source as stored in the document payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDefinition {
    pub id: ListId,
    #[serde(default)]
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Filter criteria, e.g. `[["name", "=", "test"]]`.
    #[serde(default = "empty_domain")]
    pub domain: Value,
    #[serde(default = "empty_context")]
    pub context: Value,
    #[serde(default)]
    pub order_by: Vec<Value>,
    /// Anything else the payload carries (field matching, ...). Kept so an
    /// export reproduces the original definition.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_domain() -> Value {
    Value::Array(Vec::new())
}

fn empty_context() -> Value {
    Value::Object(Map::new())
}

impl ListDefinition {
    pub fn new(id: ListId, model: impl Into<String>, columns: Vec<String>, domain: Value) -> Self {
        Self {
            id,
            name: String::new(),
            model: model.into(),
            columns,
            domain,
            context: empty_context(),
            order_by: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The parameters that determine what a fetch returns.
    pub fn query(&self) -> ListQuery {
        ListQuery {
            model: self.model.clone(),
            domain: self.domain.clone(),
            context: self.context.clone(),
            order_by: self.order_by.clone(),
            columns: self.columns.clone(),
        }
    }
}

/// Query parameters of a list. Two equal queries return the same rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListQuery {
    pub model: String,
    pub domain: Value,
    pub context: Value,
    pub order_by: Vec<Value>,
    pub columns: Vec<String>,
}

/// Load state of a list's rows inside one workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready(Vec<Row>),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_from_payload() {
        let def: ListDefinition = serde_json::from_value(json!({
            "columns": ["name"],
            "domain": [["name", "=", "tabouret"]],
            "model": "partner",
            "context": {},
            "orderBy": [],
            "id": "1",
            "name": "Pipeline",
            "fieldMatching": {}
        }))
        .unwrap();

        assert_eq!(def.id, ListId::new("1"));
        assert_eq!(def.model, "partner");
        assert_eq!(def.domain, json!([["name", "=", "tabouret"]]));
        assert!(def.extra.contains_key("fieldMatching"));

        let back = serde_json::to_value(&def).unwrap();
        assert_eq!(back["fieldMatching"], json!({}));
        assert_eq!(back["orderBy"], json!([]));
    }

    #[test]
    fn test_query_ignores_display_name() {
        let mut a = ListDefinition::new(ListId::new("1"), "partner", vec!["name".into()], json!([]));
        let mut b = a.clone();
        a.name = "Pipeline".into();
        b.name = "Renamed".into();
        assert_eq!(a.query(), b.query());

        b.domain = json!([["name", "=", "x"]]);
        assert_ne!(a.query(), b.query());
    }

    #[test]
    fn test_missing_domain_defaults_to_empty() {
        let def: ListDefinition =
            serde_json::from_value(json!({ "id": "7", "model": "partner" })).unwrap();
        assert_eq!(def.domain, json!([]));
        assert_eq!(def.context, json!({}));
    }
}
