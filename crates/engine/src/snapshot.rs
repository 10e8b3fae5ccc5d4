//! Serialized document payload.
//!
//! A snapshot is the full state of a workbook at a checkpoint, independent of
//! the revision log. It is what the server stores, what replay starts from and
//! what a fork exports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::CommandError;
use crate::data_source::{ListDefinition, ListId};
use crate::sheet::SheetId;

/// Head of a document whose payload carries no revision id.
pub const START_REVISION: &str = "START_REVISION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Revision this payload was taken at (the chain head).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    pub sheets: Vec<SheetData>,
    pub lists: BTreeMap<ListId, ListDefinition>,
    /// Payload sections the workbook does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub id: SheetId,
    pub name: String,
    /// Keyed by A1 reference.
    #[serde(default)]
    pub cells: BTreeMap<String, CellData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub content: String,
}

impl Snapshot {
    pub fn from_value(value: &Value) -> Result<Self, CommandError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CommandError::InvalidSnapshot(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The chain head this payload starts at.
    pub fn head(&self) -> &str {
        self.revision_id.as_deref().unwrap_or(START_REVISION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_payload() {
        let snapshot = Snapshot::from_value(&json!({})).unwrap();
        assert!(snapshot.sheets.is_empty());
        assert_eq!(snapshot.head(), START_REVISION);
    }

    #[test]
    fn test_full_payload() {
        let snapshot = Snapshot::from_value(&json!({
            "version": 14,
            "revisionId": "rev-9",
            "sheets": [{
                "id": "sh1",
                "name": "Sheet 1",
                "cells": { "A1": { "content": "=LIST(1,1,\"name\")" } }
            }],
            "lists": { "1": { "id": "1", "model": "partner", "domain": [] } },
            "settings": { "locale": "en_US" }
        }))
        .unwrap();

        assert_eq!(snapshot.version, Some(14));
        assert_eq!(snapshot.head(), "rev-9");
        assert_eq!(snapshot.sheets[0].cells["A1"].content, "=LIST(1,1,\"name\")");
        assert!(snapshot.lists.contains_key(&ListId::new("1")));
        assert_eq!(snapshot.to_value()["settings"], json!({ "locale": "en_US" }));
    }

    #[test]
    fn test_malformed_payload() {
        let err = Snapshot::from_value(&json!({ "sheets": "nope" })).unwrap_err();
        assert!(matches!(err, CommandError::InvalidSnapshot(_)));
    }
}
