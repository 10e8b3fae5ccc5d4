//! Document mutation commands.
//!
//! Revisions carry commands as opaque JSON objects tagged by `type`. They are
//! parsed here, at the point of application, so a log containing an operation
//! this model does not know still loads and only fails when replayed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data_source::{ListDefinition, ListId};
use crate::journal::RevisionIndex;
use crate::sheet::SheetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    CreateSheet {
        sheet_id: SheetId,
        name: String,
        #[serde(default)]
        position: usize,
    },
    #[serde(rename_all = "camelCase")]
    DeleteSheet { sheet_id: SheetId },
    #[serde(rename_all = "camelCase")]
    RenameSheet { sheet_id: SheetId, name: String },
    #[serde(rename_all = "camelCase")]
    UpdateCell {
        sheet_id: SheetId,
        col: u32,
        row: u32,
        #[serde(default)]
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    ClearCell { sheet_id: SheetId, col: u32, row: u32 },
    #[serde(rename_all = "camelCase")]
    InsertList { list_id: ListId, definition: ListDefinition },
    #[serde(rename_all = "camelCase")]
    UpdateListDomain { list_id: ListId, domain: Value },
}

impl Command {
    pub const TYPES: &'static [&'static str] = &[
        "CREATE_SHEET",
        "DELETE_SHEET",
        "RENAME_SHEET",
        "UPDATE_CELL",
        "CLEAR_CELL",
        "INSERT_LIST",
        "UPDATE_LIST_DOMAIN",
    ];

    /// Parse an opaque command object.
    pub fn from_value(value: &Value) -> Result<Self, CommandError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::Malformed("command has no \"type\"".to_string()))?;
        if !Self::TYPES.contains(&kind) {
            return Err(CommandError::UnknownCommand(kind.to_string()));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CommandError::Malformed(format!("{}: {}", kind, e)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Command::CreateSheet { .. } => "CREATE_SHEET",
            Command::DeleteSheet { .. } => "DELETE_SHEET",
            Command::RenameSheet { .. } => "RENAME_SHEET",
            Command::UpdateCell { .. } => "UPDATE_CELL",
            Command::ClearCell { .. } => "CLEAR_CELL",
            Command::InsertList { .. } => "INSERT_LIST",
            Command::UpdateListDomain { .. } => "UPDATE_LIST_DOMAIN",
        }
    }
}

/// Error type for document operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Mutation attempted on a read-only document
    ReadOnly,
    /// Command type this model does not implement
    UnknownCommand(String),
    /// Command object could not be parsed
    Malformed(String),
    UnknownSheet(SheetId),
    DuplicateSheet(SheetId),
    DuplicateSheetName(String),
    InvalidSheetName(String),
    /// The last sheet of a workbook cannot be deleted
    LastSheet,
    UnknownList(ListId),
    DuplicateList(ListId),
    /// Undo/redo of a revision the document never applied
    UnknownRevision(RevisionIndex),
    InvalidSnapshot(String),
    /// Cell coordinate beyond the grid limits
    OutOfGrid { col: u32, row: u32 },
}

impl CommandError {
    /// The command names a sheet or list that another revision removed,
    /// created or renamed first. Such commands are dropped when the journal
    /// is rebuilt after an undo or redo.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CommandError::UnknownSheet(_)
                | CommandError::DuplicateSheet(_)
                | CommandError::DuplicateSheetName(_)
                | CommandError::LastSheet
                | CommandError::UnknownList(_)
                | CommandError::DuplicateList(_)
        )
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::ReadOnly => write!(f, "document is read-only"),
            CommandError::UnknownCommand(kind) => write!(f, "unknown command type {}", kind),
            CommandError::Malformed(msg) => write!(f, "malformed command: {}", msg),
            CommandError::UnknownSheet(id) => write!(f, "no sheet with id {}", id),
            CommandError::DuplicateSheet(id) => write!(f, "sheet id {} already exists", id),
            CommandError::DuplicateSheetName(name) => write!(f, "sheet name {:?} already exists", name),
            CommandError::InvalidSheetName(name) => write!(f, "invalid sheet name {:?}", name),
            CommandError::LastSheet => write!(f, "cannot delete the last sheet"),
            CommandError::UnknownList(id) => write!(f, "no list with id {}", id),
            CommandError::DuplicateList(id) => write!(f, "list id {} already exists", id),
            CommandError::UnknownRevision(index) => {
                write!(f, "revision #{} was never applied to this document", index.0)
            }
            CommandError::InvalidSnapshot(msg) => write!(f, "invalid snapshot: {}", msg),
            CommandError::OutOfGrid { col, row } => {
                write!(f, "cell (col {}, row {}) is outside the grid", col, row)
            }
        }
    }
}

impl std::error::Error for CommandError {}
