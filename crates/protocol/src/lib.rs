//! revgrid History Protocol
//!
//! Canonical wire types exchanged with the service that stores a document's
//! revisions: the history payload (base snapshot + revision log), revision
//! records, fork requests and the navigation targets the service answers
//! with. The document payload itself stays opaque here (`serde_json::Value`);
//! the engine crate gives it meaning.
//!
//! # Usage
//!
//! ```ignore
//! use revgrid_protocol::HistoryPayload;
//!
//! let payload: HistoryPayload = serde_json::from_str(&body)?;
//! for revision in &payload.revisions {
//!     println!("{} -> {}", revision.server_revision_id, revision.next_revision_id);
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-side record id of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

/// Server-side record id of a revision. Unique per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// History payload
// =============================================================================

/// Response to a history fetch: base snapshot, revisions on top of it, and
/// the document's display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    /// Base snapshot (document payload).
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default)]
    pub revisions: Vec<RevisionRecord>,
    #[serde(default)]
    pub name: String,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Revision kinds as stored by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    /// An edit. Every stored edit is "remote" from the point of view of a
    /// client reading the log.
    RemoteRevision,
    /// Cancels the revision referenced by `undoneRevisionId`
    RevisionUndone,
    /// Re-applies the revision referenced by `redoneRevisionId`
    RevisionRedone,
    /// Checkpoint marker written when a snapshot was taken
    SnapshotCreated,
}

/// `[id, "display name"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef(pub u64, pub String);

impl UserRef {
    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }
}

/// One entry of a document's revision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    pub id: RevisionId,
    /// User-assigned label. Missing, `null`, `false` and `""` all mean unnamed.
    #[serde(default, deserialize_with = "optional_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Revision this entry was built upon.
    pub server_revision_id: String,
    /// Revision id this entry produces.
    pub next_revision_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub timestamp: String,
    pub user: UserRef,
    #[serde(rename = "type")]
    pub kind: RevisionType,
    /// Absent for undo/redo and snapshot markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<Value>>,
    /// `nextRevisionId` of the revision an undo cancels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undone_revision_id: Option<String>,
    /// `nextRevisionId` of the revision a redo re-applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redone_revision_id: Option<String>,
}

fn optional_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

// =============================================================================
// Mutations
// =============================================================================

/// Values the new document of a fork is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkDefaults {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_thumbnail: Option<String>,
}

/// Request to create a new document from a point of another one's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkRequest {
    pub revision_id: RevisionId,
    /// Exported payload, its `revisionId` set to the forked revision's
    /// `nextRevisionId`.
    pub spreadsheet_snapshot: Value,
    pub default: ForkDefaults,
}

/// Where the client should go next (the forked document, the live editor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationTarget {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl NavigationTarget {
    pub fn client_action(tag: &str, params: Map<String, Value>) -> Self {
        Self { kind: "client_action".to_string(), tag: Some(tag.to_string()), params }
    }
}
