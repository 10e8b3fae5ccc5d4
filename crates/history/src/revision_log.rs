//! Revision log store.
//!
//! Revisions are kept in log order in an arena; `RevisionIndex(i)` is the
//! i-th revision. Undo/redo entries point at their target through its index,
//! resolved once at load time from the target's `nextRevisionId`. A log is
//! immutable once loaded: renaming produces a new log.

use revgrid_engine::RevisionIndex;
use revgrid_protocol::{RevisionId, RevisionRecord, RevisionType};
use rustc_hash::FxHashMap;

use crate::error::LogError;
use crate::revision::{parse_timestamp, Revision, RevisionKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionLog {
    revisions: Vec<Revision>,
    /// First revision producing each revision id
    by_next: FxHashMap<String, RevisionIndex>,
}

impl RevisionLog {
    pub fn load(records: Vec<RevisionRecord>) -> Result<Self, LogError> {
        let mut log = RevisionLog::default();
        for record in records {
            let index = RevisionIndex(log.revisions.len());
            let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LogError::BadTimestamp {
                revision: record.id,
                value: record.timestamp.clone(),
            })?;
            let kind = match record.kind {
                RevisionType::RemoteRevision => RevisionKind::Edit {
                    commands: record.commands.unwrap_or_default(),
                },
                RevisionType::RevisionUndone => {
                    let reference = record.undone_revision_id.unwrap_or_default();
                    RevisionKind::Undone { target: log.index_of_next(&reference), reference }
                }
                RevisionType::RevisionRedone => {
                    let reference = record.redone_revision_id.unwrap_or_default();
                    RevisionKind::Redone { target: log.index_of_next(&reference), reference }
                }
                RevisionType::SnapshotCreated => RevisionKind::SnapshotCreated,
            };
            log.by_next.entry(record.next_revision_id.clone()).or_insert(index);
            log.revisions.push(Revision {
                id: record.id,
                name: record.name,
                server_revision_id: record.server_revision_id,
                next_revision_id: record.next_revision_id,
                timestamp,
                user: record.user,
                kind,
            });
        }
        Ok(log)
    }

    /// Every revision, in log order.
    pub fn all(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn get(&self, index: RevisionIndex) -> Option<&Revision> {
        self.revisions.get(index.0)
    }

    /// Restorable revisions (snapshot markers excluded), newest first.
    pub fn restorable(&self) -> Vec<RevisionIndex> {
        self.revisions
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, r)| r.is_restorable())
            .map(|(i, _)| RevisionIndex(i))
            .collect()
    }

    pub fn index_of_next(&self, next_revision_id: &str) -> Option<RevisionIndex> {
        self.by_next.get(next_revision_id).copied()
    }

    pub fn find(&self, id: RevisionId) -> Option<(RevisionIndex, &Revision)> {
        self.revisions
            .iter()
            .enumerate()
            .find(|(_, r)| r.id == id)
            .map(|(i, r)| (RevisionIndex(i), r))
    }

    /// Revisions up to and including `last`.
    pub fn prefix(&self, last: RevisionIndex) -> &[Revision] {
        let end = (last.0 + 1).min(self.revisions.len());
        &self.revisions[..end]
    }

    /// Copy of this log with one revision renamed.
    pub fn with_renamed(&self, id: RevisionId, name: Option<String>) -> Option<Self> {
        let (index, _) = self.find(id)?;
        let mut renamed = self.clone();
        renamed.revisions[index.0].name = name;
        Some(renamed)
    }
}
