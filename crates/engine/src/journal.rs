//! Journal of applied revisions, for selective undo/redo.
//!
//! Undoing a revision does not invert its commands: the revision is flagged
//! and the workbook content is rebuilt from its base snapshot by replaying the
//! commands of every entry still active. Redo clears the flag and rebuilds
//! again. Whatever the position of the undone revision, the result is the same
//! as if it had never been applied.

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandError};

/// Position of a revision in the history arena. Undo/redo refer to their
/// target through this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionIndex(pub usize);

#[derive(Debug, Clone, PartialEq)]
struct JournalEntry {
    /// `None` for local edits made outside of a revision
    revision: Option<RevisionIndex>,
    commands: Vec<Command>,
    undone: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, revision: Option<RevisionIndex>, commands: Vec<Command>) {
        self.entries.push(JournalEntry { revision, commands, undone: false });
    }

    /// Flag a revision as undone (`true`) or redone (`false`).
    /// Returns whether the flag actually changed.
    pub fn set_undone(&mut self, revision: RevisionIndex, undone: bool) -> Result<bool, CommandError> {
        let entry = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.revision == Some(revision))
            .ok_or(CommandError::UnknownRevision(revision))?;
        let changed = entry.undone != undone;
        entry.undone = undone;
        Ok(changed)
    }

    pub fn is_undone(&self, revision: RevisionIndex) -> Option<bool> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.revision == Some(revision))
            .map(|e| e.undone)
    }

    /// Commands of every active entry, in application order.
    pub fn active_commands(&self) -> impl Iterator<Item = &Command> {
        self.entries
            .iter()
            .filter(|e| !e.undone)
            .flat_map(|e| e.commands.iter())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
