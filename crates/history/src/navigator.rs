//! History navigator: current position within the restorable revisions,
//! displayed entries, pagination and rename bookkeeping.

use revgrid_engine::RevisionIndex;
use revgrid_protocol::RevisionId;
use serde::Serialize;

use crate::error::HistoryError;
use crate::revision::{Revision, TimestampFormatter};
use crate::revision_log::RevisionLog;

/// Info line of the newest entry.
pub const CURRENT_VERSION: &str = "Current Version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Older,
    Newer,
}

impl Direction {
    /// `ArrowDown` goes back in time, `ArrowUp` forward.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowDown" => Some(Direction::Older),
            "ArrowUp" => Some(Direction::Newer),
            _ => None,
        }
    }
}

/// One line of the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionEntry {
    pub id: RevisionId,
    /// `nextRevisionId`: what navigating to this entry targets
    pub revision_id: String,
    pub label: String,
    pub info: String,
    pub author: String,
    pub is_named: bool,
    pub is_current: bool,
    pub is_latest: bool,
}

#[derive(Debug, Clone)]
pub struct HistoryNavigator {
    log: RevisionLog,
    /// Newest first
    restorable: Vec<RevisionIndex>,
    current: String,
    visible: usize,
    page_size: usize,
}

impl HistoryNavigator {
    pub fn new(log: RevisionLog, base_head: &str, page_size: usize) -> Self {
        let restorable = log.restorable();
        let current = Self::initial_position(&log, &restorable, base_head);
        let page_size = page_size.max(1);
        Self {
            visible: page_size.min(restorable.len()),
            log,
            restorable,
            current,
            page_size,
        }
    }

    /// Newest restorable revision, else the snapshot's own revision.
    fn initial_position(log: &RevisionLog, restorable: &[RevisionIndex], base_head: &str) -> String {
        restorable
            .first()
            .and_then(|&i| log.get(i))
            .map(|r| r.next_revision_id.clone())
            .unwrap_or_else(|| base_head.to_string())
    }

    pub fn log(&self) -> &RevisionLog {
        &self.log
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub(crate) fn set_current(&mut self, revision_id: &str) {
        self.current = revision_id.to_string();
        self.reveal(revision_id);
    }

    /// Restorable revisions, newest first.
    pub fn restorable(&self) -> impl Iterator<Item = &Revision> {
        self.restorable.iter().filter_map(|&i| self.log.get(i))
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.restorable.first().and_then(|&i| self.log.get(i))
    }

    pub fn is_latest(&self, revision_id: &str) -> bool {
        self.latest().is_some_and(|r| r.next_revision_id == revision_id)
    }

    // ------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn visible_len(&self) -> usize {
        self.visible
    }

    pub fn has_more(&self) -> bool {
        self.visible < self.restorable.len()
    }

    /// Expose one more page. Returns how many entries were added.
    pub fn load_more(&mut self) -> usize {
        let before = self.visible;
        self.visible = (self.visible + self.page_size).min(self.restorable.len());
        self.visible - before
    }

    /// Grow the visible pages until `revision_id` is part of them.
    fn reveal(&mut self, revision_id: &str) {
        if let Some(position) = self.position_of(revision_id) {
            while self.visible <= position && self.load_more() > 0 {}
        }
    }

    pub fn entries(&self, formatter: &TimestampFormatter) -> Vec<RevisionEntry> {
        self.restorable
            .iter()
            .take(self.visible)
            .filter_map(|&i| self.log.get(i))
            .enumerate()
            .map(|(position, revision)| {
                let is_latest = position == 0;
                RevisionEntry {
                    id: revision.id,
                    revision_id: revision.next_revision_id.clone(),
                    label: revision.label(formatter),
                    info: if is_latest {
                        CURRENT_VERSION.to_string()
                    } else {
                        formatter.format(&revision.timestamp)
                    },
                    author: revision.user.name().to_string(),
                    is_named: revision.name.as_deref().is_some_and(|n| !n.is_empty()),
                    is_current: revision.next_revision_id == self.current,
                    is_latest,
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Navigation targets
    // ------------------------------------------------------------------

    fn position_of(&self, revision_id: &str) -> Option<usize> {
        self.restorable
            .iter()
            .position(|&i| self.log.get(i).is_some_and(|r| r.next_revision_id == revision_id))
    }

    /// Revision id adjacent to the current one, if any.
    pub fn neighbor(&self, direction: Direction) -> Option<String> {
        let position = self.position_of(&self.current)?;
        let target = match direction {
            Direction::Older => position.checked_add(1)?,
            Direction::Newer => position.checked_sub(1)?,
        };
        let index = *self.restorable.get(target)?;
        self.log.get(index).map(|r| r.next_revision_id.clone())
    }

    /// Log prefix materializing `revision_id`. The base snapshot's own
    /// revision yields an empty prefix.
    pub fn prefix_for(&self, revision_id: &str, base_head: &str) -> Result<&[Revision], HistoryError> {
        match self.log.index_of_next(revision_id) {
            Some(last) => Ok(self.log.prefix(last)),
            None if revision_id == base_head => Ok(&self.log.all()[..0]),
            None => Err(HistoryError::UnknownRevision(revision_id.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Rename
    // ------------------------------------------------------------------

    /// Name to persist for a rename, or `None` when the label would not
    /// change. An empty name falls back to the current label.
    pub fn rename_plan(
        &self,
        id: RevisionId,
        name: &str,
        formatter: &TimestampFormatter,
    ) -> Result<Option<String>, HistoryError> {
        let (_, revision) = self.log.find(id).ok_or(HistoryError::UnknownRevisionId(id))?;
        let label = revision.label(formatter);
        let name = name.trim();
        if name.is_empty() || name == label {
            return Ok(None);
        }
        Ok(Some(name.to_string()))
    }

    pub(crate) fn apply_rename(&mut self, id: RevisionId, name: &str) -> Result<(), HistoryError> {
        let log = self
            .log
            .with_renamed(id, Some(name.to_string()))
            .ok_or(HistoryError::UnknownRevisionId(id))?;
        self.log = log;
        Ok(())
    }
}
