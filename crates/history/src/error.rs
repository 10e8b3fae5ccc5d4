//! Error types for history loading, replay and the persistence collaborator.

use revgrid_engine::CommandError;
use revgrid_protocol::RevisionId;

/// Failure reported by a [`HistoryBackend`](crate::HistoryBackend).
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Service could not be reached
    Unreachable(String),
    /// Service answered with something that is not a valid payload
    Malformed(String),
    /// Service refused the request (unknown document, access rights...)
    Rejected(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unreachable(msg) => write!(f, "history service unreachable: {}", msg),
            BackendError::Malformed(msg) => write!(f, "malformed history payload: {}", msg),
            BackendError::Rejected(msg) => write!(f, "request rejected: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A revision log that cannot be loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum LogError {
    BadTimestamp { revision: RevisionId, value: String },
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::BadTimestamp { revision, value } => {
                write!(f, "revision {} has an unreadable timestamp {:?}", revision, value)
            }
        }
    }
}

impl std::error::Error for LogError {}

/// Why a revision could not be replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayCause {
    /// The document model refused the revision
    Command(CommandError),
    /// Undo/redo referencing a revision id absent from the log before it
    UnresolvedTarget(String),
}

impl std::fmt::Display for ReplayCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayCause::Command(e) => write!(f, "{}", e),
            ReplayCause::UnresolvedTarget(id) => {
                write!(f, "references revision {} which is not in the log", id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayError {
    /// `None` when the base snapshot itself could not be loaded
    pub revision: Option<RevisionId>,
    pub cause: ReplayCause,
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.revision {
            Some(id) => write!(f, "replay failed at revision {}: {}", id, self.cause),
            None => write!(f, "base snapshot cannot be loaded: {}", self.cause),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            ReplayCause::Command(e) => Some(e),
            ReplayCause::UnresolvedTarget(_) => None,
        }
    }
}

/// Error type for history session operations.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// History could not be fetched. Terminal for the session.
    Fetch(BackendError),
    /// History fetched but unusable (bad log, bad snapshot). Terminal too.
    InvalidPayload(String),
    /// Rename, fork or live-document request failed
    Backend(BackendError),
    /// History is corrupted; only returning to the live document is possible
    Corrupted,
    /// No revision produces this revision id
    UnknownRevision(String),
    UnknownRevisionId(RevisionId),
}

impl HistoryError {
    /// Whether the session cannot continue after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HistoryError::Fetch(_) | HistoryError::InvalidPayload(_) | HistoryError::Corrupted)
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Fetch(e) => write!(f, "cannot load history: {}", e),
            HistoryError::InvalidPayload(msg) => write!(f, "cannot load history: {}", msg),
            HistoryError::Backend(e) => write!(f, "{}", e),
            HistoryError::Corrupted => write!(
                f,
                "the history of this document is corrupted and recent revisions are likely missing"
            ),
            HistoryError::UnknownRevision(id) => write!(f, "no revision produces {}", id),
            HistoryError::UnknownRevisionId(id) => write!(f, "no revision with id {}", id),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<LogError> for HistoryError {
    fn from(err: LogError) -> Self {
        HistoryError::InvalidPayload(err.to_string())
    }
}
