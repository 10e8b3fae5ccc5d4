//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes of `revgrid`. Scripts rely on
//! them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | Universal        | File and settings errors                 |
//! | 20-29   | history          | Revision chain and service codes         |

use revgrid_history::{BackendError, ChainStatus, HistoryError};

// =============================================================================
// Universal (0-9)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown revision id.
pub const EXIT_USAGE: u8 = 2;

/// History or settings file could not be read or written.
pub const EXIT_IO: u8 = 3;

/// History or settings file is not valid JSON/TOML or has the wrong shape.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// History (20-29)
// =============================================================================

/// Revisions are missing between the snapshot and the requested revision.
/// `check` only: a reload from the snapshot may fix it.
pub const EXIT_HISTORY_RECOVERABLE: u8 = 20;

/// The history cannot be replayed, even from the snapshot.
pub const EXIT_HISTORY_CORRUPTED: u8 = 21;

/// No revision with that id or `nextRevisionId`.
pub const EXIT_HISTORY_UNKNOWN_REVISION: u8 = 22;

/// The history store rejected a rename or fork.
pub const EXIT_HISTORY_BACKEND: u8 = 23;

/// Map a chain status to the exit code of `check`.
pub fn status_exit_code(status: ChainStatus) -> u8 {
    match status {
        ChainStatus::Complete => EXIT_SUCCESS,
        ChainStatus::Recoverable => EXIT_HISTORY_RECOVERABLE,
        ChainStatus::Corrupted => EXIT_HISTORY_CORRUPTED,
    }
}

/// Map a history error to its exit code.
pub fn history_exit_code(err: &HistoryError) -> u8 {
    match err {
        HistoryError::Fetch(BackendError::Malformed(_)) => EXIT_PARSE,
        HistoryError::Fetch(_) => EXIT_IO,
        HistoryError::InvalidPayload(_) => EXIT_PARSE,
        HistoryError::Backend(_) => EXIT_HISTORY_BACKEND,
        HistoryError::Corrupted => EXIT_HISTORY_CORRUPTED,
        HistoryError::UnknownRevision(_) | HistoryError::UnknownRevisionId(_) => {
            EXIT_HISTORY_UNKNOWN_REVISION
        }
    }
}
