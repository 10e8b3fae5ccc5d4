//! Spreadsheet version history.
//!
//! Rebuilds a document at any point of its edit history by replaying the
//! revision log against a base snapshot, detects gaps in the log, keeps data
//! sources in sync with the replayed document and preserves the user's
//! viewport across time travel.
//!
//! [`HistorySession`] ties the pieces together; each piece is usable alone:
//! [`RevisionLog`], [`replay::materialize`], [`consistency::check`],
//! [`HistoryNavigator`], [`ViewportSnapshot`] and [`DataSourceSynchronizer`].

pub mod backend;
pub mod consistency;
pub mod data_sources;
pub mod error;
pub mod hooks;
pub mod navigator;
pub mod replay;
pub mod revision;
pub mod revision_log;
pub mod session;
pub mod viewport;

pub use backend::{live_document_target, HistoryBackend, MemoryBackend};
pub use consistency::ChainStatus;
pub use data_sources::{DataSourceFetcher, DataSourceSynchronizer, FetchOutcome, FetchRequest, FetchTicket};
pub use error::{BackendError, HistoryError, LogError, ReplayCause, ReplayError};
pub use hooks::{HistoryEvent, HookHandle, HookPoint, HookRegistry};
pub use navigator::{Direction, HistoryNavigator, RevisionEntry, CURRENT_VERSION};
pub use revision::{Revision, RevisionKind, TimestampFormatter};
pub use revision_log::RevisionLog;
pub use session::{DiagnosticSink, HistorySession, Intent, NavigationOutcome, UNTITLED_NAME};
pub use viewport::{FrameScheduler, ViewportSnapshot};
