//! Persistence collaborator: the service storing a document's revisions.

use revgrid_protocol::{DocumentId, ForkRequest, HistoryPayload, NavigationTarget, RevisionId};
use serde_json::{Map, Value};

use crate::error::BackendError;

pub trait HistoryBackend {
    /// Base snapshot, revisions on top of it and the document name. With
    /// `force_from_snapshot` the service rebuilds the payload from its
    /// authoritative snapshot.
    fn fetch_history(
        &mut self,
        document: DocumentId,
        force_from_snapshot: bool,
    ) -> Result<HistoryPayload, BackendError>;

    fn rename_revision(
        &mut self,
        document: DocumentId,
        revision: RevisionId,
        name: &str,
    ) -> Result<(), BackendError>;

    /// Create a new document from `request`; answers where to go next.
    fn fork_history(
        &mut self,
        document: DocumentId,
        request: &ForkRequest,
    ) -> Result<NavigationTarget, BackendError>;

    /// Where the live (editable) document is.
    fn open_live_document(&mut self, document: DocumentId) -> Result<NavigationTarget, BackendError>;
}

impl<B: HistoryBackend + ?Sized> HistoryBackend for Box<B> {
    fn fetch_history(
        &mut self,
        document: DocumentId,
        force_from_snapshot: bool,
    ) -> Result<HistoryPayload, BackendError> {
        (**self).fetch_history(document, force_from_snapshot)
    }

    fn rename_revision(
        &mut self,
        document: DocumentId,
        revision: RevisionId,
        name: &str,
    ) -> Result<(), BackendError> {
        (**self).rename_revision(document, revision, name)
    }

    fn fork_history(
        &mut self,
        document: DocumentId,
        request: &ForkRequest,
    ) -> Result<NavigationTarget, BackendError> {
        (**self).fork_history(document, request)
    }

    fn open_live_document(&mut self, document: DocumentId) -> Result<NavigationTarget, BackendError> {
        (**self).open_live_document(document)
    }
}

/// Navigation target of the live editor of `document`.
pub fn live_document_target(document: DocumentId) -> NavigationTarget {
    let mut params = Map::new();
    params.insert("spreadsheet_id".into(), Value::from(document.0));
    NavigationTarget::client_action("action_open_spreadsheet", params)
}

/// In-memory service. Keeps every request it received.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    history: HistoryPayload,
    /// Served for forced reloads; `history` is served when absent
    snapshot_history: Option<HistoryPayload>,
    fetch_error: Option<BackendError>,
    next_document: u64,
    /// `force_from_snapshot` of every fetch
    pub fetches: Vec<bool>,
    pub renames: Vec<(RevisionId, String)>,
    pub forks: Vec<ForkRequest>,
}

impl MemoryBackend {
    pub fn new(history: HistoryPayload) -> Self {
        Self { history, next_document: 1000, ..Self::default() }
    }

    pub fn with_snapshot_history(mut self, history: HistoryPayload) -> Self {
        self.snapshot_history = Some(history);
        self
    }

    pub fn failing(error: BackendError) -> Self {
        Self { fetch_error: Some(error), ..Self::default() }
    }

    pub fn history(&self) -> &HistoryPayload {
        &self.history
    }
}

impl HistoryBackend for MemoryBackend {
    fn fetch_history(
        &mut self,
        _document: DocumentId,
        force_from_snapshot: bool,
    ) -> Result<HistoryPayload, BackendError> {
        self.fetches.push(force_from_snapshot);
        if let Some(error) = &self.fetch_error {
            return Err(error.clone());
        }
        match (&self.snapshot_history, force_from_snapshot) {
            (Some(history), true) => Ok(history.clone()),
            _ => Ok(self.history.clone()),
        }
    }

    fn rename_revision(
        &mut self,
        _document: DocumentId,
        revision: RevisionId,
        name: &str,
    ) -> Result<(), BackendError> {
        let record = self
            .history
            .revisions
            .iter_mut()
            .find(|r| r.id == revision)
            .ok_or_else(|| BackendError::Rejected(format!("no revision {}", revision)))?;
        record.name = Some(name.to_string());
        self.renames.push((revision, name.to_string()));
        Ok(())
    }

    fn fork_history(
        &mut self,
        _document: DocumentId,
        request: &ForkRequest,
    ) -> Result<NavigationTarget, BackendError> {
        self.forks.push(request.clone());
        let forked = DocumentId(self.next_document);
        self.next_document += 1;
        Ok(live_document_target(forked))
    }

    fn open_live_document(&mut self, document: DocumentId) -> Result<NavigationTarget, BackendError> {
        Ok(live_document_target(document))
    }
}
