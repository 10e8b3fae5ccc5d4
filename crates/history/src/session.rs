//! History session: one document's history opened for time travel.
//!
//! Navigation runs replay -> consistency check -> data source
//! reconciliation -> viewport restore scheduled for the next frame ->
//! navigator position update. Intents are queued and handled strictly in
//! submission order; the current document is replaced wholesale, never
//! patched in place.

use std::collections::VecDeque;

use revgrid_config::HistorySettings;
use revgrid_core::ViewportSize;
use revgrid_engine::{Mode, Row, Snapshot, Workbook};
use revgrid_protocol::{DocumentId, ForkDefaults, ForkRequest, HistoryPayload, NavigationTarget, RevisionId};

use crate::backend::HistoryBackend;
use crate::consistency::{self, ChainStatus};
use crate::data_sources::{DataSourceFetcher, DataSourceSynchronizer, FetchOutcome, FetchRequest, FetchTicket};
use crate::error::{HistoryError, ReplayError};
use crate::hooks::{HistoryEvent, HookRegistry};
use crate::navigator::{Direction, HistoryNavigator, RevisionEntry};
use crate::replay;
use crate::revision::TimestampFormatter;
use crate::revision_log::RevisionLog;
use crate::viewport::{FrameScheduler, ViewportSnapshot};

/// Name used when the service sends a document without one.
pub const UNTITLED_NAME: &str = "Untitled spreadsheet";

/// Receives every document the session materializes.
pub trait DiagnosticSink {
    fn document_materialized(&mut self, revision: &str, document: &Workbook);
}

impl<F> DiagnosticSink for F
where
    F: FnMut(&str, &Workbook),
{
    fn document_materialized(&mut self, revision: &str, document: &Workbook) {
        self(revision, document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Navigate(String),
    Advance(Direction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Already there, or at a boundary: nothing was replayed
    Unchanged,
    Navigated { revision: String, status: ChainStatus },
}

/// Fetched history, validated and indexed.
struct Loaded {
    name: String,
    base: Snapshot,
    navigator: HistoryNavigator,
    document: Workbook,
    /// Revision to materialize first
    latest: String,
}

impl Loaded {
    fn from_payload(payload: HistoryPayload, page_size: usize) -> Result<Self, HistoryError> {
        let base = Snapshot::from_value(&payload.data)
            .map_err(|e| HistoryError::InvalidPayload(e.to_string()))?;
        let document = Workbook::from_snapshot(base.clone(), Mode::ReadOnly)
            .map_err(|e| HistoryError::InvalidPayload(e.to_string()))?;
        let log = RevisionLog::load(payload.revisions)?;
        let mut navigator = HistoryNavigator::new(log, base.head(), page_size);
        // The base document is what is shown until a replay succeeds
        let latest = navigator.current().to_string();
        navigator.set_current(base.head());
        let name = if payload.name.trim().is_empty() {
            UNTITLED_NAME.to_string()
        } else {
            payload.name
        };
        Ok(Self { name, base, navigator, document, latest })
    }
}

pub struct HistorySession<B> {
    backend: B,
    document_id: DocumentId,
    settings: HistorySettings,
    formatter: TimestampFormatter,
    name: String,
    base: Snapshot,
    navigator: HistoryNavigator,
    /// History was loaded from the authoritative snapshot
    from_snapshot: bool,
    status: ChainStatus,
    replay_error: Option<ReplayError>,
    document: Workbook,
    data_sources: DataSourceSynchronizer,
    scheduler: FrameScheduler<Workbook>,
    /// Viewport waiting for the next frame
    pending_viewport: Option<ViewportSnapshot>,
    intents: VecDeque<Intent>,
    hooks: HookRegistry,
    diagnostics: Option<Box<dyn DiagnosticSink>>,
}

impl<B: HistoryBackend> HistorySession<B> {
    /// Fetch the history of `document_id` and materialize its newest
    /// revision. Missing revisions trigger one reload from the snapshot when
    /// `history.autoReloadFromSnapshot` is set.
    pub fn open(
        mut backend: B,
        document_id: DocumentId,
        settings: HistorySettings,
        from_snapshot: bool,
    ) -> Result<Self, HistoryError> {
        log::info!("opening history of document {} (from snapshot: {})", document_id, from_snapshot);
        let payload = backend
            .fetch_history(document_id, from_snapshot)
            .map_err(HistoryError::Fetch)?;
        let loaded = Loaded::from_payload(payload, settings.page_size)?;
        let latest = loaded.latest;

        let mut session = Self {
            backend,
            document_id,
            formatter: TimestampFormatter::from_settings(&settings),
            settings,
            name: loaded.name,
            base: loaded.base,
            navigator: loaded.navigator,
            from_snapshot,
            status: ChainStatus::Complete,
            replay_error: None,
            document: loaded.document,
            data_sources: DataSourceSynchronizer::new(),
            scheduler: FrameScheduler::new(),
            pending_viewport: None,
            intents: VecDeque::new(),
            hooks: HookRegistry::new(),
            diagnostics: None,
        };
        let status = session.materialize(&latest)?;
        session.settle(status)?;
        Ok(session)
    }

    fn install(&mut self, loaded: Loaded, from_snapshot: bool) {
        self.name = loaded.name;
        self.base = loaded.base;
        self.navigator = loaded.navigator;
        self.document = loaded.document;
        self.from_snapshot = from_snapshot;
        self.replay_error = None;
        self.data_sources = DataSourceSynchronizer::new();
        self.scheduler.cancel_pending();
        self.pending_viewport = None;
        self.intents.clear();
    }

    /// Replay the log up to `revision_id` and make the result current.
    /// A replay failure keeps the previous document and position and reports
    /// `Corrupted`.
    fn materialize(&mut self, revision_id: &str) -> Result<ChainStatus, HistoryError> {
        let replayed = {
            let prefix = self.navigator.prefix_for(revision_id, self.base.head())?;
            replay::materialize(&self.base, prefix)
        };
        let mut document = match replayed {
            Ok(document) => document,
            Err(e) => {
                log::error!("{}", e);
                self.replay_error = Some(e);
                return Ok(ChainStatus::Corrupted);
            }
        };

        let status = consistency::check(&document, revision_id, self.from_snapshot);
        let fetches = self.data_sources.reconcile(&mut document, revision_id);
        document.evaluate_cells();
        if self.settings.debug {
            log::debug!(
                "[{}] revision {} head {} sheets {} fetches {}",
                self.document_id,
                revision_id,
                document.head(),
                document.sheet_count(),
                fetches
            );
        }
        if let Some(sink) = self.diagnostics.as_mut() {
            sink.document_materialized(revision_id, &document);
        }

        let event = HistoryEvent::Materialized {
            revision: revision_id.to_string(),
            head: document.head().to_string(),
            sheets: document.sheet_count(),
        };
        self.document = document;
        self.replay_error = None;
        self.navigator.set_current(revision_id);
        self.hooks.emit(&event);
        Ok(status)
    }

    fn set_status(&mut self, status: ChainStatus) {
        if status != self.status {
            let event = HistoryEvent::StatusChanged { previous: self.status, status };
            self.status = status;
            self.hooks.emit(&event);
        }
    }

    fn settle(&mut self, status: ChainStatus) -> Result<ChainStatus, HistoryError> {
        self.set_status(status);
        match status {
            ChainStatus::Complete => {}
            ChainStatus::Recoverable => {
                log::warn!(
                    "document {} is missing revisions before {}",
                    self.document_id,
                    self.navigator.current()
                );
                if self.settings.auto_reload_from_snapshot {
                    return self.reload_from_snapshot();
                }
            }
            ChainStatus::Corrupted => {
                log::error!("history of document {} is corrupted", self.document_id);
            }
        }
        Ok(self.status)
    }

    /// Fetch the history again, rebuilt from the authoritative snapshot.
    /// A chain still broken after this is `Corrupted`.
    pub fn reload_from_snapshot(&mut self) -> Result<ChainStatus, HistoryError> {
        self.ensure_usable()?;
        log::info!("reloading history of document {} from snapshot", self.document_id);
        let payload = self
            .backend
            .fetch_history(self.document_id, true)
            .map_err(HistoryError::Fetch)?;
        let loaded = Loaded::from_payload(payload, self.settings.page_size)?;
        let latest = loaded.latest.clone();
        self.install(loaded, true);

        let status = self.materialize(&latest)?;
        self.settle(status)
    }

    fn ensure_usable(&self) -> Result<(), HistoryError> {
        if self.status == ChainStatus::Corrupted {
            return Err(HistoryError::Corrupted);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Queue a navigation intent. Nothing happens until [`pump`](Self::pump).
    pub fn submit(&mut self, intent: Intent) {
        self.intents.push_back(intent);
    }

    /// Handle queued intents in order. A terminal error drops the rest of
    /// the queue; other errors leave it for the next pump.
    pub fn pump(&mut self) -> Result<Vec<NavigationOutcome>, HistoryError> {
        let mut outcomes = Vec::new();
        while let Some(intent) = self.intents.pop_front() {
            match self.process(intent) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if e.is_terminal() {
                        self.intents.clear();
                    }
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    pub fn navigate(&mut self, revision_id: &str) -> Result<NavigationOutcome, HistoryError> {
        self.submit(Intent::Navigate(revision_id.to_string()));
        Ok(self.pump()?.pop().unwrap_or(NavigationOutcome::Unchanged))
    }

    pub fn advance(&mut self, direction: Direction) -> Result<NavigationOutcome, HistoryError> {
        self.submit(Intent::Advance(direction));
        Ok(self.pump()?.pop().unwrap_or(NavigationOutcome::Unchanged))
    }

    /// `ArrowDown`/`ArrowUp` move to the older/newer revision. Other keys
    /// are ignored.
    pub fn on_key(&mut self, key: &str) -> Result<NavigationOutcome, HistoryError> {
        match Direction::from_key(key) {
            Some(direction) => self.advance(direction),
            None => Ok(NavigationOutcome::Unchanged),
        }
    }

    fn process(&mut self, intent: Intent) -> Result<NavigationOutcome, HistoryError> {
        self.ensure_usable()?;
        let target = match intent {
            Intent::Navigate(target) => target,
            Intent::Advance(direction) => match self.navigator.neighbor(direction) {
                Some(target) => target,
                None => return Ok(NavigationOutcome::Unchanged),
            },
        };
        if target == self.navigator.current() {
            return Ok(NavigationOutcome::Unchanged);
        }
        // Unknown targets fail before anything changes
        self.navigator.prefix_for(&target, self.base.head())?;

        log::debug!("navigating {} -> {}", self.navigator.current(), target);
        self.hooks.emit(&HistoryEvent::BeforeNavigate {
            from: self.navigator.current().to_string(),
            to: target.clone(),
        });

        // A restore still waiting for its frame holds the user's real viewport
        let viewport = self
            .pending_viewport
            .take()
            .unwrap_or_else(|| ViewportSnapshot::capture(&self.document));
        let status = self.materialize(&target)?;

        if self.replay_error.is_none() {
            self.scheduler.cancel_pending();
            let restore = viewport.clone();
            self.scheduler.run_after_next_render(move |document: &mut Workbook| {
                restore.restore(document);
            });
            self.pending_viewport = Some(viewport);
        }

        let status = self.settle(status)?;
        Ok(NavigationOutcome::Navigated {
            revision: self.navigator.current().to_string(),
            status,
        })
    }

    /// The host completed a layout pass of the current document. Runs the
    /// deferred viewport restore. Returns the number of tasks run.
    pub fn frame_rendered(&mut self, size: ViewportSize) -> usize {
        self.document.set_viewport_size(size);
        let ran = self.scheduler.frame_rendered(&mut self.document);
        if let Some(viewport) = self.pending_viewport.take() {
            let applied = self.document.active_sheet_id() == &viewport.sheet_id;
            self.hooks.emit(&HistoryEvent::ViewportRestored {
                revision: self.navigator.current().to_string(),
                applied,
            });
        }
        ran
    }

    // ------------------------------------------------------------------
    // Rename / fork / exit
    // ------------------------------------------------------------------

    /// Rename a revision. An empty or unchanged name is a no-op. Returns
    /// whether a rename was persisted. The document is not replayed.
    pub fn rename(&mut self, revision: RevisionId, name: &str) -> Result<bool, HistoryError> {
        self.ensure_usable()?;
        let Some(name) = self.navigator.rename_plan(revision, name, &self.formatter)? else {
            return Ok(false);
        };
        self.backend
            .rename_revision(self.document_id, revision, &name)
            .map_err(HistoryError::Backend)?;
        self.navigator.apply_rename(revision, &name)?;
        log::info!("revision {} renamed to {:?}", revision, name);
        self.hooks.emit(&HistoryEvent::RevisionRenamed { id: revision, name });
        Ok(true)
    }

    /// Create a new document from the currently materialized one, stamped
    /// with `revision`'s id.
    pub fn fork(&mut self, revision: RevisionId) -> Result<NavigationTarget, HistoryError> {
        self.ensure_usable()?;
        let request = {
            let (_, forked) = self
                .navigator
                .log()
                .find(revision)
                .ok_or(HistoryError::UnknownRevisionId(revision))?;
            let mut snapshot = self.document.export();
            snapshot.revision_id = Some(forked.next_revision_id.clone());
            ForkRequest {
                revision_id: revision,
                spreadsheet_snapshot: snapshot.to_value(),
                default: ForkDefaults {
                    name: format!(
                        "{} (restored from {})",
                        self.name,
                        self.formatter.format(&forked.timestamp)
                    ),
                    display_thumbnail: None,
                },
            }
        };
        let target = self
            .backend
            .fork_history(self.document_id, &request)
            .map_err(HistoryError::Backend)?;
        log::info!("forked revision {} as {:?}", revision, request.default.name);
        self.hooks.emit(&HistoryEvent::Forked { id: revision, target: target.clone() });
        Ok(target)
    }

    /// Leave the history for the live document. Available in every state.
    pub fn exit_to_live(&mut self) -> Result<NavigationTarget, HistoryError> {
        log::info!("leaving history of document {}", self.document_id);
        self.backend
            .open_live_document(self.document_id)
            .map_err(HistoryError::Backend)
    }

    // ------------------------------------------------------------------
    // Data sources
    // ------------------------------------------------------------------

    pub fn take_fetch_requests(&mut self) -> Vec<FetchRequest> {
        self.data_sources.take_requests()
    }

    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<Vec<Row>, String>) -> FetchOutcome {
        self.data_sources
            .complete(ticket, result, &mut self.document, self.navigator.current())
    }

    /// Run every pending fetch through `fetcher`. Returns how many results
    /// were applied.
    pub fn load_data_sources(&mut self, fetcher: &mut impl DataSourceFetcher) -> usize {
        let mut applied = 0;
        for request in self.take_fetch_requests() {
            let result = fetcher.fetch(&request.definition);
            if let FetchOutcome::Applied(_) = self.complete_fetch(request.ticket, result) {
                applied += 1;
            }
        }
        applied
    }

    pub fn fetch_count(&self) -> usize {
        self.data_sources.fetch_count()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The materialized, read-only document.
    pub fn document(&self) -> &Workbook {
        &self.document
    }

    /// For UI state (sheet, selection, scroll); content stays read-only.
    pub fn document_mut(&mut self) -> &mut Workbook {
        &mut self.document
    }

    pub fn status(&self) -> ChainStatus {
        self.status
    }

    pub fn replay_error(&self) -> Option<&ReplayError> {
        self.replay_error.as_ref()
    }

    pub fn current_revision(&self) -> &str {
        self.navigator.current()
    }

    pub fn entries(&self) -> Vec<RevisionEntry> {
        self.navigator.entries(&self.formatter)
    }

    pub fn load_more(&mut self) -> usize {
        self.navigator.load_more()
    }

    pub fn has_more(&self) -> bool {
        self.navigator.has_more()
    }

    pub fn navigator(&self) -> &HistoryNavigator {
        &self.navigator
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    pub fn is_from_snapshot(&self) -> bool {
        self.from_snapshot
    }

    pub fn formatter(&self) -> &TimestampFormatter {
        &self.formatter
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn set_diagnostic_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.diagnostics = Some(sink);
    }
}
