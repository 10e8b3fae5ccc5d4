//! External data source synchronization across materializations.
//!
//! Each materialized document starts with every list in `Loading`. The
//! synchronizer remembers the last query and result per list: when the new
//! document asks for the same query the cached rows are handed over, when the
//! query changed (or the list is new) a fetch request is emitted, tagged with
//! the revision that asked for it. Results are applied only while that
//! revision is still the current one; late results are dropped.

use revgrid_engine::{EvaluationReport, ListDefinition, ListId, ListQuery, LoadState, Row, Workbook};
use rustc_hash::FxHashMap;

/// Identifies one emitted fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub list_id: ListId,
    /// Revision whose document asked for the rows
    pub revision: String,
    pub definition: ListDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Rows stored and cells re-evaluated
    Applied(EvaluationReport),
    /// Result arrived after the document moved on; discarded
    Stale,
}

/// Loads the rows of a list. Errors are shown in the dependent cells.
pub trait DataSourceFetcher {
    fn fetch(&mut self, definition: &ListDefinition) -> Result<Vec<Row>, String>;
}

impl<F> DataSourceFetcher for F
where
    F: FnMut(&ListDefinition) -> Result<Vec<Row>, String>,
{
    fn fetch(&mut self, definition: &ListDefinition) -> Result<Vec<Row>, String> {
        self(definition)
    }
}

#[derive(Debug, Clone)]
struct CachedSource {
    query: ListQuery,
    state: LoadState,
    /// Outstanding fetch for `query`
    ticket: Option<FetchTicket>,
}

#[derive(Debug, Clone)]
struct InFlight {
    list_id: ListId,
    revision: String,
}

#[derive(Debug, Default)]
pub struct DataSourceSynchronizer {
    cache: FxHashMap<ListId, CachedSource>,
    in_flight: FxHashMap<FetchTicket, InFlight>,
    requests: Vec<FetchRequest>,
    next_ticket: u64,
    fetches: usize,
}

impl DataSourceSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand cached rows to `document` and emit fetches for the lists whose
    /// query changed. Returns the number of new fetch requests.
    pub fn reconcile(&mut self, document: &mut Workbook, revision: &str) -> usize {
        let definitions: Vec<ListDefinition> = document.lists().cloned().collect();
        let mut emitted = 0;

        for definition in definitions {
            let query = definition.query();
            if let Some(cached) = self.cache.get(&definition.id).filter(|c| c.query == query) {
                match (&cached.state, cached.ticket) {
                    (LoadState::Loading, Some(ticket)) => {
                        // Same query already being fetched: the result now belongs to this revision
                        if let Some(flight) = self.in_flight.get_mut(&ticket) {
                            flight.revision = revision.to_string();
                        }
                    }
                    (state, _) => {
                        if let Err(e) = document.set_list_state(&definition.id, state.clone()) {
                            log::warn!("cannot reuse rows of list {}: {}", definition.id, e);
                        }
                    }
                }
                continue;
            }

            let ticket = FetchTicket(self.next_ticket);
            self.next_ticket += 1;
            self.fetches += 1;
            emitted += 1;

            if let Some(previous) = self.cache.get(&definition.id).and_then(|c| c.ticket) {
                self.in_flight.remove(&previous);
            }
            log::debug!("list {} needs a fetch for revision {}", definition.id, revision);
            self.cache.insert(
                definition.id.clone(),
                CachedSource { query, state: LoadState::Loading, ticket: Some(ticket) },
            );
            self.in_flight.insert(
                ticket,
                InFlight { list_id: definition.id.clone(), revision: revision.to_string() },
            );
            self.requests.push(FetchRequest {
                ticket,
                list_id: definition.id.clone(),
                revision: revision.to_string(),
                definition,
            });
        }
        emitted
    }

    /// Fetch requests emitted since the last call.
    pub fn take_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Store a fetch result. `current_revision` is the revision `document`
    /// is at; a result requested for another revision is discarded.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Row>, String>,
        document: &mut Workbook,
        current_revision: &str,
    ) -> FetchOutcome {
        let Some(flight) = self.in_flight.remove(&ticket) else {
            log::warn!("discarding result of superseded fetch {:?}", ticket);
            return FetchOutcome::Stale;
        };
        if flight.revision != current_revision {
            log::warn!(
                "discarding rows of list {} fetched for {} (now at {})",
                flight.list_id,
                flight.revision,
                current_revision
            );
            self.cache.remove(&flight.list_id);
            return FetchOutcome::Stale;
        }

        let state = match result {
            Ok(rows) => LoadState::Ready(rows),
            Err(message) => LoadState::Failed(message),
        };
        if matches!(state, LoadState::Failed(_)) {
            // Retry on the next materialization
            self.cache.remove(&flight.list_id);
        } else if let Some(cached) = self.cache.get_mut(&flight.list_id) {
            cached.state = state.clone();
            cached.ticket = None;
        }
        if let Err(e) = document.set_list_state(&flight.list_id, state) {
            log::warn!("list {} no longer in the document: {}", flight.list_id, e);
            return FetchOutcome::Stale;
        }
        FetchOutcome::Applied(document.evaluate_cells())
    }

    /// Requests waiting for a result.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total fetch requests emitted.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}
