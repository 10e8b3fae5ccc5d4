//! Named extension points of a history session.
//!
//! Handlers are registered on a [`HookPoint`] with a priority and run lowest
//! priority first, then in registration order. They observe; they cannot
//! veto or alter what the session does.

use revgrid_protocol::{NavigationTarget, RevisionId};

use crate::consistency::ChainStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeNavigate,
    Materialized,
    StatusChanged,
    ViewportRestored,
    RevisionRenamed,
    Forked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    BeforeNavigate { from: String, to: String },
    /// A new document replaced the previous one
    Materialized { revision: String, head: String, sheets: usize },
    StatusChanged { previous: ChainStatus, status: ChainStatus },
    ViewportRestored { revision: String, applied: bool },
    RevisionRenamed { id: RevisionId, name: String },
    Forked { id: RevisionId, target: NavigationTarget },
}

impl HistoryEvent {
    pub fn point(&self) -> HookPoint {
        match self {
            HistoryEvent::BeforeNavigate { .. } => HookPoint::BeforeNavigate,
            HistoryEvent::Materialized { .. } => HookPoint::Materialized,
            HistoryEvent::StatusChanged { .. } => HookPoint::StatusChanged,
            HistoryEvent::ViewportRestored { .. } => HookPoint::ViewportRestored,
            HistoryEvent::RevisionRenamed { .. } => HookPoint::RevisionRenamed,
            HistoryEvent::Forked { .. } => HookPoint::Forked,
        }
    }
}

pub type HookCallback = Box<dyn FnMut(&HistoryEvent)>;

/// Returned by [`HookRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

struct Registered {
    handle: HookHandle,
    point: HookPoint,
    priority: i32,
    callback: HookCallback,
}

#[derive(Default)]
pub struct HookRegistry {
    handlers: Vec<Registered>,
    next_handle: u64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        point: HookPoint,
        priority: i32,
        callback: impl FnMut(&HistoryEvent) + 'static,
    ) -> HookHandle {
        let handle = HookHandle(self.next_handle);
        self.next_handle += 1;
        self.handlers.push(Registered { handle, point, priority, callback: Box::new(callback) });
        // Stable sort keeps registration order within a priority
        self.handlers.sort_by_key(|h| h.priority);
        handle
    }

    pub fn unregister(&mut self, handle: HookHandle) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.handle != handle);
        self.handlers.len() != before
    }

    /// Run every handler of the event's hook point. Returns how many ran.
    pub fn emit(&mut self, event: &HistoryEvent) -> usize {
        let point = event.point();
        let mut ran = 0;
        for handler in self.handlers.iter_mut().filter(|h| h.point == point) {
            (handler.callback)(event);
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry").field("handlers", &self.handlers.len()).finish()
    }
}
