// Shared fixtures for history integration tests.

#![allow(dead_code)]

use revgrid_config::HistorySettings;
use revgrid_history::{HistorySession, MemoryBackend};
use revgrid_protocol::{DocumentId, HistoryPayload, RevisionId, RevisionRecord, RevisionType, UserRef};
use serde_json::{json, Value};

pub const TIMESTAMP: &str = "2023-09-09 13:00:00";

/// Next revision of `revisions`, chained on the last one. Edits create a
/// sheet named after their position.
pub fn create_revision(revisions: &[RevisionRecord], kind: RevisionType) -> RevisionRecord {
    let len = revisions.len();
    let commands = match kind {
        RevisionType::RemoteRevision => Some(vec![json!({
            "type": "CREATE_SHEET",
            "sheetId": format!("sheet-{}", len + 2),
            "position": 0,
            "name": format!("sheet {}", len + 2),
        })]),
        _ => None,
    };
    RevisionRecord {
        id: RevisionId(len as u64 + 1),
        name: Some(format!("revision {}", len + 1)),
        server_revision_id: revisions
            .last()
            .map(|r| r.next_revision_id.clone())
            .unwrap_or_else(|| "START_REVISION".to_string()),
        next_revision_id: format!("rev-{}", len + 1),
        version: Some(json!("1")),
        timestamp: TIMESTAMP.to_string(),
        user: UserRef(2, "Superman".into()),
        kind,
        commands,
        undone_revision_id: None,
        redone_revision_id: None,
    }
}

pub fn sheet_revisions(count: usize) -> Vec<RevisionRecord> {
    let mut revisions = Vec::new();
    for _ in 0..count {
        let next = create_revision(&revisions, RevisionType::RemoteRevision);
        revisions.push(next);
    }
    revisions
}

pub fn payload(data: Value, revisions: Vec<RevisionRecord>) -> HistoryPayload {
    HistoryPayload { data, revisions, name: "test".into() }
}

pub fn open(backend: MemoryBackend) -> HistorySession<MemoryBackend> {
    open_with(backend, HistorySettings::default())
}

pub fn open_with(backend: MemoryBackend, settings: HistorySettings) -> HistorySession<MemoryBackend> {
    HistorySession::open(backend, DocumentId(1), settings, false).expect("history opens")
}

pub fn sheet_count(session: &HistorySession<MemoryBackend>) -> usize {
    session.document().sheet_count()
}

/// Answers every fetch with one row and remembers the requested domains.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    pub domains: Vec<Value>,
}

impl revgrid_history::DataSourceFetcher for RecordingFetcher {
    fn fetch(
        &mut self,
        definition: &revgrid_engine::ListDefinition,
    ) -> Result<Vec<revgrid_engine::Row>, String> {
        self.domains.push(definition.domain.clone());
        let name = definition.domain[0][2].as_str().unwrap_or("?").to_string();
        Ok(vec![json!({ "name": name }).as_object().cloned().unwrap_or_default()])
    }
}
