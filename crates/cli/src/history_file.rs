//! History store backed by a JSON file.
//!
//! ```json
//! {
//!   "id": 1,
//!   "name": "Pipeline",
//!   "data": { "sheets": [...], "lists": {...} },
//!   "revisions": [...],
//!   "snapshot": { "data": {...}, "revisions": [...] },
//!   "rows": { "partner": [{ "name": "test" }] }
//! }
//! ```
//!
//! `snapshot` is what a reload from the authoritative snapshot serves;
//! `rows` holds the records list data sources are filtered from, keyed by
//! model.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use revgrid_engine::Row;
use revgrid_history::{live_document_target, BackendError, HistoryBackend};
use revgrid_protocol::{DocumentId, ForkRequest, HistoryPayload, NavigationTarget, RevisionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_document() -> DocumentId {
    DocumentId(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    #[serde(default = "default_document")]
    pub id: DocumentId,
    #[serde(flatten)]
    pub history: HistoryPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<HistoryPayload>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rows: BTreeMap<String, Vec<Row>>,
}

impl HistoryFile {
    pub fn read(path: &Path) -> Result<Self, BackendError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| BackendError::Unreachable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| BackendError::Malformed(format!("{}: {}", path.display(), e)))
    }

    pub fn write(&self, path: &Path) -> Result<(), BackendError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| BackendError::Unreachable(format!("{}: {}", path.display(), e)))
    }
}

/// Serves the history of one file. Every fetch re-reads it, renames are
/// written back, forks become new history files.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    fork_output: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let fork_output = path.with_extension("fork.json");
        Self { path, fork_output }
    }

    pub fn with_fork_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.fork_output = path.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, document: DocumentId) -> Result<HistoryFile, BackendError> {
        let file = HistoryFile::read(&self.path)?;
        if file.id != document {
            return Err(BackendError::Rejected(format!(
                "{} holds document {}, not {}",
                self.path.display(),
                file.id,
                document
            )));
        }
        Ok(file)
    }
}

impl HistoryBackend for FileBackend {
    fn fetch_history(
        &mut self,
        document: DocumentId,
        force_from_snapshot: bool,
    ) -> Result<HistoryPayload, BackendError> {
        let file = self.load(document)?;
        match (file.snapshot, force_from_snapshot) {
            (Some(mut snapshot), true) => {
                if snapshot.name.is_empty() {
                    snapshot.name = file.history.name;
                }
                Ok(snapshot)
            }
            _ => Ok(file.history),
        }
    }

    fn rename_revision(
        &mut self,
        document: DocumentId,
        revision: RevisionId,
        name: &str,
    ) -> Result<(), BackendError> {
        let mut file = self.load(document)?;
        let record = file
            .history
            .revisions
            .iter_mut()
            .find(|r| r.id == revision)
            .ok_or_else(|| BackendError::Rejected(format!("no revision {}", revision)))?;
        record.name = Some(name.to_string());
        file.write(&self.path)
    }

    fn fork_history(
        &mut self,
        document: DocumentId,
        request: &ForkRequest,
    ) -> Result<NavigationTarget, BackendError> {
        let source = self.load(document)?;
        let forked = DocumentId(source.id.0 + 1);
        let file = HistoryFile {
            id: forked,
            history: HistoryPayload {
                data: request.spreadsheet_snapshot.clone(),
                revisions: Vec::new(),
                name: request.default.name.clone(),
            },
            snapshot: None,
            rows: source.rows,
        };
        file.write(&self.fork_output)?;
        log::info!("fork of document {} written to {}", document, self.fork_output.display());

        let mut target = live_document_target(forked);
        target
            .params
            .insert("path".into(), Value::from(self.fork_output.display().to_string()));
        Ok(target)
    }

    fn open_live_document(&mut self, document: DocumentId) -> Result<NavigationTarget, BackendError> {
        Ok(live_document_target(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revgrid_protocol::ForkDefaults;
    use serde_json::json;

    fn write_history(dir: &Path) -> PathBuf {
        let path = dir.join("history.json");
        fs::write(
            &path,
            json!({
                "id": 7,
                "name": "Pipeline",
                "revisions": [{
                    "id": 1,
                    "serverRevisionId": "START_REVISION",
                    "nextRevisionId": "rev-1",
                    "timestamp": "2023-09-09 13:00:00",
                    "user": [2, "Superman"],
                    "type": "REMOTE_REVISION",
                    "commands": []
                }],
                "snapshot": { "data": { "revisionId": "rev-1" } }
            })
            .to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_fetch_and_snapshot_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(write_history(dir.path()));

        let history = backend.fetch_history(DocumentId(7), false).unwrap();
        assert_eq!(history.revisions.len(), 1);
        assert_eq!(history.name, "Pipeline");

        let snapshot = backend.fetch_history(DocumentId(7), true).unwrap();
        assert!(snapshot.revisions.is_empty());
        assert_eq!(snapshot.name, "Pipeline");
        assert_eq!(snapshot.data["revisionId"], json!("rev-1"));
    }

    #[test]
    fn test_wrong_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(write_history(dir.path()));
        let err = backend.fetch_history(DocumentId(8), false).unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[test]
    fn test_rename_is_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_history(dir.path());
        let mut backend = FileBackend::new(&path);
        backend.rename_revision(DocumentId(7), RevisionId(1), "v1").unwrap();

        let file = HistoryFile::read(&path).unwrap();
        assert_eq!(file.history.revisions[0].name.as_deref(), Some("v1"));
        assert!(file.snapshot.is_some());
        assert!(matches!(
            backend.rename_revision(DocumentId(7), RevisionId(9), "v1"),
            Err(BackendError::Rejected(_))
        ));
    }

    #[test]
    fn test_fork_writes_new_history() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("copy.json");
        let mut backend = FileBackend::new(write_history(dir.path())).with_fork_output(&output);
        let target = backend
            .fork_history(
                DocumentId(7),
                &ForkRequest {
                    revision_id: RevisionId(1),
                    spreadsheet_snapshot: json!({ "revisionId": "rev-1" }),
                    default: ForkDefaults { name: "copy".into(), display_thumbnail: None },
                },
            )
            .unwrap();

        assert_eq!(target.params["spreadsheet_id"], json!(8));
        let fork = HistoryFile::read(&output).unwrap();
        assert_eq!(fork.id, DocumentId(8));
        assert_eq!(fork.history.name, "copy");
        assert!(fork.history.revisions.is_empty());
    }
}
