//! Classifies a materialized document against the revision it should be at.

use revgrid_engine::Workbook;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    /// The document reached the expected revision
    Complete,
    /// Revisions are missing; reloading from the authoritative snapshot may fix it
    Recoverable,
    /// Revisions are missing even from the authoritative snapshot, or replay failed
    Corrupted,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::Complete => "COMPLETE",
            ChainStatus::Recoverable => "RECOVERABLE",
            ChainStatus::Corrupted => "CORRUPTED",
        }
    }
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `from_snapshot`: whether the history was loaded from the authoritative
/// snapshot (a forced reload).
pub fn check(document: &Workbook, expected_revision_id: &str, from_snapshot: bool) -> ChainStatus {
    if document.head() == expected_revision_id {
        ChainStatus::Complete
    } else if from_snapshot {
        ChainStatus::Corrupted
    } else {
        ChainStatus::Recoverable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revgrid_engine::Mode;
    use serde_json::json;

    #[test]
    fn test_check() {
        let doc = Workbook::from_value(&json!({ "revisionId": "r9" }), Mode::ReadOnly).unwrap();
        assert_eq!(check(&doc, "r9", false), ChainStatus::Complete);
        assert_eq!(check(&doc, "r9", true), ChainStatus::Complete);
        assert_eq!(check(&doc, "r10", false), ChainStatus::Recoverable);
        assert_eq!(check(&doc, "r10", true), ChainStatus::Corrupted);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(ChainStatus::Recoverable).unwrap(), json!("RECOVERABLE"));
        assert_eq!(ChainStatus::Corrupted.to_string(), "CORRUPTED");
    }
}
