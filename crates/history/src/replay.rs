//! Document replay: base snapshot + revision prefix -> read-only document.

use revgrid_engine::{
    Command, Mode, RevisionApplied, RevisionChange, RevisionIndex, Snapshot, Workbook,
};

use crate::error::{ReplayCause, ReplayError};
use crate::revision::{Revision, RevisionKind};

/// Rebuild the document a revision prefix describes.
///
/// `prefix` must start at the first revision of the log: positions in the
/// slice are the arena indices undo/redo targets refer to. Revisions that do
/// not chain on the current head are skipped (the head does not advance);
/// compare [`Workbook::head`] with the expected revision to detect it.
pub fn materialize(base: &Snapshot, prefix: &[Revision]) -> Result<Workbook, ReplayError> {
    let mut document = Workbook::from_snapshot(base.clone(), Mode::ReadOnly)
        .map_err(|e| ReplayError { revision: None, cause: ReplayCause::Command(e) })?;

    for (i, revision) in prefix.iter().enumerate() {
        if revision.server_revision_id != document.head() {
            log::warn!(
                "skipping revision {} ({} -> {}): document is at {}",
                revision.id,
                revision.server_revision_id,
                revision.next_revision_id,
                document.head()
            );
            continue;
        }
        let fail = |cause| ReplayError { revision: Some(revision.id), cause };

        let commands;
        let change = match &revision.kind {
            RevisionKind::Edit { commands: raw } => {
                commands = raw
                    .iter()
                    .map(Command::from_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| fail(ReplayCause::Command(e)))?;
                RevisionChange::Commands(&commands)
            }
            RevisionKind::Undone { target, reference } => RevisionChange::Undo(
                target.ok_or_else(|| fail(ReplayCause::UnresolvedTarget(reference.clone())))?,
            ),
            RevisionKind::Redone { target, reference } => RevisionChange::Redo(
                target.ok_or_else(|| fail(ReplayCause::UnresolvedTarget(reference.clone())))?,
            ),
            RevisionKind::SnapshotCreated => RevisionChange::Marker,
        };

        let outcome = document
            .apply_revision(
                RevisionIndex(i),
                &revision.server_revision_id,
                &revision.next_revision_id,
                change,
            )
            .map_err(|e| fail(ReplayCause::Command(e)))?;
        if let RevisionApplied::Skipped { head } = outcome {
            log::warn!("revision {} not applied, head stays {}", revision.id, head);
        }
    }

    log::debug!(
        "materialized {} revision(s), head {}",
        prefix.len(),
        document.head()
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::parse_timestamp;
    use revgrid_core::CellPosition;
    use revgrid_engine::{CellValue, CommandError, ListId, SheetId};
    use revgrid_protocol::{RevisionId, UserRef};
    use serde_json::{json, Value};

    fn revision(id: u64, from: &str, to: &str, kind: RevisionKind) -> Revision {
        Revision {
            id: RevisionId(id),
            name: None,
            server_revision_id: from.into(),
            next_revision_id: to.into(),
            timestamp: parse_timestamp("2023-09-09 13:00:00").unwrap(),
            user: UserRef(2, "Superman".into()),
            kind,
        }
    }

    fn create_sheet(id: &str) -> RevisionKind {
        RevisionKind::Edit {
            commands: vec![json!({ "type": "CREATE_SHEET", "sheetId": id, "name": id, "position": 0 })],
        }
    }

    fn base() -> Snapshot {
        Snapshot::from_value(&Value::Object(Default::default())).unwrap()
    }

    #[test]
    fn test_prefix_replays_in_order() {
        let prefix = vec![
            revision(1, "START_REVISION", "a", create_sheet("s1")),
            revision(2, "a", "b", RevisionKind::SnapshotCreated),
            revision(3, "b", "c", create_sheet("s2")),
        ];
        let doc = materialize(&base(), &prefix).unwrap();
        assert!(doc.is_readonly());
        assert_eq!(doc.head(), "c");
        assert_eq!(doc.sheet_count(), 3);
        assert_eq!(doc.sheet_ids()[0], SheetId::new("s2"));
    }

    #[test]
    fn test_gap_skips_and_keeps_head() {
        let prefix = vec![
            revision(1, "START_REVISION", "a", create_sheet("s1")),
            revision(2, "missing", "c", create_sheet("s2")),
        ];
        let doc = materialize(&base(), &prefix).unwrap();
        assert_eq!(doc.head(), "a");
        assert_eq!(doc.sheet_count(), 2);
    }

    #[test]
    fn test_unknown_command_is_a_replay_error() {
        let prefix = vec![revision(
            5,
            "START_REVISION",
            "a",
            RevisionKind::Edit { commands: vec![json!({ "type": "ADD_PIVOT" })] },
        )];
        let err = materialize(&base(), &prefix).unwrap_err();
        assert_eq!(err.revision, Some(RevisionId(5)));
        assert_eq!(err.cause, ReplayCause::Command(CommandError::UnknownCommand("ADD_PIVOT".into())));
    }

    #[test]
    fn test_unresolved_undo_is_a_replay_error() {
        let prefix = vec![revision(
            1,
            "START_REVISION",
            "a",
            RevisionKind::Undone { target: None, reference: "zz".into() },
        )];
        let err = materialize(&base(), &prefix).unwrap_err();
        assert_eq!(err.cause, ReplayCause::UnresolvedTarget("zz".into()));
    }

    fn edit(commands: Value) -> RevisionKind {
        RevisionKind::Edit { commands: commands.as_array().cloned().unwrap() }
    }

    #[test]
    fn test_same_prefix_gives_same_document() {
        let prefix = vec![
            revision(1, "START_REVISION", "a", edit(json!([
                { "type": "CREATE_SHEET", "sheetId": "s1", "name": "Data" },
                { "type": "UPDATE_CELL", "sheetId": "s1", "col": 0, "row": 0, "content": "=LIST(1,1,\"name\")" },
                { "type": "UPDATE_CELL", "sheetId": "s1", "col": 1, "row": 0, "content": "3.5" },
                { "type": "UPDATE_CELL", "sheetId": "s1", "col": 2, "row": 4, "content": "note" }
            ]))),
            revision(2, "a", "b", edit(json!([{
                "type": "INSERT_LIST",
                "listId": "1",
                "definition": { "id": "1", "model": "partner", "columns": ["name"], "domain": [] }
            }]))),
            revision(3, "b", "c", edit(json!([
                { "type": "UPDATE_LIST_DOMAIN", "listId": "1", "domain": [["name", "=", "x"]] },
                { "type": "CLEAR_CELL", "sheetId": "s1", "col": 2, "row": 4 }
            ]))),
            revision(4, "c", "d", RevisionKind::Undone { target: Some(RevisionIndex(2)), reference: "c".into() }),
            revision(5, "d", "e", RevisionKind::Redone { target: Some(RevisionIndex(2)), reference: "c".into() }),
            revision(6, "e", "f", RevisionKind::Undone { target: Some(RevisionIndex(1)), reference: "b".into() }),
        ];

        let first = materialize(&base(), &prefix).unwrap();
        let second = materialize(&base(), &prefix).unwrap();
        assert_eq!(first.export(), second.export());
        assert_eq!(first.head(), "f");

        let s1 = SheetId::new("s1");
        for col in 0..3 {
            for row in 0..5 {
                let position = CellPosition::new(col, row);
                assert_eq!(first.cell_value(&s1, position), second.cell_value(&s1, position));
            }
        }
        assert_eq!(first.cell_value(&s1, CellPosition::new(1, 0)), CellValue::Number(3.5));
        assert_eq!(first.cell_value(&s1, CellPosition::new(2, 4)), CellValue::Empty);
        // The list insertion is undone, so the lookup cell reports it
        assert!(matches!(first.cell_value(&s1, CellPosition::new(0, 0)), CellValue::Error(_)));
        assert!(first.list_definition(&ListId::new("1")).is_none());
    }

    #[test]
    fn test_undo_then_redo_is_identity() {
        let edits = vec![
            revision(1, "START_REVISION", "a", create_sheet("s1")),
            revision(2, "a", "b", create_sheet("s2")),
        ];
        let mut with_undo_redo = edits.clone();
        with_undo_redo.push(revision(
            3,
            "b",
            "c",
            RevisionKind::Undone { target: Some(RevisionIndex(1)), reference: "b".into() },
        ));
        with_undo_redo.push(revision(
            4,
            "c",
            "d",
            RevisionKind::Redone { target: Some(RevisionIndex(1)), reference: "b".into() },
        ));

        let plain = materialize(&base(), &edits).unwrap();
        let replayed = materialize(&base(), &with_undo_redo).unwrap();
        assert_eq!(replayed.sheet_ids(), plain.sheet_ids());
        assert_eq!(replayed.export().sheets, plain.export().sheets);
    }
}
