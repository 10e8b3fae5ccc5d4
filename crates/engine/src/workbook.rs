use std::collections::BTreeMap;

use revgrid_core::{CellPosition, ScrollOffset, ViewportSize};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::cell::{self, CellValue, ListLookup};
use crate::cell_id::CellRef;
use crate::command::{Command, CommandError};
use crate::data_source::{ListDefinition, ListId, LoadState};
use crate::journal::{Journal, RevisionIndex};
use crate::sheet::{is_valid_sheet_name, normalize_sheet_name, Sheet, SheetId};
use crate::snapshot::{CellData, SheetData, Snapshot};

/// Id and name of the sheet an empty payload is given.
pub const DEFAULT_SHEET_ID: &str = "Sheet1";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

static LOADING: LoadState = LoadState::Loading;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    /// `dispatch` is rejected. Revisions, UI state and recomputation still work.
    ReadOnly,
}

/// What a revision does to the document.
#[derive(Debug, Clone, Copy)]
pub enum RevisionChange<'a> {
    Commands(&'a [Command]),
    /// Undo the revision recorded under this index
    Undo(RevisionIndex),
    /// Redo the revision recorded under this index
    Redo(RevisionIndex),
    /// Chain link without content (snapshot marker)
    Marker,
}

/// Outcome of offering a revision to the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionApplied {
    Applied,
    /// The revision was not built on the workbook's head; nothing changed.
    Skipped { head: String },
}

/// Sheet and cell the user is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePosition {
    pub sheet_id: SheetId,
    pub col: u32,
    pub row: u32,
}

/// Result of a cell re-evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Number of non-empty cells evaluated.
    pub evaluated: usize,
    /// Cells whose value differs from the previous pass.
    pub changed: Vec<CellRef>,
}

fn in_grid(col: u32, row: u32) -> Result<CellPosition, CommandError> {
    let position = CellPosition::new(col, row);
    if position.is_in_grid() {
        Ok(position)
    } else {
        Err(CommandError::OutOfGrid { col, row })
    }
}

/// Sheets and lists: everything revisions can change.
#[derive(Debug, Clone, PartialEq)]
struct Content {
    sheets: Vec<Sheet>,
    lists: BTreeMap<ListId, ListDefinition>,
}

impl Content {
    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CommandError> {
        let mut content = Content { sheets: Vec::new(), lists: snapshot.lists.clone() };
        for data in &snapshot.sheets {
            if content.sheet_index(&data.id).is_some() {
                return Err(CommandError::DuplicateSheet(data.id.clone()));
            }
            let mut sheet = Sheet::new(data.id.clone(), &data.name);
            for (reference, cell) in &data.cells {
                let position = CellPosition::from_a1(reference)
                    .filter(CellPosition::is_in_grid)
                    .ok_or_else(|| {
                        CommandError::InvalidSnapshot(format!(
                            "bad cell reference {:?} in sheet {}",
                            reference, data.id
                        ))
                    })?;
                sheet.set_content(position, &cell.content);
            }
            content.sheets.push(sheet);
        }
        if content.sheets.is_empty() {
            content
                .sheets
                .push(Sheet::new(SheetId::new(DEFAULT_SHEET_ID), DEFAULT_SHEET_NAME));
        }
        Ok(content)
    }

    fn sheet_index(&self, id: &SheetId) -> Option<usize> {
        self.sheets.iter().position(|s| s.id() == id)
    }

    fn sheet_mut(&mut self, id: &SheetId) -> Result<&mut Sheet, CommandError> {
        self.sheets
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| CommandError::UnknownSheet(id.clone()))
    }

    fn name_taken(&self, name: &str, exclude: Option<&SheetId>) -> bool {
        let key = normalize_sheet_name(name);
        self.sheets
            .iter()
            .any(|s| Some(s.id()) != exclude && s.name_key == key)
    }

    fn apply(&mut self, command: &Command) -> Result<(), CommandError> {
        match command {
            Command::CreateSheet { sheet_id, name, position } => {
                if self.sheet_index(sheet_id).is_some() {
                    return Err(CommandError::DuplicateSheet(sheet_id.clone()));
                }
                if !is_valid_sheet_name(name) {
                    return Err(CommandError::InvalidSheetName(name.clone()));
                }
                if self.name_taken(name, None) {
                    return Err(CommandError::DuplicateSheetName(name.clone()));
                }
                let at = (*position).min(self.sheets.len());
                self.sheets.insert(at, Sheet::new(sheet_id.clone(), name));
            }
            Command::DeleteSheet { sheet_id } => {
                let index = self
                    .sheet_index(sheet_id)
                    .ok_or_else(|| CommandError::UnknownSheet(sheet_id.clone()))?;
                if self.sheets.len() <= 1 {
                    return Err(CommandError::LastSheet);
                }
                self.sheets.remove(index);
            }
            Command::RenameSheet { sheet_id, name } => {
                if !is_valid_sheet_name(name) {
                    return Err(CommandError::InvalidSheetName(name.clone()));
                }
                if self.name_taken(name, Some(sheet_id)) {
                    return Err(CommandError::DuplicateSheetName(name.clone()));
                }
                self.sheet_mut(sheet_id)?.rename(name);
            }
            Command::UpdateCell { sheet_id, col, row, content } => {
                let position = in_grid(*col, *row)?;
                self.sheet_mut(sheet_id)?.set_content(position, content);
            }
            Command::ClearCell { sheet_id, col, row } => {
                let position = in_grid(*col, *row)?;
                self.sheet_mut(sheet_id)?.clear(position);
            }
            Command::InsertList { list_id, definition } => {
                if self.lists.contains_key(list_id) {
                    return Err(CommandError::DuplicateList(list_id.clone()));
                }
                self.lists.insert(list_id.clone(), definition.clone());
            }
            Command::UpdateListDomain { list_id, domain } => {
                let list = self
                    .lists
                    .get_mut(list_id)
                    .ok_or_else(|| CommandError::UnknownList(list_id.clone()))?;
                list.domain = domain.clone();
            }
        }
        Ok(())
    }

    /// Apply all commands or none.
    fn apply_all<'a>(&self, commands: impl IntoIterator<Item = &'a Command>) -> Result<Self, CommandError> {
        let mut next = self.clone();
        for command in commands {
            next.apply(command)?;
        }
        Ok(next)
    }
}

/// A spreadsheet document: content seeded from a snapshot, the journal of
/// revisions applied on top of it, and the per-view UI state (active sheet,
/// selection, scroll).
#[derive(Debug, Clone)]
pub struct Workbook {
    base: Snapshot,
    content: Content,
    journal: Journal,
    /// Id of the last revision the content accounts for
    head: String,
    mode: Mode,
    active_sheet: SheetId,
    selection: CellPosition,
    scroll: ScrollOffset,
    /// Unknown until the host has laid the grid out
    viewport: Option<ViewportSize>,
    list_states: FxHashMap<ListId, LoadState>,
    evaluated: FxHashMap<CellRef, CellValue>,
}

impl Workbook {
    pub fn from_snapshot(snapshot: Snapshot, mode: Mode) -> Result<Self, CommandError> {
        let content = Content::from_snapshot(&snapshot)?;
        let active_sheet = content.sheets[0].id().clone();
        let head = snapshot.head().to_string();
        Ok(Self {
            base: snapshot,
            content,
            journal: Journal::new(),
            head,
            mode,
            active_sheet,
            selection: CellPosition::default(),
            scroll: ScrollOffset::ZERO,
            viewport: None,
            list_states: FxHashMap::default(),
            evaluated: FxHashMap::default(),
        })
    }

    pub fn from_value(value: &Value, mode: Mode) -> Result<Self, CommandError> {
        Self::from_snapshot(Snapshot::from_value(value)?, mode)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.mode == Mode::ReadOnly
    }

    /// Id of the last revision applied (or the base snapshot's revision id).
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Whether the revision recorded under `revision` is currently undone.
    pub fn is_undone(&self, revision: RevisionIndex) -> Option<bool> {
        self.journal.is_undone(revision)
    }

    // ------------------------------------------------------------------
    // Revisions
    // ------------------------------------------------------------------

    /// Apply a revision built on top of `server_revision_id`.
    ///
    /// This is the replay path and is allowed in read-only mode. A revision
    /// whose predecessor is not the current head is skipped and leaves the
    /// head untouched. Application is atomic: on error nothing changes.
    pub fn apply_revision(
        &mut self,
        revision: RevisionIndex,
        server_revision_id: &str,
        next_revision_id: &str,
        change: RevisionChange<'_>,
    ) -> Result<RevisionApplied, CommandError> {
        if server_revision_id != self.head {
            return Ok(RevisionApplied::Skipped { head: self.head.clone() });
        }
        let lists_before = self.content.lists.clone();
        match change {
            RevisionChange::Commands(commands) => {
                self.content = self.content.apply_all(commands)?;
                self.journal.record(Some(revision), commands.to_vec());
            }
            RevisionChange::Undo(target) => self.set_undone(target, true)?,
            RevisionChange::Redo(target) => self.set_undone(target, false)?,
            RevisionChange::Marker => {}
        }
        self.head = next_revision_id.to_string();
        self.after_content_change(&lists_before);
        Ok(RevisionApplied::Applied)
    }

    fn set_undone(&mut self, target: RevisionIndex, undone: bool) -> Result<(), CommandError> {
        if !self.journal.set_undone(target, undone)? {
            return Ok(());
        }
        match self.rebuild_content() {
            Ok(content) => {
                self.content = content;
                Ok(())
            }
            Err(e) => {
                self.journal.set_undone(target, !undone)?;
                Err(e)
            }
        }
    }

    /// Replay every active command on the base content. A command whose
    /// target the undo/redo removed (or brought back twice) is dropped.
    fn rebuild_content(&self) -> Result<Content, CommandError> {
        let mut content = Content::from_snapshot(&self.base)?;
        for command in self.journal.active_commands() {
            match content.apply(command) {
                Ok(()) => {}
                Err(e) if e.is_conflict() => {
                    log::warn!("dropping {} on rebuild: {}", command.type_name(), e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(content)
    }

    /// Keep UI and data-source state consistent with new content.
    fn after_content_change(&mut self, lists_before: &BTreeMap<ListId, ListDefinition>) {
        if self.content.sheet_index(&self.active_sheet).is_none() {
            self.active_sheet = self.content.sheets[0].id().clone();
            self.selection = CellPosition::default();
        }
        self.scroll = self.scroll.clamp_to(self.max_scroll_offset());

        let lists = &self.content.lists;
        self.list_states.retain(|id, _| match (lists_before.get(id), lists.get(id)) {
            (Some(before), Some(after)) => before.query() == after.query(),
            _ => false,
        });
    }

    /// Apply a user command. Rejected in read-only mode.
    pub fn dispatch(&mut self, command: Command) -> Result<(), CommandError> {
        if self.is_readonly() {
            return Err(CommandError::ReadOnly);
        }
        let lists_before = self.content.lists.clone();
        self.content = self.content.apply_all(std::iter::once(&command))?;
        self.journal.record(None, vec![command]);
        self.after_content_change(&lists_before);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sheets and cells
    // ------------------------------------------------------------------

    pub fn sheet_count(&self) -> usize {
        self.content.sheets.len()
    }

    pub fn sheet_ids(&self) -> Vec<SheetId> {
        self.content.sheets.iter().map(|s| s.id().clone()).collect()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.content.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.content.sheets
    }

    pub fn sheet(&self, id: &SheetId) -> Option<&Sheet> {
        self.content.sheets.iter().find(|s| s.id() == id)
    }

    pub fn has_sheet(&self, id: &SheetId) -> bool {
        self.content.sheet_index(id).is_some()
    }

    pub fn cell_content(&self, sheet: &SheetId, position: CellPosition) -> Option<&str> {
        self.sheet(sheet)?.cell(position).map(|c| c.content.as_str())
    }

    pub fn cell_value(&self, sheet: &SheetId, position: CellPosition) -> CellValue {
        match self.cell_content(sheet, position) {
            Some(content) => cell::evaluate(content, self),
            None => CellValue::Empty,
        }
    }

    // ------------------------------------------------------------------
    // UI state
    // ------------------------------------------------------------------

    pub fn active_sheet_id(&self) -> &SheetId {
        &self.active_sheet
    }

    /// Switch sheets. Selection and scroll reset when the sheet changes.
    pub fn activate_sheet(&mut self, id: &SheetId) -> Result<(), CommandError> {
        if !self.has_sheet(id) {
            return Err(CommandError::UnknownSheet(id.clone()));
        }
        if *id != self.active_sheet {
            self.active_sheet = id.clone();
            self.selection = CellPosition::default();
            self.scroll = ScrollOffset::ZERO;
        }
        Ok(())
    }

    pub fn select_cell(&mut self, position: CellPosition) {
        self.selection = position;
    }

    pub fn selection(&self) -> CellPosition {
        self.selection
    }

    pub fn active_position(&self) -> ActivePosition {
        ActivePosition {
            sheet_id: self.active_sheet.clone(),
            col: self.selection.col,
            row: self.selection.row,
        }
    }

    pub fn viewport_size(&self) -> Option<ViewportSize> {
        self.viewport
    }

    pub fn set_viewport_size(&mut self, size: ViewportSize) {
        self.viewport = Some(size);
        self.scroll = self.scroll.clamp_to(self.max_scroll_offset());
    }

    /// Largest scroll offset the active sheet allows. Zero while the
    /// viewport size is unknown.
    pub fn max_scroll_offset(&self) -> ScrollOffset {
        let Some(viewport) = self.viewport else {
            return ScrollOffset::ZERO;
        };
        let extent = self
            .sheet(&self.active_sheet)
            .map(Sheet::content_extent)
            .unwrap_or(ScrollOffset::ZERO);
        ScrollOffset::new(
            extent.x.saturating_sub(viewport.width),
            extent.y.saturating_sub(viewport.height),
        )
    }

    /// Set the scroll offset, clamped to what the viewport allows.
    /// Returns the offset actually applied.
    pub fn set_scroll_offset(&mut self, offset: ScrollOffset) -> ScrollOffset {
        self.scroll = offset.clamp_to(self.max_scroll_offset());
        self.scroll
    }

    pub fn scroll_offset(&self) -> ScrollOffset {
        self.scroll
    }

    // ------------------------------------------------------------------
    // Data sources
    // ------------------------------------------------------------------

    pub fn lists(&self) -> impl Iterator<Item = &ListDefinition> {
        self.content.lists.values()
    }

    pub fn list_definition(&self, id: &ListId) -> Option<&ListDefinition> {
        self.content.lists.get(id)
    }

    /// Store loaded rows (or a failure) for a list. Part of internal
    /// recomputation, so allowed in read-only mode.
    pub fn set_list_state(&mut self, id: &ListId, state: LoadState) -> Result<(), CommandError> {
        if !self.content.lists.contains_key(id) {
            return Err(CommandError::UnknownList(id.clone()));
        }
        self.list_states.insert(id.clone(), state);
        Ok(())
    }

    /// Cells reading from a list.
    pub fn cells_depending_on(&self, list: &ListId) -> Vec<CellRef> {
        let mut cells = Vec::new();
        for sheet in &self.content.sheets {
            for (position, cell) in sheet.cells() {
                if cell.list_reference().is_some_and(|r| r.list == *list) {
                    cells.push(CellRef::new(sheet.id().clone(), position));
                }
            }
        }
        cells
    }

    /// Re-evaluate every cell and report those whose value changed since
    /// the previous pass.
    pub fn evaluate_cells(&mut self) -> EvaluationReport {
        let mut values = FxHashMap::default();
        let mut report = EvaluationReport::default();
        for sheet in &self.content.sheets {
            for (position, cell) in sheet.cells() {
                let cell_ref = CellRef::new(sheet.id().clone(), position);
                let value = cell::evaluate(&cell.content, self);
                if self.evaluated.get(&cell_ref) != Some(&value) {
                    report.changed.push(cell_ref.clone());
                }
                values.insert(cell_ref, value);
                report.evaluated += 1;
            }
        }
        // Cells that disappeared count as changed too
        for cell_ref in self.evaluated.keys() {
            if !values.contains_key(cell_ref) {
                report.changed.push(cell_ref.clone());
            }
        }
        report.changed.sort();
        self.evaluated = values;
        report
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Full payload of the current state, stamped with the current head.
    pub fn export(&self) -> Snapshot {
        let sheets = self
            .content
            .sheets
            .iter()
            .map(|sheet| SheetData {
                id: sheet.id().clone(),
                name: sheet.name.clone(),
                cells: sheet
                    .cells()
                    .into_iter()
                    .map(|(position, cell)| {
                        (position.to_a1(), CellData { content: cell.content.clone() })
                    })
                    .collect(),
            })
            .collect();
        Snapshot {
            version: self.base.version,
            revision_id: Some(self.head.clone()),
            sheets,
            lists: self.content.lists.clone(),
            extra: self.base.extra.clone(),
        }
    }
}

impl ListLookup for Workbook {
    fn list_state(&self, list: &ListId) -> Option<&LoadState> {
        if !self.content.lists.contains_key(list) {
            return None;
        }
        Some(self.list_states.get(list).unwrap_or(&LOADING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(id: &str, position: usize) -> Command {
        Command::CreateSheet { sheet_id: SheetId::new(id), name: format!("sheet {}", id), position }
    }

    fn apply(wb: &mut Workbook, index: usize, from: &str, to: &str, change: RevisionChange<'_>) -> RevisionApplied {
        wb.apply_revision(RevisionIndex(index), from, to, change).unwrap()
    }

    #[test]
    fn test_empty_payload_has_default_sheet() {
        let wb = Workbook::from_value(&json!({}), Mode::Normal).unwrap();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.active_sheet_id(), &SheetId::new(DEFAULT_SHEET_ID));
        assert_eq!(wb.head(), crate::snapshot::START_REVISION);
    }

    #[test]
    fn test_readonly_rejects_dispatch() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        assert_eq!(wb.dispatch(create("a", 0)), Err(CommandError::ReadOnly));
        assert_eq!(wb.sheet_count(), 1);

        // UI state stays usable
        wb.select_cell(CellPosition::new(2, 3));
        assert_eq!(wb.selection(), CellPosition::new(2, 3));
    }

    #[test]
    fn test_revision_chain() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let cmds = [create("a", 0)];
        let outcome = apply(&mut wb, 0, "START_REVISION", "r1", RevisionChange::Commands(&cmds));
        assert_eq!(outcome, RevisionApplied::Applied);
        assert_eq!(wb.head(), "r1");
        assert_eq!(wb.sheet_ids()[0], SheetId::new("a"));

        let cmds = [create("b", 0)];
        let outcome = apply(&mut wb, 1, "wrong", "r2", RevisionChange::Commands(&cmds));
        assert_eq!(outcome, RevisionApplied::Skipped { head: "r1".into() });
        assert_eq!(wb.sheet_count(), 2);
        assert_eq!(wb.head(), "r1");
    }

    #[test]
    fn test_failed_revision_is_atomic() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let cmds = [create("a", 0), Command::DeleteSheet { sheet_id: SheetId::new("nope") }];
        let err = wb
            .apply_revision(RevisionIndex(0), "START_REVISION", "r1", RevisionChange::Commands(&cmds))
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownSheet(SheetId::new("nope")));
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.head(), "START_REVISION");
        assert_eq!(wb.journal_len(), 0);
    }

    #[test]
    fn test_undo_redo_rebuilds() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let cmds = [create("a", 0)];
        apply(&mut wb, 0, "START_REVISION", "r1", RevisionChange::Commands(&cmds));
        assert_eq!(wb.sheet_count(), 2);

        apply(&mut wb, 1, "r1", "r2", RevisionChange::Undo(RevisionIndex(0)));
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.is_undone(RevisionIndex(0)), Some(true));

        apply(&mut wb, 2, "r2", "r3", RevisionChange::Redo(RevisionIndex(0)));
        assert_eq!(wb.sheet_count(), 2);
        assert_eq!(wb.head(), "r3");
    }

    #[test]
    fn test_undo_drops_dependent_commands() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let a = SheetId::new("a");
        let cmds = [create("a", 0)];
        apply(&mut wb, 0, "START_REVISION", "r1", RevisionChange::Commands(&cmds));
        let cmds = [Command::UpdateCell { sheet_id: a.clone(), col: 0, row: 0, content: "x".into() }];
        apply(&mut wb, 1, "r1", "r2", RevisionChange::Commands(&cmds));
        let cmds = [Command::UpdateCell {
            sheet_id: SheetId::new(DEFAULT_SHEET_ID),
            col: 1,
            row: 1,
            content: "kept".into(),
        }];
        apply(&mut wb, 2, "r2", "r3", RevisionChange::Commands(&cmds));

        // Undoing the sheet creation drops the edit made in that sheet
        apply(&mut wb, 3, "r3", "r4", RevisionChange::Undo(RevisionIndex(0)));
        assert_eq!(wb.head(), "r4");
        assert!(!wb.has_sheet(&a));
        assert_eq!(
            wb.cell_content(&SheetId::new(DEFAULT_SHEET_ID), CellPosition::new(1, 1)),
            Some("kept")
        );

        apply(&mut wb, 4, "r4", "r5", RevisionChange::Redo(RevisionIndex(0)));
        assert_eq!(wb.cell_content(&a, CellPosition::new(0, 0)), Some("x"));
    }

    #[test]
    fn test_undo_conflicting_name_is_dropped() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let cmds = [create("a", 0)];
        apply(&mut wb, 0, "START_REVISION", "r1", RevisionChange::Commands(&cmds));
        let cmds = [Command::DeleteSheet { sheet_id: SheetId::new("a") }];
        apply(&mut wb, 1, "r1", "r2", RevisionChange::Commands(&cmds));
        let cmds = [create("b", 0), Command::RenameSheet { sheet_id: SheetId::new("b"), name: "sheet a".into() }];
        apply(&mut wb, 2, "r2", "r3", RevisionChange::Commands(&cmds));

        // "sheet a" comes back with the undo; the later rename to it is dropped
        apply(&mut wb, 3, "r3", "r4", RevisionChange::Undo(RevisionIndex(1)));
        assert_eq!(wb.sheet_names(), vec!["sheet b", "sheet a", "Sheet1"]);
    }

    #[test]
    fn test_cells_outside_the_grid_are_rejected() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let cmds = [Command::UpdateCell {
            sheet_id: SheetId::new(DEFAULT_SHEET_ID),
            col: 0,
            row: u32::MAX,
            content: "x".into(),
        }];
        let err = wb
            .apply_revision(RevisionIndex(0), "START_REVISION", "r1", RevisionChange::Commands(&cmds))
            .unwrap_err();
        assert_eq!(err, CommandError::OutOfGrid { col: 0, row: u32::MAX });
        assert_eq!(wb.head(), "START_REVISION");

        let bad = json!({ "sheets": [{ "id": "s", "name": "S", "cells": { "A1048577": { "content": "x" } } }] });
        assert!(matches!(Workbook::from_value(&bad, Mode::ReadOnly), Err(CommandError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_undo_of_unknown_revision_fails() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        let err = wb
            .apply_revision(RevisionIndex(1), "START_REVISION", "r1", RevisionChange::Undo(RevisionIndex(0)))
            .unwrap_err();
        assert_eq!(err, CommandError::UnknownRevision(RevisionIndex(0)));
        assert_eq!(wb.head(), "START_REVISION");
    }

    #[test]
    fn test_create_sheet_position() {
        let mut wb = Workbook::from_value(&json!({}), Mode::Normal).unwrap();
        wb.dispatch(create("a", 0)).unwrap();
        wb.dispatch(create("b", 99)).unwrap();
        let ids: Vec<_> = wb.sheet_ids().iter().map(|s| s.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a", "Sheet1", "b"]);
    }

    #[test]
    fn test_sheet_rules() {
        let mut wb = Workbook::from_value(&json!({}), Mode::Normal).unwrap();
        assert_eq!(
            wb.dispatch(Command::DeleteSheet { sheet_id: SheetId::new("Sheet1") }),
            Err(CommandError::LastSheet)
        );
        let dup = Command::CreateSheet { sheet_id: SheetId::new("x"), name: "SHEET1".into(), position: 0 };
        assert_eq!(wb.dispatch(dup), Err(CommandError::DuplicateSheetName("SHEET1".into())));
    }

    #[test]
    fn test_scroll_needs_viewport() {
        let mut wb = Workbook::from_value(&json!({}), Mode::ReadOnly).unwrap();
        assert_eq!(wb.set_scroll_offset(ScrollOffset::new(30, 30)), ScrollOffset::ZERO);

        wb.set_viewport_size(ViewportSize::new(800, 600));
        assert_eq!(wb.set_scroll_offset(ScrollOffset::new(30, 30)), ScrollOffset::new(30, 30));
        let max = wb.max_scroll_offset();
        assert_eq!(wb.set_scroll_offset(ScrollOffset::new(u32::MAX, u32::MAX)), max);
    }

    #[test]
    fn test_activate_sheet() {
        let mut wb = Workbook::from_value(&json!({}), Mode::Normal).unwrap();
        wb.dispatch(create("a", 1)).unwrap();
        wb.select_cell(CellPosition::new(4, 4));
        wb.activate_sheet(&SheetId::new("a")).unwrap();
        assert_eq!(wb.active_position(), ActivePosition { sheet_id: SheetId::new("a"), col: 0, row: 0 });
        assert_eq!(
            wb.activate_sheet(&SheetId::new("missing")),
            Err(CommandError::UnknownSheet(SheetId::new("missing")))
        );
    }

    #[test]
    fn test_active_sheet_survives_deletion_of_itself() {
        let mut wb = Workbook::from_value(&json!({}), Mode::Normal).unwrap();
        wb.dispatch(create("a", 1)).unwrap();
        wb.activate_sheet(&SheetId::new("a")).unwrap();
        wb.dispatch(Command::DeleteSheet { sheet_id: SheetId::new("a") }).unwrap();
        assert_eq!(wb.active_sheet_id(), &SheetId::new("Sheet1"));
    }

    fn list_workbook() -> Workbook {
        Workbook::from_value(
            &json!({
                "sheets": [{ "id": "sh1", "name": "Sheet 1", "cells": { "A1": { "content": "=LIST(1,1,\"name\")" } } }],
                "lists": { "1": { "id": "1", "model": "partner", "columns": ["name"], "domain": [["name", "=", "a"]] } }
            }),
            Mode::Normal,
        )
        .unwrap()
    }

    #[test]
    fn test_list_rows_feed_cells() {
        let mut wb = list_workbook();
        let sh1 = SheetId::new("sh1");
        let list = ListId::new("1");
        assert_eq!(wb.cell_value(&sh1, CellPosition::new(0, 0)), CellValue::Loading);
        assert_eq!(wb.cells_depending_on(&list), vec![CellRef::new(sh1.clone(), CellPosition::new(0, 0))]);

        let first = wb.evaluate_cells();
        assert_eq!(first.evaluated, 1);
        assert_eq!(first.changed.len(), 1);

        let row = json!({ "name": "a" }).as_object().cloned().unwrap();
        wb.set_list_state(&list, LoadState::Ready(vec![row])).unwrap();
        let second = wb.evaluate_cells();
        assert_eq!(second.changed, vec![CellRef::new(sh1.clone(), CellPosition::new(0, 0))]);
        assert_eq!(wb.cell_value(&sh1, CellPosition::new(0, 0)), CellValue::Text("a".into()));

        assert!(wb.evaluate_cells().changed.is_empty());
    }

    #[test]
    fn test_domain_change_drops_loaded_rows() {
        let mut wb = list_workbook();
        let list = ListId::new("1");
        wb.set_list_state(&list, LoadState::Ready(Vec::new())).unwrap();
        wb.dispatch(Command::UpdateListDomain { list_id: list.clone(), domain: json!([]) }).unwrap();
        assert_eq!(wb.list_state(&list), Some(&LoadState::Loading));
        assert_eq!(
            wb.set_list_state(&ListId::new("2"), LoadState::Loading),
            Err(CommandError::UnknownList(ListId::new("2")))
        );
    }

    #[test]
    fn test_export_reloads_to_same_content() {
        let mut wb = list_workbook();
        wb.dispatch(create("a", 0)).unwrap();
        wb.dispatch(Command::UpdateCell {
            sheet_id: SheetId::new("a"),
            col: 2,
            row: 9,
            content: "12".into(),
        })
        .unwrap();

        let exported = wb.export();
        assert_eq!(exported.head(), "START_REVISION");
        let reloaded = Workbook::from_snapshot(exported.clone(), Mode::Normal).unwrap();
        assert_eq!(reloaded.export(), exported);
        assert_eq!(reloaded.cell_content(&SheetId::new("a"), CellPosition::new(2, 9)), Some("12"));
    }
}
