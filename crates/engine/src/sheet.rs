use revgrid_core::{CellPosition, ScrollOffset};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;

pub const DEFAULT_ROWS: u32 = 100;
pub const DEFAULT_COLS: u32 = 26;
pub const DEFAULT_COL_WIDTH: u32 = 96;
pub const DEFAULT_ROW_HEIGHT: u32 = 23;

/// Stable identifier of a sheet. Assigned by whoever created the sheet
/// (usually a UUID carried in a `CREATE_SHEET` command) and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(String);

impl SheetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a sheet name for case-insensitive comparison.
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Sheet names must be non-empty and free of the characters spreadsheet
/// references reserve.
pub fn is_valid_sheet_name(name: &str) -> bool {
    const FORBIDDEN: &[char] = &['\'', '*', '?', '/', '\\', '[', ']'];
    !name.trim().is_empty() && !name.contains(FORBIDDEN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    id: SheetId,
    pub name: String,
    /// Lowercased name for uniqueness checks
    pub(crate) name_key: String,
    cells: FxHashMap<CellPosition, Cell>,
    pub rows: u32,
    pub cols: u32,
}

impl Sheet {
    pub fn new(id: SheetId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            name_key: normalize_sheet_name(name),
            cells: FxHashMap::default(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }

    pub fn id(&self) -> &SheetId {
        &self.id
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.name_key = normalize_sheet_name(name);
    }

    pub fn cell(&self, position: CellPosition) -> Option<&Cell> {
        self.cells.get(&position)
    }

    /// Set raw content. Empty content removes the cell.
    /// The grid grows to contain the position.
    pub fn set_content(&mut self, position: CellPosition, content: &str) {
        if content.is_empty() {
            self.cells.remove(&position);
            return;
        }
        self.rows = self.rows.max(position.row.saturating_add(1));
        self.cols = self.cols.max(position.col.saturating_add(1));
        self.cells.insert(position, Cell::new(content));
    }

    pub fn clear(&mut self, position: CellPosition) -> bool {
        self.cells.remove(&position).is_some()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// All non-empty cells in row-major order.
    pub fn cells(&self) -> Vec<(CellPosition, &Cell)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(p, c)| (*p, c)).collect();
        cells.sort_by_key(|(p, _)| *p);
        cells
    }

    /// Pixel size of the whole grid.
    pub fn content_extent(&self) -> ScrollOffset {
        ScrollOffset::new(
            self.cols.saturating_mul(DEFAULT_COL_WIDTH),
            self.rows.saturating_mul(DEFAULT_ROW_HEIGHT),
        )
    }
}
