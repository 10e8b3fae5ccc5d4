//! Cell identity across sheets.
//!
//! A `CellRef` uniquely identifies a cell across all sheets in a workbook.

use revgrid_core::CellPosition;

use crate::sheet::SheetId;

/// Unique identifier for a cell in a workbook.
///
/// Combines sheet identity with the cell coordinates. Used to report which
/// cells changed after a re-evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// The sheet this cell belongs to
    pub sheet: SheetId,
    pub position: CellPosition,
}

impl CellRef {
    #[inline]
    pub fn new(sheet: SheetId, position: CellPosition) -> Self {
        Self { sheet, position }
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.sheet, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_ref_equality() {
        let a = CellRef::new(SheetId::new("sh1"), CellPosition::new(0, 0));
        let b = CellRef::new(SheetId::new("sh1"), CellPosition::new(0, 0));
        let c = CellRef::new(SheetId::new("sh2"), CellPosition::new(0, 0));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cell_ref_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(CellRef::new(SheetId::new("sh1"), CellPosition::new(0, 0)));
        set.insert(CellRef::new(SheetId::new("sh1"), CellPosition::new(0, 0))); // duplicate
        set.insert(CellRef::new(SheetId::new("sh1"), CellPosition::new(0, 1)));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        let cell = CellRef::new(SheetId::new("sh1"), CellPosition::new(1, 4));
        assert_eq!(cell.to_string(), "sh1!B5");
    }
}
