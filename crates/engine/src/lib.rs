pub mod cell;
pub mod cell_id;
pub mod command;
pub mod data_source;
pub mod journal;
pub mod sheet;
pub mod snapshot;
pub mod workbook;

pub use cell::{Cell, CellValue};
pub use cell_id::CellRef;
pub use command::{Command, CommandError};
pub use data_source::{ListDefinition, ListId, ListQuery, LoadState, Row};
pub use journal::RevisionIndex;
pub use sheet::{Sheet, SheetId};
pub use snapshot::{Snapshot, START_REVISION};
pub use workbook::{
    ActivePosition, EvaluationReport, Mode, RevisionApplied, RevisionChange, Workbook,
};
