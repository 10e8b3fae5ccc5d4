//! Core types shared by the revgrid crates.

pub mod selection;

pub use selection::{CellPosition, ScrollOffset, ViewportSize, MAX_COLS, MAX_ROWS};
