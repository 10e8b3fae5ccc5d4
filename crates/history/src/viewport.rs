//! Viewport/selection preservation across navigation.
//!
//! A freshly materialized document has no viewport size until the host lays
//! it out, and scroll offsets clamp to zero before that. Restoration is
//! therefore queued with [`FrameScheduler::run_after_next_render`] and runs
//! when the host reports a completed frame.

use revgrid_core::{CellPosition, ScrollOffset};
use revgrid_engine::{SheetId, Workbook};
use serde::Serialize;

/// Where the user was: active sheet, selected cell, scroll offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewportSnapshot {
    pub sheet_id: SheetId,
    pub selection: CellPosition,
    pub scroll: ScrollOffset,
}

impl ViewportSnapshot {
    pub fn capture(document: &Workbook) -> Self {
        Self {
            sheet_id: document.active_sheet_id().clone(),
            selection: document.selection(),
            scroll: document.scroll_offset(),
        }
    }

    /// Re-apply on `document`. Nothing happens when the sheet no longer
    /// exists. Returns whether the snapshot was applied.
    pub fn restore(&self, document: &mut Workbook) -> bool {
        if document.activate_sheet(&self.sheet_id).is_err() {
            log::debug!("sheet {} gone, viewport not restored", self.sheet_id);
            return false;
        }
        document.select_cell(self.selection);
        let applied = document.set_scroll_offset(self.scroll);
        if applied != self.scroll {
            log::debug!("scroll clamped from {:?} to {:?}", self.scroll, applied);
        }
        true
    }
}

pub type FrameTask<C> = Box<dyn FnOnce(&mut C)>;

/// Tasks deferred until the next rendered frame.
pub struct FrameScheduler<C> {
    tasks: Vec<FrameTask<C>>,
    frames: u64,
}

impl<C> FrameScheduler<C> {
    pub fn new() -> Self {
        Self { tasks: Vec::new(), frames: 0 }
    }

    pub fn run_after_next_render(&mut self, task: impl FnOnce(&mut C) + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// The host finished a frame: run queued tasks in submission order.
    /// Returns the number of tasks run.
    pub fn frame_rendered(&mut self, context: &mut C) -> usize {
        self.frames += 1;
        let tasks = std::mem::take(&mut self.tasks);
        let count = tasks.len();
        for task in tasks {
            task(context);
        }
        count
    }

    /// Drop queued tasks without running them.
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<C> Default for FrameScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for FrameScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.tasks.len())
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revgrid_core::ViewportSize;
    use revgrid_engine::Mode;
    use serde_json::json;

    fn document() -> Workbook {
        Workbook::from_value(
            &json!({ "sheets": [{ "id": "s1", "name": "One" }, { "id": "s2", "name": "Two" }] }),
            Mode::ReadOnly,
        )
        .unwrap()
    }

    #[test]
    fn test_capture_restore_after_layout() {
        let mut doc = document();
        doc.set_viewport_size(ViewportSize::new(800, 600));
        doc.activate_sheet(&SheetId::new("s2")).unwrap();
        doc.select_cell(CellPosition::new(5, 5));
        doc.set_scroll_offset(ScrollOffset::new(30, 30));
        let saved = ViewportSnapshot::capture(&doc);

        let mut fresh = document();
        let mut scheduler = FrameScheduler::new();
        let task = saved.clone();
        scheduler.run_after_next_render(move |doc: &mut Workbook| {
            task.restore(doc);
        });
        assert_eq!(scheduler.pending(), 1);

        fresh.set_viewport_size(ViewportSize::new(800, 600));
        assert_eq!(scheduler.frame_rendered(&mut fresh), 1);
        assert_eq!(ViewportSnapshot::capture(&fresh), saved);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_restore_before_layout_clamps_scroll() {
        let saved = ViewportSnapshot {
            sheet_id: SheetId::new("s1"),
            selection: CellPosition::new(1, 1),
            scroll: ScrollOffset::new(30, 30),
        };
        let mut doc = document();
        assert!(saved.restore(&mut doc));
        assert_eq!(doc.scroll_offset(), ScrollOffset::ZERO);
    }

    #[test]
    fn test_missing_sheet_is_silent() {
        let saved = ViewportSnapshot {
            sheet_id: SheetId::new("gone"),
            selection: CellPosition::new(3, 3),
            scroll: ScrollOffset::ZERO,
        };
        let mut doc = document();
        assert!(!saved.restore(&mut doc));
        assert_eq!(doc.active_sheet_id(), &SheetId::new("s1"));
        assert_eq!(doc.selection(), CellPosition::default());
    }

    #[test]
    fn test_cancel_pending() {
        let mut scheduler: FrameScheduler<Vec<u32>> = FrameScheduler::new();
        scheduler.run_after_next_render(|v| v.push(1));
        scheduler.run_after_next_render(|v| v.push(2));
        let mut out = Vec::new();
        assert_eq!(scheduler.frame_rendered(&mut out), 2);
        assert_eq!(out, vec![1, 2]);

        scheduler.run_after_next_render(|v| v.push(3));
        assert_eq!(scheduler.cancel_pending(), 1);
        assert_eq!(scheduler.frame_rendered(&mut out), 0);
        assert_eq!(scheduler.frames(), 2);
    }
}
