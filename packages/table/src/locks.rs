//! # Range Locks
//!
//! Rectangular cell-range locks that block [`update_cell`] within their
//! bounds. Locks live in a replicated sequence in creation order, so "which
//! lock's note explains the rejection" resolves identically on every
//! replica: the first covering range wins.
//!
//! Bounds are display coordinates captured at creation time. They do not
//! follow rows or columns through later structural edits; a reorder can move
//! different cells under a standing lock. Inclusive on both ends.
//!
//! [`update_cell`]: TableDocument::update_cell

use serde::{Deserialize, Serialize};

use crate::document::TableDocument;
use crate::edits::{Edit, LockSeed};
use crate::ids::LockId;

/// One active lock: an inclusive rectangle plus an optional note shown to
/// users whose edits it rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRange {
    pub id: LockId,
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
    pub note: Option<String>,
}

impl LockRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.row_start && row <= self.row_end && col >= self.col_start && col <= self.col_end
    }
}

impl TableDocument {
    /// Register a lock over an inclusive cell rectangle.
    ///
    /// Bounds are normalized so start ≤ end on both axes. Any negative
    /// coordinate makes the selection empty and nothing is registered.
    /// Returns the minted id otherwise.
    pub fn lock_cell_range(
        &mut self,
        row_start: i64,
        row_end: i64,
        col_start: i64,
        col_end: i64,
        note: Option<String>,
    ) -> Option<LockId> {
        if row_start < 0 || row_end < 0 || col_start < 0 || col_end < 0 {
            return None;
        }
        let (row_start, row_end) = (row_start.min(row_end) as usize, row_start.max(row_end) as usize);
        let (col_start, col_end) = (col_start.min(col_end) as usize, col_start.max(col_end) as usize);

        let range = LockRange {
            id: LockId::new(),
            row_start,
            row_end,
            col_start,
            col_end,
            note,
        };
        let id = range.id;
        let at = self.locks().len() as u32;
        self.commit(
            "lock range",
            vec![Edit::AddLocks {
                locks: vec![LockSeed { at, range }],
            }],
            vec![Edit::RemoveLocks { ids: vec![id] }],
        );
        Some(id)
    }

    /// Remove one lock by id. Returns `false` if it is not active.
    pub fn unlock_range(&mut self, id: LockId) -> bool {
        // Capture the registry position so an undo restores the lock's
        // precedence, not just its bounds.
        let Some(seed) = self
            .locks()
            .into_iter()
            .enumerate()
            .find(|(_, range)| range.id == id)
            .map(|(at, range)| LockSeed { at: at as u32, range })
        else {
            return false;
        };
        self.commit(
            "unlock range",
            vec![Edit::RemoveLocks { ids: vec![id] }],
            vec![Edit::AddLocks { locks: vec![seed] }],
        );
        true
    }

    /// Remove every active lock as one undoable step. Returns the count.
    pub fn unlock_all(&mut self) -> usize {
        let ranges = self.locks();
        if ranges.is_empty() {
            return 0;
        }
        let ids = ranges.iter().map(|range| range.id).collect();
        let removed = ranges.len();
        let seeds = ranges
            .into_iter()
            .enumerate()
            .map(|(at, range)| LockSeed { at: at as u32, range })
            .collect();
        self.commit(
            "unlock all",
            vec![Edit::RemoveLocks { ids }],
            vec![Edit::AddLocks { locks: seeds }],
        );
        removed
    }

    /// Whether any active lock covers the display coordinate.
    pub fn is_cell_locked(&self, row: usize, col: usize) -> bool {
        self.locks().iter().any(|range| range.contains(row, col))
    }

    /// Note of the first (oldest) lock covering the coordinate, if that lock
    /// carries one.
    pub fn lock_note_for_cell(&self, row: usize, col: usize) -> Option<String> {
        self.locks()
            .into_iter()
            .find(|range| range.contains(row, col))
            .and_then(|range| range.note)
    }
}
