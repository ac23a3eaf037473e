//! # Undo / Redo
//!
//! Replica-local history of committed operations. Each commit records the
//! forward edit list and its precomputed inverse; undo applies the inverse
//! and moves the batch to the redo stack, redo reapplies the forward list.
//!
//! Remote operations never enter the history: undo only ever reverses what
//! this replica did, and an undo replicates to peers as an ordinary edit.
//! Restores are exact: a re-created column or row keeps its original id,
//! position and cell contents, so references held elsewhere stay valid.

use crate::document::TableDocument;
use crate::edits::Edit;

const MAX_UNDO_LEVELS: usize = 100;

/// One committed operation, both directions.
#[derive(Debug, Clone)]
pub(crate) struct EditBatch {
    pub forward: Vec<Edit>,
    pub inverse: Vec<Edit>,
    #[allow(dead_code)]
    pub label: &'static str,
}

#[derive(Debug, Default)]
pub(crate) struct UndoStack {
    undo: Vec<EditBatch>,
    redo: Vec<EditBatch>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh commit. Any redo branch is abandoned.
    pub fn push(&mut self, label: &'static str, forward: Vec<Edit>, inverse: Vec<Edit>) {
        self.redo.clear();
        if self.undo.len() == MAX_UNDO_LEVELS {
            self.undo.remove(0);
        }
        self.undo.push(EditBatch {
            forward,
            inverse,
            label,
        });
    }

    pub fn pop_undo(&mut self) -> Option<EditBatch> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<EditBatch> {
        self.redo.pop()
    }

    pub fn stash_redo(&mut self, batch: EditBatch) {
        self.redo.push(batch);
    }

    pub fn stash_undo(&mut self, batch: EditBatch) {
        self.undo.push(batch);
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

impl TableDocument {
    /// Reverse the most recent local operation. Returns `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(batch) = self.undo_stack.pop_undo() else {
            return false;
        };
        self.apply_edits(&batch.inverse);
        self.undo_stack.stash_redo(batch);
        self.version += 1;
        self.refresh_observers();
        true
    }

    /// Reapply the most recently undone operation. Returns `false` when the
    /// redo stack is empty.
    pub fn redo(&mut self) -> bool {
        let Some(batch) = self.undo_stack.pop_redo() else {
            return false;
        };
        self.apply_edits(&batch.forward);
        self.undo_stack.stash_undo(batch);
        self.version += 1;
        self.refresh_observers();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.undo_depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.redo_depth() > 0
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.undo_stack.redo_depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnSpec;
    use crate::rows::RowSpec;

    #[test]
    fn test_undo_restores_deleted_column_exactly() {
        let mut table = TableDocument::new();
        let cols = table.insert_columns(
            0,
            vec![ColumnSpec::new("Name"), ColumnSpec::new("Score")],
        );
        table.insert_rows(
            0,
            vec![RowSpec::new()
                .with_cell(cols[0], "Ann")
                .with_cell(cols[1], "7")],
        );

        table.delete_columns(&[1]);
        assert_eq!(table.headers().len(), 1);

        assert!(table.undo());
        let headers = table.headers();
        assert_eq!(headers.len(), 2);
        // Same id, same position, same cells.
        assert_eq!(headers[1].id, cols[1]);
        assert_eq!(table.cell(0, 1), Some("7".to_string()));
    }

    #[test]
    fn test_undo_restores_deleted_rows() {
        let mut table = TableDocument::new();
        let col = table.insert_columns(0, vec![ColumnSpec::new("A")])[0];
        let rows = table.insert_rows(
            0,
            vec![
                RowSpec::new().with_cell(col, "one"),
                RowSpec::new().with_cell(col, "two"),
            ],
        );

        table.delete_rows(&[0]);
        assert!(table.undo());

        let restored = table.rows();
        assert_eq!(restored[0].id, rows[0]);
        assert_eq!(restored[0].cells, vec!["one".to_string()]);
        assert_eq!(restored[1].id, rows[1]);
    }

    #[test]
    fn test_undo_redo_cell_edit() {
        let mut table = TableDocument::new();
        let col = table.insert_columns(0, vec![ColumnSpec::new("A")])[0];
        table.insert_rows(0, vec![RowSpec::new().with_cell(col, "old")]);

        table.update_cell(0, col, "new").unwrap();
        assert!(table.undo());
        assert_eq!(table.cell(0, 0), Some("old".to_string()));
        assert!(table.redo());
        assert_eq!(table.cell(0, 0), Some("new".to_string()));
    }

    #[test]
    fn test_new_commit_clears_redo() {
        let mut table = TableDocument::new();
        table.insert_columns(0, vec![ColumnSpec::new("A")]);
        table.insert_columns(1, vec![ColumnSpec::new("B")]);

        assert!(table.undo());
        assert!(table.can_redo());

        table.insert_columns(1, vec![ColumnSpec::new("C")]);
        assert!(!table.can_redo());
        assert!(!table.redo());
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut table = TableDocument::new();
        assert!(!table.can_undo());
        assert!(!table.undo());
        assert!(!table.redo());
    }

    #[test]
    fn test_history_is_capped() {
        let mut table = TableDocument::new();
        let col = table.insert_columns(0, vec![ColumnSpec::new("A")])[0];
        table.insert_rows(0, vec![RowSpec::new()]);

        for i in 0..150 {
            table.update_cell(0, col, format!("v{i}")).unwrap();
        }
        assert_eq!(table.undo_depth(), 100);

        while table.undo() {}
        // The oldest 52 commits (2 structural + 48 edits) fell off the end.
        assert_eq!(table.cell(0, 0), Some("v49".to_string()));
    }

    #[test]
    fn test_structural_undo_chain() {
        let mut table = TableDocument::new();
        let col = table.insert_columns(0, vec![ColumnSpec::new("A")])[0];
        table.insert_rows(0, vec![RowSpec::new().with_cell(col, "x")]);
        // A no-op reorder commits nothing and stays out of the history.
        table.reorder_column(0, 0);
        table.edit_header(0, "Renamed");

        assert!(table.undo()); // rename
        assert_eq!(table.headers()[0].name, "A");
        assert!(table.undo()); // insert rows
        assert_eq!(table.row_count(), 0);
        assert!(table.undo()); // insert columns
        assert_eq!(table.column_count(), 0);
        assert!(!table.can_undo());

        assert!(table.redo());
        assert!(table.redo());
        assert!(table.redo());
        assert_eq!(table.headers()[0].name, "Renamed");
        assert_eq!(table.cell(0, 0), Some("x".to_string()));
    }

    #[test]
    fn test_lock_undo() {
        let mut table = TableDocument::new();
        table.insert_columns(0, vec![ColumnSpec::new("A")]);
        table.insert_rows(0, vec![RowSpec::new()]);
        table.lock_cell_range(0, 0, 0, 0, Some("hold".into())).unwrap();

        assert!(table.is_cell_locked(0, 0));
        assert!(table.undo());
        assert!(!table.is_cell_locked(0, 0));
        assert!(table.redo());
        assert_eq!(table.lock_note_for_cell(0, 0), Some("hold".into()));
    }
}
