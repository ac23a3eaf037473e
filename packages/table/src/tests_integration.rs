//! Multi-replica scenarios: two documents editing independently and
//! converging over the delta-sync surface.

use crate::columns::ColumnSpec;
use crate::document::TableDocument;
use crate::errors::TableError;
use crate::rows::{RowSpec, SortDirection};

/// Exchange deltas in both directions until neither side is missing
/// anything.
fn sync(a: &mut TableDocument, b: &mut TableDocument) {
    let to_b = a.encode_delta(&b.state_vector()).unwrap();
    let to_a = b.encode_delta(&a.state_vector()).unwrap();
    b.apply_update(&to_b).unwrap();
    a.apply_update(&to_a).unwrap();
}

/// A fresh pair already carrying the given columns on both sides.
fn synced_pair(names: &[&str]) -> (TableDocument, TableDocument) {
    let mut a = TableDocument::new();
    a.insert_columns(0, names.iter().map(|n| ColumnSpec::new(*n)).collect());
    let mut b = TableDocument::new();
    b.apply_update(&a.encode_state()).unwrap();
    (a, b)
}

fn header_names(table: &TableDocument) -> Vec<String> {
    table.headers().into_iter().map(|h| h.name).collect()
}

#[test]
fn test_concurrent_column_inserts_converge() {
    // Both replicas start from ["Name"] and insert a different column at
    // index 1 while offline.
    let (mut a, mut b) = synced_pair(&["Name"]);
    a.insert_columns(1, vec![ColumnSpec::new("Age")]);
    b.insert_columns(1, vec![ColumnSpec::new("City")]);

    sync(&mut a, &mut b);

    let merged = header_names(&a);
    assert_eq!(merged, header_names(&b));
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0], "Name");
    assert!(merged.contains(&"Age".to_string()));
    assert!(merged.contains(&"City".to_string()));
}

#[test]
fn test_concurrent_cell_edits_converge_to_one_winner() {
    let (mut a, mut b) = synced_pair(&["V"]);
    a.insert_rows(0, vec![RowSpec::new()]);
    sync(&mut a, &mut b);

    a.update_cell(0, "V", "from a").unwrap();
    b.update_cell(0, "V", "from b").unwrap();
    sync(&mut a, &mut b);

    let winner = a.cell(0, 0).unwrap();
    assert_eq!(b.cell(0, 0).unwrap(), winner);
    assert!(winner == "from a" || winner == "from b");
}

#[test]
fn test_concurrent_row_insert_and_column_delete() {
    let (mut a, mut b) = synced_pair(&["Keep", "Drop"]);
    let keep = a.headers()[0].id;
    let drop_id = a.headers()[1].id;

    a.insert_rows(
        0,
        vec![RowSpec::new().with_cell(keep, "survives").with_cell(drop_id, "doomed")],
    );
    b.delete_columns(&[1]);
    sync(&mut a, &mut b);

    // The row exists on both sides, the deleted column is gone everywhere.
    assert_eq!(header_names(&a), vec!["Keep"]);
    assert_eq!(header_names(&b), vec!["Keep"]);
    assert_eq!(a.rows().len(), 1);
    assert_eq!(a.rows()[0].cells, vec!["survives".to_string()]);
    assert_eq!(b.rows(), a.rows());
}

#[test]
fn test_order_and_storage_stay_consistent_after_op_soup() {
    let (mut a, mut b) = synced_pair(&["A", "B", "C"]);
    let col_a = a.headers()[0].id;

    a.insert_rows(
        0,
        vec![
            RowSpec::new().with_cell(col_a, "2"),
            RowSpec::new().with_cell(col_a, "1"),
        ],
    );
    a.reorder_column(0, 2);
    b.insert_columns(3, vec![ColumnSpec::new("D")]);
    b.delete_columns(&[1]);
    sync(&mut a, &mut b);

    a.sort_rows_by_column(col_a, SortDirection::Ascending);
    a.delete_rows(&[0]);
    sync(&mut a, &mut b);

    for table in [&a, &b] {
        // Every ordered id has exactly one stored record, and vice versa.
        let mut stored_cols = table.stored_column_ids();
        stored_cols.sort_by_key(|id| id.to_string());
        let mut ordered: Vec<_> = table.headers().into_iter().map(|h| h.id).collect();
        ordered.sort_by_key(|id| id.to_string());
        assert_eq!(ordered, stored_cols);

        let mut stored_rows = table.stored_row_ids();
        stored_rows.sort_by_key(|id| id.to_string());
        let mut order_rows: Vec<_> = table.rows().into_iter().map(|r| r.id).collect();
        order_rows.sort_by_key(|id| id.to_string());
        assert_eq!(order_rows, stored_rows);
    }
    assert_eq!(header_names(&a), header_names(&b));
    assert_eq!(a.rows(), b.rows());
}

#[test]
fn test_undo_replicates_as_ordinary_edit() {
    let (mut a, mut b) = synced_pair(&["Name", "Score"]);
    let score = a.headers()[1].id;
    a.insert_rows(0, vec![RowSpec::new().with_cell(score, "9")]);
    sync(&mut a, &mut b);

    a.delete_columns(&[1]);
    sync(&mut a, &mut b);
    assert_eq!(header_names(&b), vec!["Name"]);

    // The undo restores the column with its original id and cells, and the
    // restore reaches the peer like any other edit.
    assert!(a.undo());
    sync(&mut a, &mut b);
    assert_eq!(header_names(&b), vec!["Name", "Score"]);
    assert_eq!(b.headers()[1].id, score);
    assert_eq!(b.cell(0, 1), Some("9".to_string()));
}

#[test]
fn test_remote_edits_are_not_locally_undoable() {
    let (mut a, mut b) = synced_pair(&[]);
    a.insert_columns(0, vec![ColumnSpec::new("A")]);
    sync(&mut a, &mut b);

    assert_eq!(b.column_count(), 1);
    assert!(!b.can_undo());
    assert!(!b.undo());
    assert_eq!(b.column_count(), 1);
}

#[test]
fn test_lock_replicates_and_blocks_on_the_peer() {
    let (mut a, mut b) = synced_pair(&["V"]);
    a.insert_rows(0, vec![RowSpec::new()]);
    a.lock_cell_range(0, 0, 0, 0, Some("frozen for review".into()));
    sync(&mut a, &mut b);

    assert!(b.is_cell_locked(0, 0));
    let err = b.update_cell(0, "V", "x").unwrap_err();
    assert_eq!(
        err,
        TableError::CellLocked {
            row: 0,
            col: 0,
            note: Some("frozen for review".into()),
        }
    );
}

#[test]
fn test_sort_replicates_as_plain_reorder() {
    let (mut a, mut b) = synced_pair(&["N"]);
    let col = a.headers()[0].id;
    a.insert_rows(
        0,
        vec![
            RowSpec::new().with_cell(col, "3"),
            RowSpec::new().with_cell(col, "1"),
            RowSpec::new().with_cell(col, "2"),
        ],
    );
    sync(&mut a, &mut b);

    a.sort_rows_by_column(col, SortDirection::Ascending);
    sync(&mut a, &mut b);

    let values: Vec<String> = b.rows().into_iter().map(|r| r.cells[0].clone()).collect();
    assert_eq!(values, vec!["1", "2", "3"]);
    assert_eq!(a.rows(), b.rows());
}

#[test]
fn test_three_way_convergence() {
    let mut a = TableDocument::new();
    a.insert_columns(0, vec![ColumnSpec::new("X")]);
    let mut b = TableDocument::new();
    let mut c = TableDocument::new();
    b.apply_update(&a.encode_state()).unwrap();
    c.apply_update(&a.encode_state()).unwrap();

    a.insert_columns(1, vec![ColumnSpec::new("FromA")]);
    b.insert_columns(1, vec![ColumnSpec::new("FromB")]);
    c.insert_columns(1, vec![ColumnSpec::new("FromC")]);

    // Gossip pairwise until everyone has everything.
    sync(&mut a, &mut b);
    sync(&mut b, &mut c);
    sync(&mut a, &mut c);
    sync(&mut a, &mut b);

    assert_eq!(header_names(&a), header_names(&b));
    assert_eq!(header_names(&b), header_names(&c));
    assert_eq!(a.column_count(), 4);
}
