//! # Row Operations
//!
//! Insertion, deletion, cell editing and column-keyed sorting. Rows are
//! addressed by display index at the call boundary and resolved to stable
//! [`RowId`]s before anything is written, so concurrent reorders shift rows
//! rather than corrupt them.
//!
//! Sorting is a local reorder of `rowOrder` only: cell data never moves, and
//! applying the same sort twice commits nothing the second time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use yrs::{Map, Transact};

use crate::columns::{ColumnRef, DataType};
use crate::document::TableDocument;
use crate::edits::{Edit, RowSeed};
use crate::errors::TableError;
use crate::ids::{ColumnId, RowId};
use crate::value::{as_map, as_str};

/// Seed data for one new row: cell text keyed by column id. Columns not
/// mentioned stay empty.
#[derive(Debug, Clone, Default)]
pub struct RowSpec {
    pub cells: HashMap<ColumnId, String>,
}

impl RowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, column: ColumnId, value: impl Into<String>) -> Self {
        self.cells.insert(column, value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Per-cell comparison key. Cells that fail to parse under the column's
/// declared type sort after every parseable cell, in both directions.
///
/// Empty cells take the same path for every type, text included: a blank
/// row belongs at the bottom of a sorted table, not ahead of "Aaron"
/// because `""` collates first.
enum SortKey {
    Number(f64),
    Time(i64),
    Bool(bool),
    Position(usize),
    Text(String),
    Unsortable,
}

impl SortKey {
    fn for_cell(value: &str, data_type: Option<DataType>, enum_values: &[String]) -> Self {
        if value.is_empty() {
            return SortKey::Unsortable;
        }
        match data_type {
            Some(DataType::Integer) | Some(DataType::Decimal) => value
                .trim()
                .parse::<f64>()
                .map(SortKey::Number)
                .unwrap_or(SortKey::Unsortable),
            Some(DataType::Datetime) => parse_datetime_millis(value)
                .map(SortKey::Time)
                .unwrap_or(SortKey::Unsortable),
            Some(DataType::Boolean) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => SortKey::Bool(true),
                "false" => SortKey::Bool(false),
                _ => SortKey::Unsortable,
            },
            Some(DataType::Enum) => enum_values
                .iter()
                .position(|candidate| candidate == value)
                .map(SortKey::Position)
                .unwrap_or(SortKey::Unsortable),
            _ => SortKey::Text(fold_for_sort(value)),
        }
    }

    fn compare(&self, other: &Self, direction: SortDirection) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        use SortKey::*;

        let forward = match (self, other) {
            // Unsortable cells stay at the bottom in both directions.
            (Unsortable, Unsortable) => return Ordering::Equal,
            (Unsortable, _) => return Ordering::Greater,
            (_, Unsortable) => return Ordering::Less,
            (Number(a), Number(b)) => a.total_cmp(b),
            (Time(a), Time(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Position(a), Position(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            // Mixed variants cannot arise within one column.
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Ascending => forward,
            SortDirection::Descending => forward.reverse(),
        }
    }
}

/// Accepted datetime shapes, tried in order: RFC 3339, then
/// `YYYY-MM-DD HH:MM:SS`, then a bare `YYYY-MM-DD`.
fn parse_datetime_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}

/// Case-insensitive, compatibility-normalized collation key.
fn fold_for_sort(value: &str) -> String {
    value.nfkc().collect::<String>().to_lowercase()
}

impl TableDocument {
    /// Insert rows at a display index (clamped to the current row count).
    /// Cells referencing unknown columns are dropped with a logged anomaly.
    /// Returns the minted ids in insertion order.
    pub fn insert_rows(&mut self, index: usize, specs: Vec<RowSpec>) -> Vec<RowId> {
        if specs.is_empty() {
            return Vec::new();
        }

        let seeds: Vec<RowSeed> = {
            let txn = self.doc.transact();
            let known: HashSet<ColumnId> = self.column_ids(&txn).into_iter().collect();
            let at = index.min(self.row_ids(&txn).len()) as u32;
            specs
                .into_iter()
                .enumerate()
                .map(|(i, spec)| RowSeed {
                    at: at + i as u32,
                    id: RowId::new(),
                    cells: spec
                        .cells
                        .into_iter()
                        .filter(|(col, _)| {
                            if known.contains(col) {
                                true
                            } else {
                                tracing::warn!(column = %col, "row cell references unknown column, dropping");
                                false
                            }
                        })
                        .collect(),
                })
                .collect()
        };

        let ids: Vec<RowId> = seeds.iter().map(|seed| seed.id).collect();
        self.commit(
            "insert rows",
            vec![Edit::InsertRows { rows: seeds }],
            vec![Edit::RemoveRows { ids: ids.clone() }],
        );
        ids
    }

    /// Delete rows by display index. Out-of-range and duplicate indices are
    /// ignored. Returns how many rows were removed.
    pub fn delete_rows(&mut self, indices: &[usize]) -> usize {
        let seeds: Vec<RowSeed> = {
            let txn = self.doc.transact();
            let order = self.row_ids(&txn);
            let mut targets: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| i < order.len())
                .collect();
            targets.sort_unstable();
            targets.dedup();
            targets
                .into_iter()
                .map(|at| {
                    let id = order[at];
                    let cells = self
                        .row_data
                        .get(&txn, &id.to_string())
                        .and_then(as_map)
                        .map(|record| {
                            record
                                .iter(&txn)
                                .filter_map(|(key, value)| {
                                    Some((key.parse().ok()?, as_str(&value)?))
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    RowSeed { at: at as u32, id, cells }
                })
                .collect()
        };

        if seeds.is_empty() {
            return 0;
        }

        let removed = seeds.len();
        let ids: Vec<RowId> = seeds.iter().map(|seed| seed.id).collect();
        self.commit(
            "delete rows",
            vec![Edit::RemoveRows { ids }],
            // Seeds are index-ascending, so reinserting in order restores the
            // original positions.
            vec![Edit::InsertRows { rows: seeds }],
        );
        removed
    }

    /// Set one cell's text, addressed by row index and column id or header
    /// name. Returns `Ok(false)` when the coordinate does not resolve, and
    /// [`TableError::CellLocked`] when a lock covers the cell.
    ///
    /// Setting a cell to the empty string removes the stored key; the cell
    /// still reads back as `""`.
    pub fn update_cell(
        &mut self,
        row_index: usize,
        column: impl Into<ColumnRef>,
        value: impl Into<String>,
    ) -> Result<bool, TableError> {
        let column = column.into();
        let value = value.into();

        let resolved = {
            let txn = self.doc.transact();
            let row_id = self.row_ids(&txn).get(row_index).copied();
            let col = self.resolve_column(&txn, &column);
            match (row_id, col) {
                (Some(row_id), Some((col_index, col_id))) => {
                    let old = self.cell_value(&txn, &row_id, &col_id);
                    Some((row_id, col_index, col_id, old))
                }
                _ => None,
            }
        };
        let Some((row_id, col_index, col_id, old)) = resolved else {
            return Ok(false);
        };

        if let Some(range) = self
            .locks()
            .into_iter()
            .find(|range| range.contains(row_index, col_index))
        {
            return Err(TableError::CellLocked {
                row: row_index,
                col: col_index,
                note: range.note,
            });
        }

        if old.clone().unwrap_or_default() == value {
            return Ok(true);
        }

        let new = if value.is_empty() { None } else { Some(value) };
        self.commit(
            "update cell",
            vec![Edit::SetCell { row: row_id, col: col_id, value: new }],
            vec![Edit::SetCell { row: row_id, col: col_id, value: old }],
        );
        Ok(true)
    }

    /// Stable sort of the row order by one column, typed by the column's
    /// declared data type. Returns `false` when the column does not exist.
    /// Re-sorting an already sorted table commits nothing.
    pub fn sort_rows_by_column(&mut self, column: ColumnId, direction: SortDirection) -> bool {
        let (old_order, new_order) = {
            let txn = self.doc.transact();
            let Some(def) = self.column_def(&txn, &column) else {
                return false;
            };
            let order = self.row_ids(&txn);

            let mut keyed: Vec<(RowId, SortKey)> = order
                .iter()
                .map(|row| {
                    let cell = self.cell_value(&txn, row, &column).unwrap_or_default();
                    (*row, SortKey::for_cell(&cell, def.data_type, &def.enum_values))
                })
                .collect();
            keyed.sort_by(|(_, a), (_, b)| a.compare(b, direction));

            let sorted: Vec<RowId> = keyed.into_iter().map(|(row, _)| row).collect();
            (order, sorted)
        };

        if new_order != old_order {
            self.commit(
                "sort rows",
                vec![Edit::SetRowOrder { order: new_order }],
                vec![Edit::SetRowOrder { order: old_order }],
            );
        }
        true
    }

    fn resolve_column<T: yrs::ReadTxn>(
        &self,
        txn: &T,
        column: &ColumnRef,
    ) -> Option<(usize, ColumnId)> {
        let order = self.column_ids(txn);
        match column {
            ColumnRef::Id(id) => order
                .iter()
                .position(|candidate| candidate == id)
                .map(|at| (at, *id)),
            ColumnRef::Name(name) => order.iter().enumerate().find_map(|(at, id)| {
                let def = self.column_def(txn, id)?;
                (def.name == *name).then_some((at, *id))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnSpec;

    fn table_with_columns(names: &[&str]) -> (TableDocument, Vec<ColumnId>) {
        let mut table = TableDocument::new();
        let specs = names.iter().map(|n| ColumnSpec::new(*n)).collect();
        let ids = table.insert_columns(0, specs);
        (table, ids)
    }

    fn column_of(table: &mut TableDocument, name: &str, data_type: DataType) -> ColumnId {
        table.insert_columns(0, vec![ColumnSpec::new(name).with_data_type(data_type)])[0]
    }

    fn seed_rows(table: &mut TableDocument, column: ColumnId, values: &[&str]) {
        let specs = values
            .iter()
            .map(|v| RowSpec::new().with_cell(column, *v))
            .collect();
        table.insert_rows(0, specs);
    }

    fn column_values(table: &TableDocument, col: usize) -> Vec<String> {
        table
            .rows()
            .into_iter()
            .map(|row| row.cells[col].clone())
            .collect()
    }

    #[test]
    fn test_insert_rows_mints_ids_in_order() {
        let (mut table, cols) = table_with_columns(&["A"]);
        let ids = table.insert_rows(
            0,
            vec![
                RowSpec::new().with_cell(cols[0], "first"),
                RowSpec::new().with_cell(cols[0], "second"),
            ],
        );
        assert_eq!(ids.len(), 2);
        assert_eq!(column_values(&table, 0), vec!["first", "second"]);
        let rows = table.rows();
        assert_eq!(rows[0].id, ids[0]);
        assert_eq!(rows[1].id, ids[1]);
    }

    #[test]
    fn test_insert_rows_index_is_clamped() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["x"]);
        table.insert_rows(99, vec![RowSpec::new().with_cell(cols[0], "tail")]);
        assert_eq!(column_values(&table, 0), vec!["x", "tail"]);
    }

    #[test]
    fn test_insert_rows_drops_unknown_column_cells() {
        let (mut table, cols) = table_with_columns(&["A"]);
        let stranger = ColumnId::new();
        table.insert_rows(
            0,
            vec![RowSpec::new()
                .with_cell(cols[0], "kept")
                .with_cell(stranger, "dropped")],
        );
        let stored = table.row_cells_by_index(0);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(&cols[0]).map(String::as_str), Some("kept"));
    }

    #[test]
    fn test_empty_insert_commits_nothing() {
        let (mut table, _) = table_with_columns(&["A"]);
        let version = table.version();
        assert!(table.insert_rows(0, Vec::new()).is_empty());
        assert_eq!(table.version(), version);
    }

    #[test]
    fn test_delete_rows_ignores_bad_indices() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["a", "b", "c"]);
        // Duplicate and out-of-range entries collapse to one valid target.
        assert_eq!(table.delete_rows(&[1, 1, 17]), 1);
        assert_eq!(column_values(&table, 0), vec!["a", "c"]);
    }

    #[test]
    fn test_delete_rows_removes_records() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["a", "b"]);
        table.delete_rows(&[0, 1]);
        assert_eq!(table.row_count(), 0);
        assert!(table.stored_row_ids().is_empty());
    }

    #[test]
    fn test_update_cell_by_id_and_name() {
        let (mut table, cols) = table_with_columns(&["Name"]);
        seed_rows(&mut table, cols[0], &[""]);

        assert_eq!(table.update_cell(0, cols[0], "by id"), Ok(true));
        assert_eq!(table.cell(0, 0), Some("by id".to_string()));

        assert_eq!(table.update_cell(0, "Name", "by name"), Ok(true));
        assert_eq!(table.cell(0, 0), Some("by name".to_string()));
    }

    #[test]
    fn test_update_cell_unresolved_coordinate() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["x"]);
        assert_eq!(table.update_cell(5, cols[0], "nope"), Ok(false));
        assert_eq!(table.update_cell(0, "Missing", "nope"), Ok(false));
    }

    #[test]
    fn test_update_cell_unchanged_value_commits_nothing() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["same"]);
        let version = table.version();
        assert_eq!(table.update_cell(0, cols[0], "same"), Ok(true));
        assert_eq!(table.version(), version);
    }

    #[test]
    fn test_update_cell_empty_string_clears_key() {
        let (mut table, cols) = table_with_columns(&["A"]);
        seed_rows(&mut table, cols[0], &["full"]);
        assert_eq!(table.update_cell(0, cols[0], ""), Ok(true));
        // Reads as empty, and the key itself is gone from the record.
        assert_eq!(table.cell(0, 0), Some("".to_string()));
        assert!(table.row_cells_by_index(0).is_empty());
    }

    #[test]
    fn test_sort_text_folds_case_and_width() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "T", DataType::Text);
        seed_rows(&mut table, col, &["banana", "Apple", "ＣＨＥＲＲＹ"]);

        assert!(table.sort_rows_by_column(col, SortDirection::Ascending));
        assert_eq!(column_values(&table, 0), vec!["Apple", "banana", "ＣＨＥＲＲＹ"]);
    }

    #[test]
    fn test_empty_text_cells_sort_last() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "T", DataType::Text);
        seed_rows(&mut table, col, &["", "beta", "alpha"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(column_values(&table, 0), vec!["alpha", "beta", ""]);

        table.sort_rows_by_column(col, SortDirection::Descending);
        assert_eq!(column_values(&table, 0), vec!["beta", "alpha", ""]);
    }

    #[test]
    fn test_sort_numeric_not_lexicographic() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "N", DataType::Integer);
        seed_rows(&mut table, col, &["10", "9", "-2"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(column_values(&table, 0), vec!["-2", "9", "10"]);

        table.sort_rows_by_column(col, SortDirection::Descending);
        assert_eq!(column_values(&table, 0), vec!["10", "9", "-2"]);
    }

    #[test]
    fn test_sort_datetime_formats() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "D", DataType::Datetime);
        seed_rows(
            &mut table,
            col,
            &["2024-03-01 08:00:00", "2024-02-29", "2024-03-01T07:30:00Z"],
        );

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(
            column_values(&table, 0),
            vec!["2024-02-29", "2024-03-01T07:30:00Z", "2024-03-01 08:00:00"]
        );
    }

    #[test]
    fn test_sort_boolean_false_before_true() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "B", DataType::Boolean);
        seed_rows(&mut table, col, &["true", "false", "True"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(column_values(&table, 0), vec!["false", "true", "True"]);
    }

    #[test]
    fn test_sort_enum_uses_declared_order() {
        let mut table = TableDocument::new();
        let col = table.insert_columns(
            0,
            vec![ColumnSpec::new("Status")
                .with_data_type(DataType::Enum)
                .with_enum_values(["todo", "doing", "done"])],
        )[0];
        seed_rows(&mut table, col, &["done", "todo", "doing"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(column_values(&table, 0), vec!["todo", "doing", "done"]);
    }

    #[test]
    fn test_unparseable_cells_sort_last_in_both_directions() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "N", DataType::Integer);
        seed_rows(&mut table, col, &["oops", "2", "", "1"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        assert_eq!(column_values(&table, 0), vec!["1", "2", "oops", ""]);

        table.sort_rows_by_column(col, SortDirection::Descending);
        assert_eq!(column_values(&table, 0), vec!["2", "1", "oops", ""]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let (mut table, cols) = table_with_columns(&["K", "Tag"]);
        table.insert_rows(
            0,
            vec![
                RowSpec::new().with_cell(cols[0], "same").with_cell(cols[1], "first"),
                RowSpec::new().with_cell(cols[0], "same").with_cell(cols[1], "second"),
            ],
        );

        table.sort_rows_by_column(cols[0], SortDirection::Ascending);
        assert_eq!(column_values(&table, 1), vec!["first", "second"]);
    }

    #[test]
    fn test_resort_commits_nothing() {
        let mut table = TableDocument::new();
        let col = column_of(&mut table, "N", DataType::Integer);
        seed_rows(&mut table, col, &["2", "1"]);

        table.sort_rows_by_column(col, SortDirection::Ascending);
        let version = table.version();
        assert!(table.sort_rows_by_column(col, SortDirection::Ascending));
        assert_eq!(table.version(), version);
    }

    #[test]
    fn test_sort_unknown_column_is_rejected() {
        let (mut table, _) = table_with_columns(&["A"]);
        assert!(!table.sort_rows_by_column(ColumnId::new(), SortDirection::Ascending));
    }

    #[test]
    fn test_sort_moves_whole_rows() {
        let (mut table, cols) = table_with_columns(&["Name", "Score"]);
        table.insert_rows(
            0,
            vec![
                RowSpec::new().with_cell(cols[0], "b").with_cell(cols[1], "1"),
                RowSpec::new().with_cell(cols[0], "a").with_cell(cols[1], "2"),
            ],
        );

        table.sort_rows_by_column(cols[0], SortDirection::Ascending);
        let rows = table.rows();
        assert_eq!(rows[0].cells, vec!["a".to_string(), "2".to_string()]);
        assert_eq!(rows[1].cells, vec!["b".to_string(), "1".to_string()]);
    }
}
