//! # Edit Algebra
//!
//! Reversible primitive steps against the replicated containers. Every
//! public operation compiles down to a forward edit list plus a precomputed
//! inverse list; undo applies the inverses, redo reapplies the forwards.
//!
//! `Edit::apply` is the only code that writes into the containers, so the
//! commit discipline (one transaction per operation) lives in exactly one
//! place. Edits are self-contained: a removal edit's inverse carries the
//! full column/row payload needed to restore identical ids, order and cell
//! contents.

use yrs::{Any, Array, ArrayRef, Map, MapPrelim, MapRef, ReadTxn, TransactionMut};

use crate::columns::ColumnDefinition;
use crate::ids::{ColumnId, LockId, RowId};
use crate::locks::LockRange;
use crate::value::{as_map, as_str};

/// Borrowed handles to the structural containers of one document.
pub(crate) struct Containers<'a> {
    pub defs: &'a MapRef,
    pub column_order: &'a ArrayRef,
    pub row_data: &'a MapRef,
    pub row_order: &'a ArrayRef,
    pub locks: &'a ArrayRef,
}

/// Everything needed to (re)create one column: definition, position, and the
/// cell values it contributes to existing rows.
#[derive(Debug, Clone)]
pub(crate) struct ColumnSeed {
    pub at: u32,
    pub def: ColumnDefinition,
    pub cells: Vec<(RowId, String)>,
}

/// Everything needed to (re)create one row.
#[derive(Debug, Clone)]
pub(crate) struct RowSeed {
    pub at: u32,
    pub id: RowId,
    pub cells: Vec<(ColumnId, String)>,
}

/// A lock plus its registry position. Position matters: creation order
/// decides which of several overlapping locks supplies the rejection note,
/// so a restored lock must land where it was.
#[derive(Debug, Clone)]
pub(crate) struct LockSeed {
    pub at: u32,
    pub range: LockRange,
}

#[derive(Debug, Clone)]
pub(crate) enum Edit {
    InsertColumns { columns: Vec<ColumnSeed> },
    RemoveColumns { ids: Vec<ColumnId> },
    InsertRows { rows: Vec<RowSeed> },
    RemoveRows { ids: Vec<RowId> },
    MoveColumn { id: ColumnId, to: u32 },
    SetHeaderName { id: ColumnId, name: String },
    SetColumnWidth { id: ColumnId, width: f64 },
    /// `None` removes the key; an absent cell reads as the empty string.
    SetCell {
        row: RowId,
        col: ColumnId,
        value: Option<String>,
    },
    SetRowOrder { order: Vec<RowId> },
    AddLocks { locks: Vec<LockSeed> },
    RemoveLocks { ids: Vec<LockId> },
}

impl Edit {
    pub(crate) fn apply(&self, c: &Containers<'_>, txn: &mut TransactionMut) {
        match self {
            Edit::InsertColumns { columns } => {
                for seed in columns {
                    let at = seed.at.min(c.column_order.len(txn));
                    c.column_order.insert(txn, at, seed.def.id.to_string());
                    write_column_def(c.defs, txn, &seed.def);
                    for (row, value) in &seed.cells {
                        write_cell(c.row_data, txn, row, &seed.def.id, Some(value.clone()));
                    }
                }
            }

            Edit::RemoveColumns { ids } => {
                for id in ids {
                    let key = id.to_string();
                    if let Some(at) = index_of(c.column_order, txn, &key) {
                        c.column_order.remove_range(txn, at, 1);
                    }
                    c.defs.remove(txn, &key);
                }
                // Strip the deleted keys from every row record so no stale
                // cells survive.
                let row_keys: Vec<String> =
                    c.row_data.keys(txn).map(|k| k.to_string()).collect();
                for row_key in row_keys {
                    if let Some(record) = c.row_data.get(txn, &row_key).and_then(as_map) {
                        for id in ids {
                            record.remove(txn, &id.to_string());
                        }
                    }
                }
            }

            Edit::InsertRows { rows } => {
                for seed in rows {
                    let at = seed.at.min(c.row_order.len(txn));
                    c.row_order.insert(txn, at, seed.id.to_string());
                    let record: MapRef =
                        c.row_data
                            .insert(txn, seed.id.to_string(), MapPrelim::default());
                    for (col, value) in &seed.cells {
                        record.insert(txn, col.to_string(), value.clone());
                    }
                }
            }

            Edit::RemoveRows { ids } => {
                for id in ids {
                    let key = id.to_string();
                    if let Some(at) = index_of(c.row_order, txn, &key) {
                        c.row_order.remove_range(txn, at, 1);
                    }
                    c.row_data.remove(txn, &key);
                }
            }

            Edit::MoveColumn { id, to } => {
                let key = id.to_string();
                if let Some(from) = index_of(c.column_order, txn, &key) {
                    c.column_order.remove_range(txn, from, 1);
                    let at = (*to).min(c.column_order.len(txn));
                    c.column_order.insert(txn, at, key);
                }
            }

            Edit::SetHeaderName { id, name } => {
                if let Some(def) = c.defs.get(txn, &id.to_string()).and_then(as_map) {
                    def.insert(txn, "name", name.clone());
                }
            }

            Edit::SetColumnWidth { id, width } => {
                if let Some(def) = c.defs.get(txn, &id.to_string()).and_then(as_map) {
                    def.insert(txn, "width", *width);
                }
            }

            Edit::SetCell { row, col, value } => {
                write_cell(c.row_data, txn, row, col, value.clone());
            }

            Edit::SetRowOrder { order } => {
                let len = c.row_order.len(txn);
                if len > 0 {
                    c.row_order.remove_range(txn, 0, len);
                }
                for (i, id) in order.iter().enumerate() {
                    c.row_order.insert(txn, i as u32, id.to_string());
                }
            }

            Edit::AddLocks { locks } => {
                for seed in locks {
                    write_lock(c.locks, txn, seed.at, &seed.range);
                }
            }

            Edit::RemoveLocks { ids } => {
                for id in ids {
                    if let Some(at) = lock_index_of(c.locks, txn, id) {
                        c.locks.remove_range(txn, at, 1);
                    }
                }
            }
        }
    }
}

/// Position of a plain-string entry in an order sequence.
pub(crate) fn index_of<T: ReadTxn>(array: &ArrayRef, txn: &T, key: &str) -> Option<u32> {
    array
        .iter(txn)
        .position(|item| as_str(&item).as_deref() == Some(key))
        .map(|i| i as u32)
}

fn lock_index_of<T: ReadTxn>(locks: &ArrayRef, txn: &T, id: &LockId) -> Option<u32> {
    let key = id.to_string();
    locks
        .iter(txn)
        .position(|item| {
            as_map(item)
                .and_then(|map| map.get(txn, "id").as_ref().and_then(as_str))
                .as_deref()
                == Some(key.as_str())
        })
        .map(|i| i as u32)
}

pub(crate) fn write_column_def(defs: &MapRef, txn: &mut TransactionMut, def: &ColumnDefinition) {
    let entry: MapRef = defs.insert(txn, def.id.to_string(), MapPrelim::default());
    entry.insert(txn, "name", def.name.clone());
    entry.insert(txn, "width", def.width);
    if let Some(data_type) = def.data_type {
        entry.insert(txn, "dataType", data_type.as_str());
    }
    if !def.enum_values.is_empty() {
        let values: Vec<Any> = def
            .enum_values
            .iter()
            .map(|v| Any::from(v.as_str()))
            .collect();
        entry.insert(txn, "enumValues", Any::Array(values.into()));
    }
}

fn write_cell(
    row_data: &MapRef,
    txn: &mut TransactionMut,
    row: &RowId,
    col: &ColumnId,
    value: Option<String>,
) {
    let Some(record) = row_data.get(txn, &row.to_string()).and_then(as_map) else {
        // The row vanished between resolution and apply (e.g. a column
        // restore racing a remote row delete). The cell is gone with it.
        tracing::warn!(row = %row, "cell write against missing row record, dropping");
        return;
    };
    match value {
        Some(v) => {
            record.insert(txn, col.to_string(), v);
        }
        None => {
            record.remove(txn, &col.to_string());
        }
    }
}

fn write_lock(locks: &ArrayRef, txn: &mut TransactionMut, at: u32, range: &LockRange) {
    let at = at.min(locks.len(txn));
    let entry: MapRef = locks.insert(txn, at, MapPrelim::default());
    entry.insert(txn, "id", range.id.to_string());
    entry.insert(txn, "rowStart", range.row_start as i64);
    entry.insert(txn, "rowEnd", range.row_end as i64);
    entry.insert(txn, "colStart", range.col_start as i64);
    entry.insert(txn, "colEnd", range.col_end as i64);
    if let Some(note) = &range.note {
        entry.insert(txn, "note", note.clone());
    }
}
