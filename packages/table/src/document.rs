//! # Table Document
//!
//! The replicated table document: a spreadsheet-like grid expressed as a set
//! of conflict-free containers inside one `yrs::Doc`.
//!
//! ## Key principles
//!
//! 1. **CRDT is source of truth**: every read model is derived from the
//!    containers and can be rebuilt at any time.
//! 2. **Stable ids, racy indices**: callers address by display index, the
//!    engine resolves to [`ColumnId`]/[`RowId`] inside the operation.
//! 3. **One commit per operation**: multi-container edits share a single
//!    transaction, so other replicas never observe an intermediate state and
//!    undo reverses the whole operation as one step.
//! 4. **Convergence is delegated**: map keys merge last-writer-wins, order
//!    sequences merge position-and-origin aware. The engine never
//!    reimplements conflict resolution.
//!
//! The document is a library object, not a service: the transport layer
//! moves the encoded updates between replicas and calls [`apply_update`]
//! with whatever arrives.
//!
//! [`apply_update`]: TableDocument::apply_update

use std::collections::HashMap;

use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Array, ArrayRef, Doc, Map, MapRef, ReadTxn, StateVector, Transact, Update};

use crate::awareness::PresenceAggregator;
use crate::columns::{ColumnDefinition, DataType, DEFAULT_COLUMN_WIDTH};
use crate::edits::{Containers, Edit};
use crate::errors::TableError;
use crate::ids::{ColumnId, LockId, RowId};
use crate::locks::LockRange;
use crate::observer::{HeaderView, ObserverBridge, ReadModels, RowView};
use crate::schema;
use crate::undo::UndoStack;
use crate::value::{as_f64, as_i64, as_map, as_str, as_str_list};

/// A replicated table document and its local editing state.
///
/// The containers replicate; the undo stack, observer registry and presence
/// aggregation are replica-local.
pub struct TableDocument {
    pub(crate) doc: Doc,
    pub(crate) meta: MapRef,
    pub(crate) column_defs: MapRef,
    pub(crate) column_order: ArrayRef,
    pub(crate) row_data: MapRef,
    pub(crate) row_order: ArrayRef,
    pub(crate) lock_registry: ArrayRef,

    pub(crate) undo_stack: UndoStack,
    pub(crate) observers: ObserverBridge,
    pub(crate) presence: PresenceAggregator,

    /// Local operation counter (bumps on every commit, undo/redo and applied
    /// remote update).
    pub(crate) version: u64,
}

impl TableDocument {
    /// Create a fresh, empty v2 document.
    pub fn new() -> Self {
        match Self::open(Doc::new()) {
            Ok(table) => table,
            // A fresh doc has no schemaVersion and no legacy payload, so
            // migration initializes an empty v2 table and cannot fail.
            Err(_) => unreachable!("fresh document migration is infallible"),
        }
    }

    /// Adopt a transport-provided doc, migrating legacy layouts in place.
    ///
    /// This is the load boundary: it fails only when the document declares a
    /// schema version newer than this build understands.
    pub fn open(doc: Doc) -> Result<Self, TableError> {
        schema::migrate(&doc)?;

        let meta = doc.get_or_insert_map(schema::META);
        let column_defs = doc.get_or_insert_map(schema::COLUMN_DEFINITIONS);
        let column_order = doc.get_or_insert_array(schema::COLUMN_ORDER);
        let row_data = doc.get_or_insert_map(schema::ROW_DATA);
        let row_order = doc.get_or_insert_array(schema::ROW_ORDER);
        let lock_registry = doc.get_or_insert_array(schema::LOCK_REGISTRY);

        Ok(Self {
            doc,
            meta,
            column_defs,
            column_order,
            row_data,
            row_order,
            lock_registry,
            undo_stack: UndoStack::new(),
            observers: ObserverBridge::new(),
            presence: PresenceAggregator::new(),
            version: 0,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Replica id assigned by the underlying doc.
    pub fn client_id(&self) -> u64 {
        self.doc.client_id()
    }

    /// Local operation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Declared schema version, if any.
    pub fn schema_version(&self) -> Option<i64> {
        let txn = self.doc.transact();
        self.meta
            .get(&txn, schema::KEY_SCHEMA_VERSION)
            .as_ref()
            .and_then(as_i64)
    }

    pub fn column_count(&self) -> usize {
        let txn = self.doc.transact();
        self.column_order.len(&txn) as usize
    }

    pub fn row_count(&self) -> usize {
        let txn = self.doc.transact();
        self.row_order.len(&txn) as usize
    }

    /// Ordered header list: one view per live column, in display order.
    pub fn headers(&self) -> Vec<HeaderView> {
        let txn = self.doc.transact();
        self.column_ids(&txn)
            .into_iter()
            .filter_map(|id| self.column_def(&txn, &id))
            .map(|def| HeaderView {
                id: def.id,
                name: def.name,
                width: def.width,
                data_type: def.data_type,
            })
            .collect()
    }

    /// Ordered row list as plain records. Every live column is materialized;
    /// absent cells read as the empty string.
    pub fn rows(&self) -> Vec<RowView> {
        let txn = self.doc.transact();
        let columns = self.column_ids(&txn);
        self.row_ids(&txn)
            .into_iter()
            .map(|row| RowView {
                id: row,
                cells: columns
                    .iter()
                    .map(|col| self.cell_value(&txn, &row, col).unwrap_or_default())
                    .collect(),
            })
            .collect()
    }

    /// Column widths keyed by id.
    pub fn column_widths(&self) -> HashMap<ColumnId, f64> {
        let txn = self.doc.transact();
        self.column_ids(&txn)
            .into_iter()
            .filter_map(|id| self.column_def(&txn, &id).map(|def| (id, def.width)))
            .collect()
    }

    /// Active lock ranges in creation order.
    pub fn locks(&self) -> Vec<LockRange> {
        let txn = self.doc.transact();
        self.locks_in(&txn)
    }

    /// Cell text at a display coordinate. `None` when the coordinate is out
    /// of range; an empty cell reads as `Some("")`.
    pub fn cell(&self, row: usize, col: usize) -> Option<String> {
        let txn = self.doc.transact();
        let row_id = *self.row_ids(&txn).get(row)?;
        let col_id = *self.column_ids(&txn).get(col)?;
        Some(self.cell_value(&txn, &row_id, &col_id).unwrap_or_default())
    }

    // =========================================================================
    // Sync surface
    // =========================================================================

    /// Current state vector, for delta sync.
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state as one update.
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode everything the peer behind `state_vector` is missing.
    pub fn encode_delta(&self, state_vector: &[u8]) -> Result<Vec<u8>, TableError> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| TableError::Decode(e.to_string()))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update produced by another replica.
    ///
    /// Remote structural changes flow through the same observer path as
    /// local ones: derived read models are recomputed and changed topics
    /// fire. Remote edits are not undoable locally.
    pub fn apply_update(&mut self, update: &[u8]) -> Result<(), TableError> {
        let update =
            Update::decode_v1(update).map_err(|e| TableError::Decode(e.to_string()))?;
        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| TableError::ApplyUpdate(e.to_string()))?;
        }
        self.version += 1;
        self.refresh_observers();
        Ok(())
    }

    // =========================================================================
    // Commit plumbing
    // =========================================================================

    pub(crate) fn containers(&self) -> Containers<'_> {
        Containers {
            defs: &self.column_defs,
            column_order: &self.column_order,
            row_data: &self.row_data,
            row_order: &self.row_order,
            locks: &self.lock_registry,
        }
    }

    /// Apply edits inside one transaction. Used by commits and by undo/redo.
    pub(crate) fn apply_edits(&self, edits: &[Edit]) {
        let containers = self.containers();
        let mut txn = self.doc.transact_mut();
        for edit in edits {
            edit.apply(&containers, &mut txn);
        }
    }

    /// Run one operation: apply the forward edits atomically, record the
    /// batch for undo, and notify observers once.
    pub(crate) fn commit(&mut self, label: &'static str, forward: Vec<Edit>, inverse: Vec<Edit>) {
        self.apply_edits(&forward);
        self.undo_stack.push(label, forward, inverse);
        self.version += 1;
        self.refresh_observers();
    }

    pub(crate) fn refresh_observers(&mut self) {
        let models = ReadModels {
            headers: self.headers(),
            rows: self.rows(),
            widths: self.column_widths(),
            locks: self.locks(),
        };
        self.observers.refresh(models);
    }

    // =========================================================================
    // Container reads (shared by the operation modules)
    // =========================================================================

    pub(crate) fn column_ids<T: ReadTxn>(&self, txn: &T) -> Vec<ColumnId> {
        self.column_order
            .iter(txn)
            .filter_map(|item| {
                let key = as_str(&item)?;
                match key.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!(key = %key, "columnOrder entry is not a column id");
                        None
                    }
                }
            })
            .collect()
    }

    pub(crate) fn row_ids<T: ReadTxn>(&self, txn: &T) -> Vec<RowId> {
        self.row_order
            .iter(txn)
            .filter_map(|item| {
                let key = as_str(&item)?;
                match key.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!(key = %key, "rowOrder entry is not a row id");
                        None
                    }
                }
            })
            .collect()
    }

    pub(crate) fn column_def<T: ReadTxn>(&self, txn: &T, id: &ColumnId) -> Option<ColumnDefinition> {
        let map = self.column_defs.get(txn, &id.to_string()).and_then(as_map)?;
        Some(ColumnDefinition {
            id: *id,
            name: map.get(txn, "name").as_ref().and_then(as_str).unwrap_or_default(),
            width: map
                .get(txn, "width")
                .as_ref()
                .and_then(as_f64)
                .unwrap_or(DEFAULT_COLUMN_WIDTH),
            data_type: map
                .get(txn, "dataType")
                .as_ref()
                .and_then(as_str)
                .as_deref()
                .and_then(DataType::parse),
            enum_values: map
                .get(txn, "enumValues")
                .as_ref()
                .and_then(as_str_list)
                .unwrap_or_default(),
        })
    }

    pub(crate) fn cell_value<T: ReadTxn>(
        &self,
        txn: &T,
        row: &RowId,
        col: &ColumnId,
    ) -> Option<String> {
        let record = self.row_data.get(txn, &row.to_string()).and_then(as_map)?;
        record.get(txn, &col.to_string()).as_ref().and_then(as_str)
    }

    pub(crate) fn locks_in<T: ReadTxn>(&self, txn: &T) -> Vec<LockRange> {
        self.lock_registry
            .iter(txn)
            .filter_map(|item| {
                let map = as_map(item)?;
                let id: LockId = map
                    .get(txn, "id")
                    .as_ref()
                    .and_then(as_str)?
                    .parse()
                    .ok()?;
                let bound = |key: &str| {
                    map.get(txn, key)
                        .as_ref()
                        .and_then(as_i64)
                        .unwrap_or(0)
                        .max(0) as usize
                };
                Some(LockRange {
                    id,
                    row_start: bound("rowStart"),
                    row_end: bound("rowEnd"),
                    col_start: bound("colStart"),
                    col_end: bound("colEnd"),
                    note: map.get(txn, "note").as_ref().and_then(as_str),
                })
            })
            .collect()
    }

    /// Cells actually present in a row's record (no empty-string filling).
    #[cfg(test)]
    pub(crate) fn row_cells_by_index(&self, row: usize) -> HashMap<ColumnId, String> {
        let txn = self.doc.transact();
        let Some(&row_id) = self.row_ids(&txn).get(row) else {
            return HashMap::new();
        };
        let Some(record) = self.row_data.get(&txn, &row_id.to_string()).and_then(as_map) else {
            return HashMap::new();
        };
        record
            .iter(&txn)
            .filter_map(|(key, value)| Some((key.parse().ok()?, as_str(&value)?)))
            .collect()
    }

    /// Ids stored in `rowData`, regardless of order membership.
    #[cfg(test)]
    pub(crate) fn stored_row_ids(&self) -> Vec<RowId> {
        let txn = self.doc.transact();
        self.row_data
            .keys(&txn)
            .filter_map(|key| key.parse().ok())
            .collect()
    }

    /// Ids stored in `columnDefinitions`, regardless of order membership.
    #[cfg(test)]
    pub(crate) fn stored_column_ids(&self) -> Vec<ColumnId> {
        let txn = self.doc.transact();
        self.column_defs
            .keys(&txn)
            .filter_map(|key| key.parse().ok())
            .collect()
    }
}

impl Default for TableDocument {
    fn default() -> Self {
        Self::new()
    }
}
