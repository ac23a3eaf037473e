//! # Schema & Migration
//!
//! The v2 on-wire layout and the upgrade path from the legacy (v1) layout.
//!
//! ## v2 containers
//!
//! ```text
//! Doc
//! ├── meta (Map)                 # schemaVersion: 2
//! ├── columnDefinitions (Map)    # ColumnId → {name, width, dataType?, enumValues?}
//! ├── columnOrder (Array)        # ColumnId strings, display order
//! ├── rowData (Map)              # RowId → {ColumnId → cell text}
//! ├── rowOrder (Array)           # RowId strings, display order
//! └── lockRegistry (Array)       # {id, rowStart, rowEnd, colStart, colEnd, note?}
//! ```
//!
//! ## Legacy (v1) layout
//!
//! A flat `headers` array of strings plus a `rows` array of objects keyed by
//! header name. Migration mints a stable id per header and per row,
//! preserving order, and copies cells across by header name. It runs in one
//! transaction so other replicas never observe a half-migrated document, and
//! it is idempotent: once `schemaVersion` is set, re-running is a no-op.
//!
//! Malformed legacy entries are skipped with a logged anomaly instead of
//! failing the whole load; the worst case is an empty but valid v2 table.
//! The legacy containers themselves are left in place, inert; nothing reads
//! them after `schemaVersion` reaches 2.

use std::collections::HashMap;

use yrs::{Any, Array, Doc, Map, MapPrelim, MapRef, Out, Transact};

use crate::columns::{ColumnDefinition, DEFAULT_COLUMN_WIDTH};
use crate::edits::write_column_def;
use crate::errors::TableError;
use crate::ids::{ColumnId, RowId};
use crate::value::{as_i64, as_str};

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 2;

pub(crate) const META: &str = "meta";
pub(crate) const COLUMN_DEFINITIONS: &str = "columnDefinitions";
pub(crate) const COLUMN_ORDER: &str = "columnOrder";
pub(crate) const ROW_DATA: &str = "rowData";
pub(crate) const ROW_ORDER: &str = "rowOrder";
pub(crate) const LOCK_REGISTRY: &str = "lockRegistry";
pub(crate) const KEY_SCHEMA_VERSION: &str = "schemaVersion";

pub(crate) const LEGACY_HEADERS: &str = "headers";
pub(crate) const LEGACY_ROWS: &str = "rows";

/// Bring `doc` up to the current schema. Called once at open time.
pub(crate) fn migrate(doc: &Doc) -> Result<(), TableError> {
    let meta = doc.get_or_insert_map(META);
    let defs = doc.get_or_insert_map(COLUMN_DEFINITIONS);
    let column_order = doc.get_or_insert_array(COLUMN_ORDER);
    let row_data = doc.get_or_insert_map(ROW_DATA);
    let row_order = doc.get_or_insert_array(ROW_ORDER);
    let legacy_headers = doc.get_or_insert_array(LEGACY_HEADERS);
    let legacy_rows = doc.get_or_insert_array(LEGACY_ROWS);

    let mut txn = doc.transact_mut();

    match meta.get(&txn, KEY_SCHEMA_VERSION).as_ref().and_then(as_i64) {
        Some(version) if version == SCHEMA_VERSION => return Ok(()),
        Some(version) if version > SCHEMA_VERSION => {
            return Err(TableError::UnsupportedSchema(version))
        }
        // Absent or older than current: run the legacy upgrade below.
        _ => {}
    }

    // Headers → columns, order preserved. Non-string entries are anomalies.
    let headers: Vec<String> = legacy_headers
        .iter(&txn)
        .enumerate()
        .filter_map(|(i, item)| match as_str(&item) {
            Some(name) => Some(name),
            None => {
                tracing::warn!(index = i, "legacy header is not a string, skipping");
                None
            }
        })
        .collect();

    let mut column_for_name: HashMap<String, ColumnId> = HashMap::new();
    let mut columns: Vec<(String, ColumnId)> = Vec::with_capacity(headers.len());
    for name in headers {
        let id = ColumnId::new();
        // First occurrence wins for cell lookup on duplicate header names;
        // the duplicates still become distinct (empty) columns.
        column_for_name.entry(name.clone()).or_insert(id);
        columns.push((name, id));
    }

    for (i, (name, id)) in columns.iter().enumerate() {
        column_order.insert(&mut txn, i as u32, id.to_string());
        write_column_def(
            &defs,
            &mut txn,
            &ColumnDefinition {
                id: *id,
                name: name.clone(),
                width: DEFAULT_COLUMN_WIDTH,
                data_type: None,
                enum_values: Vec::new(),
            },
        );
    }

    // Row objects → row records, cells copied by header name.
    let row_items: Vec<Out> = legacy_rows.iter(&txn).collect();
    let mut at = 0u32;
    for (i, item) in row_items.into_iter().enumerate() {
        let cells: Vec<(String, String)> = match item {
            Out::Any(Any::Map(object)) => object
                .iter()
                .filter_map(|(name, v)| match v {
                    Any::String(s) => Some((name.clone(), s.to_string())),
                    _ => None,
                })
                .collect(),
            Out::YMap(object) => object
                .iter(&txn)
                .filter_map(|(name, v)| as_str(&v).map(|s| (name.to_string(), s)))
                .collect(),
            _ => {
                tracing::warn!(index = i, "legacy row is not an object, skipping");
                continue;
            }
        };

        let row_id = RowId::new();
        row_order.insert(&mut txn, at, row_id.to_string());
        at += 1;
        let record: MapRef = row_data.insert(&mut txn, row_id.to_string(), MapPrelim::default());
        for (name, value) in cells {
            match column_for_name.get(&name) {
                Some(col) => {
                    record.insert(&mut txn, col.to_string(), value);
                }
                None => {
                    tracing::warn!(header = %name, "legacy cell references unknown header, skipping");
                }
            }
        }
    }

    meta.insert(&mut txn, KEY_SCHEMA_VERSION, SCHEMA_VERSION);
    Ok(())
}
