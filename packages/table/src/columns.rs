//! # Column Manager
//!
//! Structural operations on columns: insert, delete, reorder, rename,
//! resize. Every public operation here runs as one commit so that it
//! replicates atomically and undoes as a single step.
//!
//! Index arguments address the *current* display order. They are resolved to
//! stable [`ColumnId`]s inside the operation itself, never trusted across
//! calls: a concurrent replica may have restructured the table since the
//! caller computed them, so out-of-range indices are skipped rather than
//! treated as fatal.

use serde::{Deserialize, Serialize};
use yrs::Transact;

use crate::document::TableDocument;
use crate::edits::{ColumnSeed, Edit};
use crate::ids::ColumnId;

/// Default width (in pixels) for newly created columns.
pub const DEFAULT_COLUMN_WIDTH: f64 = 120.0;

/// Declared data type of a column.
///
/// The engine stores every cell as raw text; the type only drives sort and
/// comparison behavior. Display formatting and validation belong to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Datetime,
    Enum,
    Boolean,
    ImageUrl,
}

impl DataType {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Datetime => "datetime",
            DataType::Enum => "enum",
            DataType::Boolean => "boolean",
            DataType::ImageUrl => "imageurl",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(DataType::Text),
            "integer" => Some(DataType::Integer),
            "decimal" => Some(DataType::Decimal),
            "datetime" => Some(DataType::Datetime),
            "enum" => Some(DataType::Enum),
            "boolean" => Some(DataType::Boolean),
            "imageurl" => Some(DataType::ImageUrl),
            _ => None,
        }
    }
}

/// Caller-provided description of a column to insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    /// Declared type; `None` behaves as text for sorting.
    pub data_type: Option<DataType>,

    /// Allowed values, ordered. Only meaningful for [`DataType::Enum`].
    pub enum_values: Vec<String>,

    /// Cell value written for every row when the column is created.
    /// `None` leaves cells absent, which reads as the empty string.
    pub initial_value: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = Some(value.into());
        self
    }
}

/// Live definition of a column as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub id: ColumnId,
    pub name: String,
    pub width: f64,
    pub data_type: Option<DataType>,
    pub enum_values: Vec<String>,
}

/// Column address accepted by cell-level operations: either the stable id
/// or the current header name (first match wins on duplicates).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Id(ColumnId),
    Name(String),
}

impl From<ColumnId> for ColumnRef {
    fn from(id: ColumnId) -> Self {
        ColumnRef::Id(id)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        ColumnRef::Name(name)
    }
}

impl TableDocument {
    /// Insert columns at `index` (clamped to the current column count).
    ///
    /// Mints one [`ColumnId`] per spec, creates its definition with the
    /// default width, and seeds every existing row with the spec's
    /// `initial_value` when one is given. Returns the new ids in order.
    pub fn insert_columns(&mut self, index: usize, specs: Vec<ColumnSpec>) -> Vec<ColumnId> {
        if specs.is_empty() {
            return Vec::new();
        }

        let (seeds, ids) = {
            let txn = self.doc.transact();
            let at = index.min(self.column_ids(&txn).len()) as u32;
            let rows = self.row_ids(&txn);

            let mut seeds = Vec::with_capacity(specs.len());
            let mut ids = Vec::with_capacity(specs.len());
            for (offset, spec) in specs.into_iter().enumerate() {
                let id = ColumnId::new();
                let cells = match &spec.initial_value {
                    Some(value) => rows.iter().map(|row| (*row, value.clone())).collect(),
                    None => Vec::new(),
                };
                seeds.push(ColumnSeed {
                    at: at + offset as u32,
                    def: ColumnDefinition {
                        id,
                        name: spec.name,
                        width: DEFAULT_COLUMN_WIDTH,
                        data_type: spec.data_type,
                        enum_values: spec.enum_values,
                    },
                    cells,
                });
                ids.push(id);
            }
            (seeds, ids)
        };

        self.commit(
            "insert columns",
            vec![Edit::InsertColumns { columns: seeds }],
            vec![Edit::RemoveColumns { ids: ids.clone() }],
        );
        ids
    }

    /// Delete the columns at the given display indices.
    ///
    /// Out-of-range and duplicate indices are skipped. Removes each column
    /// from the order, drops its definition, and strips its key from every
    /// row record. Returns the number of columns actually removed.
    pub fn delete_columns(&mut self, indices: &[usize]) -> usize {
        let seeds = {
            let txn = self.doc.transact();
            let order = self.column_ids(&txn);

            let mut targets: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| {
                    let valid = i < order.len();
                    if !valid {
                        tracing::debug!(index = i, "delete_columns: index out of range, skipping");
                    }
                    valid
                })
                .collect();
            targets.sort_unstable();
            targets.dedup();

            let rows = self.row_ids(&txn);
            let mut seeds = Vec::with_capacity(targets.len());
            for &at in &targets {
                let id = order[at];
                let Some(def) = self.column_def(&txn, &id) else {
                    tracing::warn!(column = %id, "delete_columns: id in order without definition");
                    continue;
                };
                let cells = rows
                    .iter()
                    .filter_map(|row| {
                        self.cell_value(&txn, row, &id).map(|value| (*row, value))
                    })
                    .collect();
                seeds.push(ColumnSeed {
                    at: at as u32,
                    def,
                    cells,
                });
            }
            seeds
        };

        if seeds.is_empty() {
            return 0;
        }

        let removed = seeds.len();
        let ids = seeds.iter().map(|seed| seed.def.id).collect();
        self.commit(
            "delete columns",
            vec![Edit::RemoveColumns { ids }],
            // Seeds are ordered by ascending original index, so reinserting
            // them in order restores the exact layout.
            vec![Edit::InsertColumns { columns: seeds }],
        );
        removed
    }

    /// Move the column at `from` so it ends up at `to` (clamped).
    ///
    /// Order-only: definitions and cell data are untouched. Returns `false`
    /// if `from` is out of range.
    pub fn reorder_column(&mut self, from: usize, to: usize) -> bool {
        let (id, from, to) = {
            let txn = self.doc.transact();
            let order = self.column_ids(&txn);
            if from >= order.len() {
                return false;
            }
            (order[from], from, to.min(order.len().saturating_sub(1)))
        };

        if from == to {
            return true;
        }

        self.commit(
            "reorder column",
            vec![Edit::MoveColumn { id, to: to as u32 }],
            vec![Edit::MoveColumn {
                id,
                to: from as u32,
            }],
        );
        true
    }

    /// Rename the column at `index`. The id and all cell references are
    /// unaffected. Returns `false` if the index is out of range.
    pub fn edit_header(&mut self, index: usize, new_name: impl Into<String>) -> bool {
        let new_name = new_name.into();
        let (id, old_name) = {
            let txn = self.doc.transact();
            let order = self.column_ids(&txn);
            let Some(&id) = order.get(index) else {
                return false;
            };
            let Some(def) = self.column_def(&txn, &id) else {
                return false;
            };
            (id, def.name)
        };

        if old_name == new_name {
            return true;
        }

        self.commit(
            "rename column",
            vec![Edit::SetHeaderName {
                id,
                name: new_name,
            }],
            vec![Edit::SetHeaderName { id, name: old_name }],
        );
        true
    }

    /// Set a column's display width. Returns `false` if the id is unknown.
    pub fn update_column_width(&mut self, id: ColumnId, width: f64) -> bool {
        let old_width = {
            let txn = self.doc.transact();
            match self.column_def(&txn, &id) {
                Some(def) => def.width,
                None => return false,
            }
        };

        if old_width == width {
            return true;
        }

        self.commit(
            "resize column",
            vec![Edit::SetColumnWidth { id, width }],
            vec![Edit::SetColumnWidth {
                id,
                width: old_width,
            }],
        );
        true
    }
}
