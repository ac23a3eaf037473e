//! # Gridbook Table
//!
//! A replicated table document: the collaborative core of a spreadsheet-like
//! grid. State lives in conflict-free containers so any number of replicas
//! can edit offline and converge once their updates are exchanged; the host
//! application supplies the transport and the rendering.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!   UI layer ◄────── │        ObserverBridge       │  diffed read models
//!                    └─────────────▲───────────────┘
//!                                  │
//!  insert/delete/edit  ┌───────────┴───────────────┐   update bytes
//!  sort/lock/undo ───► │       TableDocument       │ ◄──────────────► peers
//!                      └───────────┬───────────────┘
//!                                  │ one commit = one transaction
//!                    ┌─────────────▼───────────────┐
//!                    │  columnDefinitions/Order    │
//!                    │  rowData/Order              │  replicated
//!                    │  lockRegistry · meta        │  containers
//!                    └─────────────────────────────┘
//! ```
//!
//! Columns and rows carry stable ids; display indices are resolved to ids
//! at the operation boundary so concurrent restructuring shifts data instead
//! of corrupting it. Undo/redo is replica-local and reverses only local
//! operations. Presence (cursors, selections) is ephemeral and never enters
//! the document history.
//!
//! ## Example
//!
//! ```
//! use gridbook_table::{ColumnSpec, RowSpec, TableDocument};
//!
//! let mut table = TableDocument::new();
//! let cols = table.insert_columns(0, vec![ColumnSpec::new("Name")]);
//! table.insert_rows(0, vec![RowSpec::new().with_cell(cols[0], "Ada")]);
//!
//! // Ship `table.encode_state()` to a peer, feed what they send into
//! // `table.apply_update(..)`, and both replicas converge.
//! assert_eq!(table.cell(0, 0), Some("Ada".to_string()));
//! ```

mod awareness;
mod columns;
mod document;
mod edits;
mod errors;
mod ids;
mod locks;
mod observer;
mod rows;
mod schema;
mod undo;
mod value;

#[cfg(test)]
mod tests_integration;

pub use awareness::{AwarenessState, CellCursor, CellRef, SelectionArea, UserInfo};
pub use columns::{ColumnDefinition, ColumnRef, ColumnSpec, DataType, DEFAULT_COLUMN_WIDTH};
pub use document::TableDocument;
pub use errors::TableError;
pub use ids::{ColumnId, LockId, RowId};
pub use locks::LockRange;
pub use observer::{HeaderView, RowView, SubscriptionId};
pub use rows::{RowSpec, SortDirection};
pub use schema::SCHEMA_VERSION;
