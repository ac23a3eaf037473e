//! # Presence
//!
//! Ephemeral per-user state: identity, focused cell, selected area. Presence
//! rides outside the document history; it is not persisted, not undoable,
//! and a client that disconnects simply stops being counted.
//!
//! The transport layer broadcasts each client's [`AwarenessState`] (JSON)
//! and feeds received states into [`apply_presence`] /
//! [`apply_presence_json`]; a disconnect arrives as a `None` state. The
//! aggregator recomputes the full per-cell cursor map on every change, which
//! keeps it deterministic under out-of-order delivery.
//!
//! The cursor map covers remote clients only. The local state is stored just
//! to produce the broadcast payload; a UI renders its own selection directly
//! and would double-draw it if the index included self.
//!
//! [`apply_presence`]: TableDocument::apply_presence
//! [`apply_presence_json`]: TableDocument::apply_presence_json

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::document::TableDocument;
use crate::errors::TableError;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    /// Display color, e.g. `"#ffB3BA"`. Opaque to the engine.
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    pub row_index: usize,
    pub col_index: usize,
}

/// Inclusive rectangular selection between two corner cells (any corner
/// pair; orientation does not matter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionArea {
    pub start_cell: CellRef,
    pub end_cell: CellRef,
}

impl SelectionArea {
    fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let rows = self.start_cell.row_index.min(self.end_cell.row_index)
            ..=self.start_cell.row_index.max(self.end_cell.row_index);
        let col_lo = self.start_cell.col_index.min(self.end_cell.col_index);
        let col_hi = self.start_cell.col_index.max(self.end_cell.col_index);
        rows.flat_map(move |row| (col_lo..=col_hi).map(move |col| (row, col)))
    }
}

/// What one client broadcasts about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwarenessState {
    /// Peers may broadcast before identifying themselves; an absent user
    /// reads as the anonymous default.
    #[serde(default)]
    pub user: UserInfo,
    pub selected_cell: Option<CellRef>,
    pub selection_area: Option<SelectionArea>,
}

/// One remote (or local) cursor resting on a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellCursor {
    pub client_id: u64,
    pub user: UserInfo,
}

/// Replica-local aggregation of remote presence states into a per-cell
/// cursor map. The local state is held separately and never indexed.
#[derive(Debug, Default)]
pub(crate) struct PresenceAggregator {
    local: Option<AwarenessState>,
    /// Keyed by client id; ordered so the rebuild is deterministic.
    remote: BTreeMap<u64, AwarenessState>,
    cursors: HashMap<(usize, usize), Vec<CellCursor>>,
}

impl PresenceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local(&mut self, state: Option<AwarenessState>) {
        self.local = state;
    }

    pub fn set_remote(&mut self, client_id: u64, state: Option<AwarenessState>) {
        match state {
            Some(state) => {
                self.remote.insert(client_id, state);
            }
            None => {
                self.remote.remove(&client_id);
            }
        }
        self.rebuild();
    }

    pub fn local(&self) -> Option<&AwarenessState> {
        self.local.as_ref()
    }

    pub fn cursors_at(&self, row: usize, col: usize) -> &[CellCursor] {
        self.cursors
            .get(&(row, col))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cursor_map(&self) -> &HashMap<(usize, usize), Vec<CellCursor>> {
        &self.cursors
    }

    /// Full recompute over all remote states. Each client contributes at
    /// most one cursor per cell even when its focused cell sits inside its
    /// own selection area.
    fn rebuild(&mut self) {
        self.cursors.clear();
        for (&client_id, state) in &self.remote {
            let mut covered = BTreeSet::new();
            if let Some(cell) = &state.selected_cell {
                covered.insert((cell.row_index, cell.col_index));
            }
            if let Some(area) = &state.selection_area {
                covered.extend(area.cells());
            }
            for key in covered {
                self.cursors.entry(key).or_default().push(CellCursor {
                    client_id,
                    user: state.user.clone(),
                });
            }
        }
    }
}

impl TableDocument {
    /// Set (or clear) what this replica broadcasts about its own user.
    /// Returns the JSON payload the transport should forward to peers, or
    /// `None` when clearing. The local state never enters this replica's
    /// own cursor index.
    pub fn set_local_presence(&mut self, state: Option<AwarenessState>) -> Option<String> {
        let payload = state
            .as_ref()
            .and_then(|state| serde_json::to_string(state).ok());
        self.presence.set_local(state);
        payload
    }

    pub fn local_presence(&self) -> Option<&AwarenessState> {
        self.presence.local()
    }

    /// Ingest a peer's presence state. `None` marks a disconnect and removes
    /// every cursor that client contributed. Updates carrying this replica's
    /// own client id are ignored (the local state is authoritative).
    pub fn apply_presence(&mut self, client_id: u64, state: Option<AwarenessState>) {
        if client_id == self.client_id() {
            return;
        }
        self.presence.set_remote(client_id, state);
        self.notify_presence();
    }

    /// [`apply_presence`] for a raw JSON payload, as produced by
    /// [`set_local_presence`] on the sending side.
    ///
    /// [`apply_presence`]: Self::apply_presence
    /// [`set_local_presence`]: Self::set_local_presence
    pub fn apply_presence_json(&mut self, client_id: u64, payload: &str) -> Result<(), TableError> {
        let state: AwarenessState =
            serde_json::from_str(payload).map_err(|e| TableError::Decode(e.to_string()))?;
        self.apply_presence(client_id, Some(state));
        Ok(())
    }

    /// Cursors currently resting on one display coordinate.
    pub fn cursors_at(&self, row: usize, col: usize) -> &[CellCursor] {
        self.presence.cursors_at(row, col)
    }

    /// The whole cursor map, keyed by `(row, col)`.
    pub fn cell_cursors(&self) -> &HashMap<(usize, usize), Vec<CellCursor>> {
        self.presence.cursor_map()
    }

    fn notify_presence(&mut self) {
        let snapshot = self.presence.cursor_map().clone();
        self.observers.notify_cursors(&snapshot);
    }
}
