//! # Observer Bridge
//!
//! Push-style change notification for UI layers. Subscribers register a
//! callback per topic (headers, rows, widths, locks, cursors); after every
//! commit, undo/redo or applied remote update the bridge recomputes the
//! derived read models, diffs them against the last notified snapshot, and
//! fires only the topics that actually changed.
//!
//! Diffing on the derived models rather than on raw container events means
//! a batched operation produces exactly one notification per affected topic,
//! and an operation that nets out to no visible change produces none.
//!
//! Callbacks receive a borrowed snapshot; they should copy out what they
//! need and return quickly. Subscribing does not fire an initial
//! notification; read the current state directly first.

use std::collections::HashMap;

use crate::awareness::CellCursor;
use crate::columns::DataType;
use crate::document::TableDocument;
use crate::ids::{ColumnId, RowId};
use crate::locks::LockRange;

/// One column as the UI sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub id: ColumnId,
    pub name: String,
    pub width: f64,
    pub data_type: Option<DataType>,
}

/// One row as the UI sees it: cell text aligned to the current header order,
/// absent cells materialized as `""`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RowId,
    pub cells: Vec<String>,
}

/// Handle for cancelling a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type CursorMap = HashMap<(usize, usize), Vec<CellCursor>>;

/// The derived snapshot the bridge diffs against.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ReadModels {
    pub headers: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub widths: HashMap<ColumnId, f64>,
    pub locks: Vec<LockRange>,
}

type Callback<T> = Box<dyn Fn(&T)>;

struct Topic<T: ?Sized> {
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T: ?Sized> Topic<T> {
    fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    fn notify(&self, value: &T) {
        for (_, callback) in &self.subscribers {
            callback(value);
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }
}

pub(crate) struct ObserverBridge {
    next_id: u64,
    headers: Topic<[HeaderView]>,
    rows: Topic<[RowView]>,
    widths: Topic<HashMap<ColumnId, f64>>,
    locks: Topic<[LockRange]>,
    cursors: Topic<CursorMap>,
    last: ReadModels,
}

impl ObserverBridge {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            headers: Topic::new(),
            rows: Topic::new(),
            widths: Topic::new(),
            locks: Topic::new(),
            cursors: Topic::new(),
            last: ReadModels::default(),
        }
    }

    fn mint(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// Diff `models` against the last notified snapshot and fire the
    /// changed topics.
    pub fn refresh(&mut self, models: ReadModels) {
        if models.headers != self.last.headers {
            self.headers.notify(&models.headers);
        }
        if models.rows != self.last.rows {
            self.rows.notify(&models.rows);
        }
        if models.widths != self.last.widths {
            self.widths.notify(&models.widths);
        }
        if models.locks != self.last.locks {
            self.locks.notify(&models.locks);
        }
        self.last = models;
    }

    /// Presence is ephemeral and cheap to diff upstream, so every call
    /// notifies.
    pub fn notify_cursors(&self, cursors: &CursorMap) {
        self.cursors.notify(cursors);
    }
}

impl TableDocument {
    pub fn subscribe_headers(&mut self, callback: impl Fn(&[HeaderView]) + 'static) -> SubscriptionId {
        let id = self.observers.mint();
        self.observers.headers.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_rows(&mut self, callback: impl Fn(&[RowView]) + 'static) -> SubscriptionId {
        let id = self.observers.mint();
        self.observers.rows.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_widths(
        &mut self,
        callback: impl Fn(&HashMap<ColumnId, f64>) + 'static,
    ) -> SubscriptionId {
        let id = self.observers.mint();
        self.observers.widths.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_locks(&mut self, callback: impl Fn(&[LockRange]) + 'static) -> SubscriptionId {
        let id = self.observers.mint();
        self.observers.locks.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_cursors(
        &mut self,
        callback: impl Fn(&HashMap<(usize, usize), Vec<CellCursor>>) + 'static,
    ) -> SubscriptionId {
        let id = self.observers.mint();
        self.observers.cursors.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Cancel a subscription on whichever topic holds it. Returns `false`
    /// for an unknown id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let o = &mut self.observers;
        o.headers.remove(id)
            || o.rows.remove(id)
            || o.widths.remove(id)
            || o.locks.remove(id)
            || o.cursors.remove(id)
    }
}
