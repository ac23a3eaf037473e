//! Error types for the table engine.
//!
//! Only genuinely exceptional conditions become errors. Out-of-range indices
//! and empty selections degrade to skips, partial counts or `None` sentinels
//! at the operation that saw them; a write refused by a lock is a named
//! condition the caller can explain to the user.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// The target cell sits inside an active lock range. Carries the lock's
    /// note (if any) so the caller can surface the reason.
    #[error("Cell ({row}, {col}) is locked")]
    CellLocked {
        row: usize,
        col: usize,
        note: Option<String>,
    },

    /// The document declares a schema version this build does not understand.
    /// Continuing would corrupt state, so opening fails loudly.
    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(i64),

    #[error("Failed to decode: {0}")]
    Decode(String),

    #[error("Failed to apply update: {0}")]
    ApplyUpdate(String),
}
