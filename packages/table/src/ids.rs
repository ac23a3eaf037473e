//! Stable identifiers for table structure.
//!
//! Columns, rows and locks are addressed by opaque UUIDs so that display
//! position and logical identity stay decoupled: a rename mutates a field,
//! a reorder mutates an order sequence, and neither invalidates references
//! held by other replicas. Ids are never reused after a delete.
//!
//! The string form doubles as the key inside the replicated maps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh, globally unique id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(
    /// Permanent identity of a column. Survives rename, resize and reorder.
    ColumnId
);

define_id!(
    /// Permanent identity of a row. Survives cell edits and reordering.
    RowId
);

define_id!(
    /// Identity of a lock range, used to release it later.
    LockId
);
