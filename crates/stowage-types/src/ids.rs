//! Type-safe identifier wrappers.
//!
//! Entities that live independently of any store (products, unit loads,
//! vehicles, operations, stores) carry a UUID v7 newtype so identifiers of
//! different kinds cannot be mixed at compile time. Locations are different:
//! they never outlive their store, so a [`LocationId`] is a plain index into
//! the store's location table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a product (SKU).
    ProductId
}

define_id! {
    /// Unique identifier for a unit load (pallet or tray).
    UnitLoadId
}

define_id! {
    /// Unique identifier for a warehouse store.
    StoreId
}

define_id! {
    /// Unique identifier for a transport vehicle (ant).
    AntId
}

define_id! {
    /// Unique identifier for an input or output operation.
    OperationId
}

/// Index of a location inside its store's location table.
///
/// Location tables are sorted by distance from the store origin, so a
/// smaller index always means a location at least as close to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub usize);

impl LocationId {
    /// Return the table index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "L{}", self.0)
    }
}
