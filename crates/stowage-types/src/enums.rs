//! Enumeration types for the Stowage warehouse simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rack geometry
// ---------------------------------------------------------------------------

/// Which side of the aisle a storage location sits on.
///
/// Stores are modelled as a single aisle served by one crane, with racks
/// on both sides. The `Origin` side is reserved for the fixed reference
/// location (the input/output point) from which all distances are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Rack on the left of the aisle.
    Left,
    /// Rack on the right of the aisle.
    Right,
    /// The store's input/output point.
    Origin,
}

// ---------------------------------------------------------------------------
// Case containers
// ---------------------------------------------------------------------------

/// The kind of unit load a store handles.
///
/// Pallet stores (unit-load AS/RS) hold full pallets; tray stores
/// (shuttle-based AVS/RS) hold single-layer trays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseContainer {
    /// A full pallet (all layers of a product).
    Pallet,
    /// A tray carrying one layer of cases.
    Tray,
}

impl CaseContainer {
    /// All container kinds, in a fixed order.
    pub const ALL: [Self; 2] = [Self::Pallet, Self::Tray];
}

impl core::fmt::Display for CaseContainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pallet => f.write_str("pallet"),
            Self::Tray => f.write_str("tray"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stock accounting
// ---------------------------------------------------------------------------

/// The two inventory buckets tracked per product and container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inventory {
    /// Cases physically stored in a warehouse location.
    OnHand,
    /// Cases ordered or travelling but not yet stored.
    OnTransit,
}
