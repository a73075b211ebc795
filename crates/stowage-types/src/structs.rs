//! Core entity structs: products, unit loads and picking requests.

use serde::{Deserialize, Serialize};

use crate::enums::CaseContainer;
use crate::ids::{LocationId, ProductId, UnitLoadId};

// ---------------------------------------------------------------------------
// Stock levels
// ---------------------------------------------------------------------------

/// A stock level expressed in cases, one value per case container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    /// Cases held in pallet stores.
    pub pallet: u32,
    /// Cases held in tray stores.
    pub tray: u32,
}

impl StockLevels {
    /// Build a level from explicit pallet and tray values.
    pub const fn new(pallet: u32, tray: u32) -> Self {
        Self { pallet, tray }
    }

    /// Return the level for one container kind.
    pub const fn get(&self, container: CaseContainer) -> u32 {
        match container {
            CaseContainer::Pallet => self.pallet,
            CaseContainer::Tray => self.tray,
        }
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A stock-keeping unit handled by the warehouse.
///
/// A full pallet of the product is `layers_per_pallet` layers of
/// `cases_per_layer` cases each; a tray carries exactly one layer.
/// Replenishment follows an (s, S) rule per container: once the inventory
/// position drops to `s_min`, enough pallets are ordered to bring it back
/// up to `s_max`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier.
    pub id: ProductId,
    /// Human-readable name.
    pub name: String,
    /// ABC family (demand class).
    pub family: String,
    /// Cases in one pallet layer.
    pub cases_per_layer: u32,
    /// Layers in one full pallet.
    pub layers_per_pallet: u32,
    /// Reorder point, in cases.
    pub s_min: StockLevels,
    /// Order-up-to level, in cases.
    pub s_max: StockLevels,
}

impl Product {
    /// Number of cases on one full pallet.
    pub const fn case_per_pallet(&self) -> u32 {
        self.cases_per_layer.saturating_mul(self.layers_per_pallet)
    }
}

// ---------------------------------------------------------------------------
// Unit load
// ---------------------------------------------------------------------------

/// A physical load that occupies exactly one storage position.
///
/// `location` is an index into the table of the store currently holding
/// the load. It is set by the location when the load is put away and
/// cleared when the load is retrieved; a load in transit has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLoad {
    /// Unique identifier.
    pub id: UnitLoadId,
    /// Pallet or tray.
    pub container: CaseContainer,
    /// The single product carried.
    pub product: ProductId,
    /// Cases currently on the load.
    pub n_cases: u32,
    /// Location currently holding the load, if stored.
    pub location: Option<LocationId>,
}

impl UnitLoad {
    /// Create a unit load with an explicit case count.
    pub fn new(container: CaseContainer, product: ProductId, n_cases: u32) -> Self {
        Self {
            id: UnitLoadId::new(),
            container,
            product,
            n_cases,
            location: None,
        }
    }

    /// Create a full pallet of `product`.
    pub fn pallet(product: &Product) -> Self {
        Self::new(CaseContainer::Pallet, product.id, product.case_per_pallet())
    }

    /// Create a tray carrying one layer of `product`.
    pub fn tray(product: &Product) -> Self {
        Self::new(CaseContainer::Tray, product.id, product.cases_per_layer)
    }

    /// Create a full unit load of `product` for the given container kind.
    pub fn for_container(container: CaseContainer, product: &Product) -> Self {
        match container {
            CaseContainer::Pallet => Self::pallet(product),
            CaseContainer::Tray => Self::tray(product),
        }
    }

    /// Pick up to `requested` cases off the load.
    ///
    /// Returns the number of cases actually removed.
    pub fn remove_cases(&mut self, requested: u32) -> u32 {
        let taken = requested.min(self.n_cases);
        self.n_cases = self.n_cases.saturating_sub(taken);
        taken
    }

    /// Whether the load is currently stored in a location.
    pub const fn is_stored(&self) -> bool {
        self.location.is_some()
    }
}

// ---------------------------------------------------------------------------
// Picking request
// ---------------------------------------------------------------------------

/// A request to pick a number of cases of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingRequest {
    /// The requested product.
    pub product: ProductId,
    /// Cases requested.
    pub n_cases: u32,
}
