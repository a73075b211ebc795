//! Allocation policies.
//!
//! A [`LocationPolicy`] picks where an incoming unit load goes; a
//! [`UnitLoadPolicy`] picks which stored unit loads serve a picking
//! request. Both only read store state; the manager applies the decision.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stowage_store::{StoreState, WarehouseStore};
use stowage_types::{LocationId, ProductId, StoreId, UnitLoadId};

use crate::error::ManagerError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Chooses a storage location for a unit load of `product`.
pub trait LocationPolicy: Debug + Send + Sync {
    /// The chosen location, or `None` if the store has no room for it.
    fn select(&self, state: &StoreState, product: ProductId) -> Option<LocationId>;
}

/// Prefer locations already holding or expecting the product, then empty
/// ones; the nearest location wins among equals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestAffinity;

impl LocationPolicy for ClosestAffinity {
    fn select(&self, state: &StoreState, product: ProductId) -> Option<LocationId> {
        state
            .locations()
            .iter()
            .map(|location| (location.affinity(product), location))
            .filter(|(affinity, _)| affinity.is_usable())
            .min_by_key(|(affinity, _)| *affinity)
            .map(|(_, location)| location.id())
    }
}

/// The nearest empty location with nothing reserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl LocationPolicy for FirstAvailable {
    fn select(&self, state: &StoreState, _product: ProductId) -> Option<LocationId> {
        state.first_available_location()
    }
}

/// Location policy named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicyKind {
    /// [`ClosestAffinity`].
    #[default]
    ClosestAffinity,
    /// [`FirstAvailable`].
    FirstAvailable,
}

impl LocationPolicyKind {
    /// Instantiate the policy.
    pub fn build(self) -> Box<dyn LocationPolicy> {
        match self {
            Self::ClosestAffinity => Box::new(ClosestAffinity),
            Self::FirstAvailable => Box::new(FirstAvailable),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A stored unit load chosen to serve a picking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    /// Store holding the load.
    pub store: StoreId,
    /// Location holding the load.
    pub location: LocationId,
    /// The load.
    pub unit_load: UnitLoadId,
    /// Cases on the load.
    pub n_cases: u32,
}

/// Chooses stored unit loads covering `quantity` cases of `product`.
pub trait UnitLoadPolicy: Debug + Send + Sync {
    /// Unit loads to book, in retrieval order.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::OutOfStock`] if the unbooked stock in
    /// `stores` cannot cover `quantity`.
    fn select(
        &self,
        stores: &[Arc<WarehouseStore>],
        product: ProductId,
        quantity: u32,
    ) -> Result<Vec<Pickup>, ManagerError>;
}

/// Take unbooked loads store by store, nearest location first, until the
/// requested quantity is covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFirst;

impl UnitLoadPolicy for NearestFirst {
    fn select(
        &self,
        stores: &[Arc<WarehouseStore>],
        product: ProductId,
        quantity: u32,
    ) -> Result<Vec<Pickup>, ManagerError> {
        let mut pickups = Vec::new();
        let mut covered = 0_u32;
        if quantity == 0 {
            return Ok(pickups);
        }

        for store in stores {
            let store_id = store.id();
            store.inspect(|state| {
                for (location, unit_load) in state.output_candidates(product) {
                    if covered >= quantity {
                        break;
                    }
                    pickups.push(Pickup {
                        store: store_id,
                        location,
                        unit_load: unit_load.id,
                        n_cases: unit_load.n_cases,
                    });
                    covered = covered.saturating_add(unit_load.n_cases);
                }
            });
            if covered >= quantity {
                return Ok(pickups);
            }
        }

        Err(ManagerError::OutOfStock {
            product,
            requested: quantity,
            available: covered,
        })
    }
}

/// Unit-load policy named in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitLoadPolicyKind {
    /// [`NearestFirst`].
    #[default]
    NearestFirst,
}

impl UnitLoadPolicyKind {
    /// Instantiate the policy.
    pub fn build(self) -> Box<dyn UnitLoadPolicy> {
        match self {
            Self::NearestFirst => Box::new(NearestFirst),
        }
    }
}
