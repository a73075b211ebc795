//! A single storage slot.

use stowage_types::UnitLoad;

use crate::error::{Rejected, StoreError};

/// One physical slot of a location, holding at most one unit load.
///
/// The position owns the stored load outright; it is moved in by
/// [`put`](Self::put) and moved back out by [`get`](Self::get).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalPosition {
    unit_load: Option<UnitLoad>,
}

impl PhysicalPosition {
    /// Create an empty position.
    pub const fn new() -> Self {
        Self { unit_load: None }
    }

    /// Store a unit load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PhysicalPositionBusy`], with the load handed
    /// back, if the slot is occupied.
    pub fn put(&mut self, unit_load: UnitLoad) -> Result<(), Rejected> {
        if self.busy() {
            return Err(Rejected::new(StoreError::PhysicalPositionBusy, unit_load));
        }
        self.unit_load = Some(unit_load);
        Ok(())
    }

    /// Remove and return the stored unit load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PhysicalPositionEmpty`] if the slot is empty.
    pub fn get(&mut self) -> Result<UnitLoad, StoreError> {
        self.unit_load.take().ok_or(StoreError::PhysicalPositionEmpty)
    }

    /// Whether the slot is empty.
    pub const fn free(&self) -> bool {
        self.unit_load.is_none()
    }

    /// Whether the slot is occupied.
    pub const fn busy(&self) -> bool {
        self.unit_load.is_some()
    }

    /// Cases on the stored load, 0 when empty.
    pub fn n_cases(&self) -> u32 {
        self.unit_load.as_ref().map_or(0, |unit_load| unit_load.n_cases)
    }

    /// The stored unit load, if any.
    pub const fn unit_load(&self) -> Option<&UnitLoad> {
        self.unit_load.as_ref()
    }
}
