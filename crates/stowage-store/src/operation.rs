//! Input and output operation records.
//!
//! An operation is the hand-off between allocation (which picked a location
//! and reserved or booked it) and the timed processes that physically move
//! the unit load. The store keeps every in-flight operation until the load
//! reaches its location (input) or leaves it (output).

use std::time::Duration;

use stowage_types::{LocationId, OperationId, ProductId, UnitLoad, UnitLoadId};

/// A unit load on its way into a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOperation {
    /// Unique identifier.
    pub id: OperationId,
    /// The unit load being stored.
    pub unit_load: UnitLoadId,
    /// Its product.
    pub product: ProductId,
    /// Its cases.
    pub n_cases: u32,
    /// Target location.
    pub location: LocationId,
    /// Scheduling priority, lower is served first.
    pub priority: i32,
    /// Simulated time the operation was created.
    pub created_at: Duration,
}

impl InputOperation {
    /// Record the intent to store `unit_load` at `location`.
    pub fn new(unit_load: &UnitLoad, location: LocationId, priority: i32, now: Duration) -> Self {
        Self {
            id: OperationId::new(),
            unit_load: unit_load.id,
            product: unit_load.product,
            n_cases: unit_load.n_cases,
            location,
            priority,
            created_at: now,
        }
    }
}

/// A booked unit load on its way out of a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOperation {
    /// Unique identifier.
    pub id: OperationId,
    /// The unit load being retrieved.
    pub unit_load: UnitLoadId,
    /// Source location.
    pub location: LocationId,
    /// Scheduling priority, lower is served first.
    pub priority: i32,
    /// Simulated time the operation was created.
    pub created_at: Duration,
}

impl OutputOperation {
    /// Record the intent to retrieve `unit_load` from `location`.
    pub fn new(unit_load: UnitLoadId, location: LocationId, priority: i32, now: Duration) -> Self {
        Self {
            id: OperationId::new(),
            unit_load,
            location,
            priority,
            created_at: now,
        }
    }
}
