//! Error types for the `stowage-store` crate.
//!
//! Every precondition violation of the location protocols surfaces as its
//! own variant, immediately, to the caller. Nothing in this crate retries.

use stowage_sim::SimError;
use stowage_types::{LocationId, OperationId, ProductId, UnitLoad, UnitLoadId};

/// Errors that can occur while operating on positions, locations and stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unit load was put into an occupied physical position.
    #[error("physical position is busy")]
    PhysicalPositionBusy,

    /// A unit load was taken from an empty physical position.
    #[error("physical position is empty")]
    PhysicalPositionEmpty,

    /// A unit load was put into a full location.
    #[error("location {location} is full")]
    LocationBusy {
        /// The full location.
        location: LocationId,
    },

    /// A unit load was taken from a location without stock.
    #[error("location {location} is empty")]
    LocationEmpty {
        /// The empty location.
        location: LocationId,
    },

    /// The unit load's product differs from the product already stored.
    #[error("location {location} holds product {stored}, cannot accept product {incoming}")]
    IncompatibleUnitLoad {
        /// The location.
        location: LocationId,
        /// Product already stored there.
        stored: ProductId,
        /// Product of the rejected unit load.
        incoming: ProductId,
    },

    /// Stored plus reserved unit loads already fill the location.
    #[error("location {location} has no capacity left to reserve (depth {depth})")]
    OverReserved {
        /// The location.
        location: LocationId,
        /// Number of positions in the location.
        depth: usize,
    },

    /// The unit load holds no reservation at this location.
    #[error("unit load {unit_load} is not frozen at location {location}")]
    NotFrozen {
        /// The location.
        location: LocationId,
        /// The unit load.
        unit_load: UnitLoadId,
    },

    /// Every position of the location is already booked for pickup.
    #[error("location {location} is fully booked (depth {depth})")]
    FullyBooked {
        /// The location.
        location: LocationId,
        /// Number of positions in the location.
        depth: usize,
    },

    /// The unit load is already booked for pickup.
    #[error("unit load {unit_load} is already booked at location {location}")]
    AlreadyBooked {
        /// The location.
        location: LocationId,
        /// The unit load.
        unit_load: UnitLoadId,
    },

    /// A pickup was attempted at a location with no bookings at all.
    #[error("location {location} has no booked pickups")]
    NothingBooked {
        /// The location.
        location: LocationId,
    },

    /// The unit load was not booked before being picked up.
    #[error("unit load {unit_load} was not booked at location {location}")]
    NotBooked {
        /// The location.
        location: LocationId,
        /// The unit load.
        unit_load: UnitLoadId,
    },

    /// A pickup was booked for a unit load not physically stored here.
    #[error("unit load {unit_load} is not stored at location {location}")]
    NotStored {
        /// The location.
        location: LocationId,
        /// The unit load.
        unit_load: UnitLoadId,
    },

    /// The requested unit load is in neither position of the location.
    #[error("unit load {unit_load} not found at location {location}")]
    UnitLoadNotFound {
        /// The location.
        location: LocationId,
        /// The unit load.
        unit_load: UnitLoadId,
    },

    /// No location with this index exists in the store.
    #[error("location not found: {0}")]
    LocationNotFound(LocationId),

    /// A location depth other than 1 or 2 was requested.
    #[error("invalid location depth {0}, expected 1 or 2")]
    InvalidDepth(u8),

    /// The store configuration is inconsistent.
    #[error("invalid store configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// No operation with this identifier is registered.
    #[error("operation not found: {0}")]
    OperationNotFound(OperationId),

    /// The vehicle delivered a different unit load than the operation names.
    #[error("operation expected unit load {expected}, ant delivered {delivered}")]
    OperationMismatch {
        /// The unit load named by the operation.
        expected: UnitLoadId,
        /// The unit load the vehicle handed over.
        delivered: UnitLoadId,
    },

    /// A discrete-event collaborator failed.
    #[error("simulation error: {source}")]
    Sim {
        /// The underlying collaborator error.
        #[from]
        source: SimError,
    },
}

/// A unit load the store could not put away, handed back to the caller.
///
/// The store has already dropped the input operation and the load's
/// reservation, so the load can be redirected to another location.
#[derive(Debug, thiserror::Error)]
#[error("unit load {} not stored: {error}", .unit_load.id)]
pub struct Rejected {
    /// Why the load was refused.
    #[source]
    pub error: StoreError,
    /// The refused load.
    pub unit_load: Box<UnitLoad>,
}

impl Rejected {
    /// Pair `error` with the load it refused.
    pub fn new(error: StoreError, unit_load: UnitLoad) -> Self {
        Self {
            error,
            unit_load: Box::new(unit_load),
        }
    }
}

impl From<Rejected> for StoreError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}
