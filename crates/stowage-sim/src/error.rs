//! Error types for the `stowage-sim` crate.

use stowage_types::{AntId, UnitLoadId};

/// Errors raised by the discrete-event collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The vehicle already carries a unit load.
    #[error("ant {ant} already carries unit load {unit_load}")]
    AntLoaded {
        /// The vehicle.
        ant: AntId,
        /// The load it carries.
        unit_load: UnitLoadId,
    },

    /// The vehicle carries nothing to hand over.
    #[error("ant {ant} carries no unit load")]
    AntEmpty {
        /// The vehicle.
        ant: AntId,
    },

    /// A pending service point request lost its grant channel.
    #[error("service point {name} closed before granting the request")]
    ServicePointClosed {
        /// Name of the service point.
        name: String,
    },
}
