//! Storage model of the Stowage warehouse simulation.
//!
//! Bottom-up: a [`PhysicalPosition`] holds at most one unit load; a
//! [`WarehouseLocation`] groups one or two positions behind each other and
//! runs the reservation (freeze / put) and pickup (book / get) protocols; a
//! [`WarehouseStore`] owns a distance-sorted table of locations and drives
//! the timed input and output processes through conveyors, an input bay and
//! a crane.
//!
//! # Modules
//!
//! - [`position`] -- Single storage slot.
//! - [`location`] -- Dual-depth locations, reservations, affinity.
//! - [`state`] -- Synchronous store bookkeeping and statistics.
//! - [`store`] -- The store and its async processes.
//! - [`operation`] -- Input and output operation records.
//! - [`handling`] -- Crane travel-time models.
//! - [`config`] -- Per-store configuration.
//! - [`error`] -- Error types for the storage model.

pub mod config;
pub mod error;
pub mod handling;
pub mod location;
pub mod operation;
pub mod position;
pub mod state;
pub mod store;

pub use config::{CraneConfig, StoreConfig};
pub use error::{Rejected, StoreError};
pub use handling::{ConstantSpeedCrane, HandlingModel};
pub use location::{Affinity, Depth, Reservation, WarehouseLocation};
pub use operation::{InputOperation, OutputOperation};
pub use position::PhysicalPosition;
pub use state::{Released, StoreState};
pub use store::WarehouseStore;
