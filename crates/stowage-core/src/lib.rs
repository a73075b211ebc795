//! Stores manager and stock control for the Stowage simulation.
//!
//! This crate coordinates every store of the warehouse: it chooses where
//! incoming unit loads go and which stored loads serve a picking request,
//! keeps the on-hand and on-transit stock of every product, and raises
//! replenishment orders under an (s, S) rule with an optional periodic
//! review.
//!
//! # Modules
//!
//! - [`manager`] -- [`StoresManager`]: input, output, replenishment and
//!   warm-up across all stores.
//! - [`policy`] -- Location and unit-load allocation policies.
//! - [`stock`] -- Stock ledger with per-change history.
//! - [`config`] -- Configuration loading from `stowage-config.yaml` into
//!   strongly-typed structs.
//! - [`error`] -- Error types for the manager.

pub mod config;
pub mod error;
pub mod manager;
pub mod policy;
pub mod stock;

pub use config::{ConfigError, SimulationConfig};
pub use error::ManagerError;
pub use manager::{INPUT_PRIORITY, ReplenishmentOrder, StoresManager, UnloadPlan, WarmupReport};
pub use policy::{
    ClosestAffinity, FirstAvailable, LocationPolicy, NearestFirst, Pickup, UnitLoadPolicy,
};
pub use stock::{StockEntry, StockLedger, StockSample};
