//! Shared type definitions for the Stowage warehouse simulation.
//!
//! This crate is the single source of truth for the entities exchanged
//! between stores, vehicles and the stores manager.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers (UUID v7 newtypes and location indices)
//! - [`enums`] -- Aisle sides, case containers, inventory buckets
//! - [`structs`] -- Products, unit loads, picking requests

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CaseContainer, Inventory, Side};
pub use ids::{AntId, LocationId, OperationId, ProductId, StoreId, UnitLoadId};
pub use structs::{PickingRequest, Product, StockLevels, UnitLoad};
