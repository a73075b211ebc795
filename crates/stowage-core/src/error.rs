//! Error types for the `stowage-core` crate.

use stowage_store::{Rejected, StoreError};
use stowage_types::{CaseContainer, ProductId, StoreId};

/// Errors raised by the stores manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Stored stock of the product cannot cover the picking request.
    #[error("out of stock: product {product} needs {requested} cases, {available} available")]
    OutOfStock {
        /// The requested product.
        product: ProductId,
        /// Cases requested.
        requested: u32,
        /// Unbooked cases stored across the candidate stores.
        available: u32,
    },

    /// The product is not part of the catalogue.
    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    /// The location policy found no location for the unit load.
    #[error("no location available in store {store} for product {product}")]
    NoLocation {
        /// Name of the store.
        store: String,
        /// Product of the unit load.
        product: ProductId,
    },

    /// No store handles this kind of unit load.
    #[error("no {container} store registered")]
    NoStore {
        /// The container kind.
        container: CaseContainer,
    },

    /// A store id does not belong to any registered store.
    #[error("unknown store: {0}")]
    UnknownStore(StoreId),

    /// A store operation failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },
}

impl From<Rejected> for ManagerError {
    fn from(rejected: Rejected) -> Self {
        StoreError::from(rejected).into()
    }
}
