//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and of the scenario
//! run so that `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: stowage_core::ConfigError,
    },

    /// The stores manager rejected an operation.
    #[error("manager error: {source}")]
    Manager {
        /// The underlying manager error.
        #[from]
        source: stowage_core::ManagerError,
    },

    /// A store process failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: stowage_store::StoreError,
    },

    /// A spawned simulation task panicked or was cancelled.
    #[error("task error: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
