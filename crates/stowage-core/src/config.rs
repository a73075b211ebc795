//! Configuration loading and typed config structures for the Stowage
//! simulation.
//!
//! The canonical configuration lives in `stowage-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file describes a complete run.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use stowage_store::StoreConfig;
use stowage_types::{CaseContainer, Product, ProductId, StockLevels};

use crate::policy::{LocationPolicyKind, UnitLoadPolicyKind};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible run.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `stowage-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Stores to build, in registration order.
    #[serde(default = "default_stores")]
    pub stores: Vec<StoreConfig>,

    /// Product catalogue.
    #[serde(default = "default_products")]
    pub products: Vec<ProductConfig>,

    /// Allocation policies.
    #[serde(default)]
    pub policies: PolicyConfig,

    /// Reorder behaviour.
    #[serde(default)]
    pub replenishment: ReplenishmentConfig,

    /// Demand generation and run length.
    #[serde(default)]
    pub scenario: ScenarioConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stores: default_stores(),
            products: default_products(),
            policies: PolicyConfig::default(),
            replenishment: ReplenishmentConfig::default(),
            scenario: ScenarioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the simulation cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for store in &self.stores {
            store.validate().map_err(|source| ConfigError::Invalid {
                reason: source.to_string(),
            })?;
        }
        for product in &self.products {
            product.validate()?;
        }
        if self.replenishment.enabled && self.replenishment.interval_ms == 0 {
            return Err(invalid("replenishment.interval_ms must be positive"));
        }
        if self.scenario.mean_interval_ms == 0 {
            return Err(invalid("scenario.mean_interval_ms must be positive"));
        }
        if self.scenario.max_cases == 0 {
            return Err(invalid("scenario.max_cases must be positive"));
        }
        Ok(())
    }

    /// Stores handling `container`.
    pub fn stores_for(&self, container: CaseContainer) -> impl Iterator<Item = &StoreConfig> {
        self.stores
            .iter()
            .filter(move |store| store.container == container)
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductConfig {
    /// Human-readable name.
    pub name: String,

    /// ABC family (demand class).
    #[serde(default = "default_family")]
    pub family: String,

    /// Cases in one pallet layer (and on one tray).
    #[serde(default = "default_cases_per_layer")]
    pub cases_per_layer: u32,

    /// Layers in one full pallet.
    #[serde(default = "default_layers_per_pallet")]
    pub layers_per_pallet: u32,

    /// Reorder point per container, in cases.
    #[serde(default = "default_s_min")]
    pub s_min: StockLevels,

    /// Order-up-to level per container, in cases.
    #[serde(default = "default_s_max")]
    pub s_max: StockLevels,
}

impl ProductConfig {
    /// Check pallet geometry and stock levels.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty pallet or a reorder
    /// point above the order-up-to level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cases_per_layer == 0 || self.layers_per_pallet == 0 {
            return Err(ConfigError::Invalid {
                reason: format!("product {}: a pallet must hold at least one case", self.name),
            });
        }
        for container in CaseContainer::ALL {
            if self.s_min.get(container) > self.s_max.get(container) {
                return Err(ConfigError::Invalid {
                    reason: format!(
                        "product {}: {container} s_min exceeds s_max",
                        self.name
                    ),
                });
            }
        }
        Ok(())
    }

    /// Build the catalogue product with a fresh id.
    pub fn to_product(&self) -> Product {
        Product {
            id: ProductId::new(),
            name: self.name.clone(),
            family: self.family.clone(),
            cases_per_layer: self.cases_per_layer,
            layers_per_pallet: self.layers_per_pallet,
            s_min: self.s_min,
            s_max: self.s_max,
        }
    }
}

/// Which allocation policies the stores manager uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// Policy placing incoming unit loads.
    #[serde(default)]
    pub location: LocationPolicyKind,

    /// Policy choosing unit loads for picking requests.
    #[serde(default)]
    pub unit_load: UnitLoadPolicyKind,
}

/// Reorder behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplenishmentConfig {
    /// Whether the periodic review process runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between periodic reviews.
    #[serde(default = "default_replenishment_interval_ms")]
    pub interval_ms: u64,

    /// Time from order to the replenishment vehicle reaching the store.
    #[serde(default = "default_lead_time_ms")]
    pub lead_time_ms: u64,
}

impl ReplenishmentConfig {
    /// Time between periodic reviews.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Order lead time.
    pub const fn lead_time(&self) -> Duration {
        Duration::from_millis(self.lead_time_ms)
    }
}

impl Default for ReplenishmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_replenishment_interval_ms(),
            lead_time_ms: default_lead_time_ms(),
        }
    }
}

/// Demand generation and run length.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioConfig {
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Picking requests to generate.
    #[serde(default = "default_n_requests")]
    pub n_requests: u32,

    /// Mean time between picking requests.
    #[serde(default = "default_mean_interval_ms")]
    pub mean_interval_ms: u64,

    /// Upper bound of the cases asked by one request.
    #[serde(default = "default_max_cases")]
    pub max_cases: u32,

    /// Simulated time after which the run stops.
    #[serde(default = "default_horizon_ms")]
    pub horizon_ms: u64,

    /// Vehicle load and unload handling time.
    #[serde(default = "default_vehicle_handling_ms")]
    pub vehicle_handling_ms: u64,
}

impl ScenarioConfig {
    /// Mean time between picking requests.
    pub const fn mean_interval(&self) -> Duration {
        Duration::from_millis(self.mean_interval_ms)
    }

    /// Run length.
    pub const fn horizon(&self) -> Duration {
        Duration::from_millis(self.horizon_ms)
    }

    /// Vehicle handling time.
    pub const fn vehicle_handling(&self) -> Duration {
        Duration::from_millis(self.vehicle_handling_ms)
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            n_requests: default_n_requests(),
            mean_interval_ms: default_mean_interval_ms(),
            max_cases: default_max_cases(),
            horizon_ms: default_horizon_ms(),
            vehicle_handling_ms: default_vehicle_handling_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_stores() -> Vec<StoreConfig> {
    vec![
        StoreConfig {
            name: "pallet-aisle".to_owned(),
            container: CaseContainer::Pallet,
            ..StoreConfig::default()
        },
        StoreConfig {
            name: "tray-aisle".to_owned(),
            container: CaseContainer::Tray,
            n_positions: 30,
            n_floors: 10,
            location_height: 0.4,
            ..StoreConfig::default()
        },
    ]
}

fn default_products() -> Vec<ProductConfig> {
    [("Mineral water 6x1.5L", "A"), ("Pasta 12x500g", "B"), ("Olive oil 6x1L", "C")]
        .into_iter()
        .map(|(name, family)| ProductConfig {
            name: name.to_owned(),
            family: family.to_owned(),
            cases_per_layer: default_cases_per_layer(),
            layers_per_pallet: default_layers_per_pallet(),
            s_min: default_s_min(),
            s_max: default_s_max(),
        })
        .collect()
}

fn default_family() -> String {
    "A".to_owned()
}

const fn default_cases_per_layer() -> u32 {
    8
}

const fn default_layers_per_pallet() -> u32 {
    5
}

const fn default_s_min() -> StockLevels {
    StockLevels::new(40, 16)
}

const fn default_s_max() -> StockLevels {
    StockLevels::new(120, 48)
}

const fn default_true() -> bool {
    true
}

const fn default_replenishment_interval_ms() -> u64 {
    // 8 h
    28_800_000
}

const fn default_lead_time_ms() -> u64 {
    // 30 min
    1_800_000
}

const fn default_seed() -> u64 {
    42
}

const fn default_n_requests() -> u32 {
    200
}

const fn default_mean_interval_ms() -> u64 {
    // 5 min
    300_000
}

const fn default_max_cases() -> u32 {
    12
}

const fn default_horizon_ms() -> u64 {
    // 24 h
    86_400_000
}

const fn default_vehicle_handling_ms() -> u64 {
    3_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
