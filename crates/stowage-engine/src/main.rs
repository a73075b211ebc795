//! Engine binary for the Stowage simulation.
//!
//! Wires the stores manager, the stores and the demand generator together
//! and runs one scenario on a paused tokio clock, so a simulated day
//! completes in well under a second of wall time.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as first argument, the
//!    `STOWAGE_CONFIG` variable, or `stowage-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the stores and the product catalogue
//! 4. Warm up, then run demand and replenishment to the horizon
//! 5. Log stock levels and the run summary

mod demand;
mod error;
mod scenario;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stowage_core::config::LoggingConfig;
use stowage_core::{SimulationConfig, StoresManager};
use stowage_sim::Environment;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file used when none is named.
const DEFAULT_CONFIG: &str = "stowage-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the stores cannot be
/// built, or the scenario fails.
#[tokio::main(flavor = "current_thread", start_paused = true)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    let source = source.map_or_else(|| "defaults".to_owned(), |path| path.display().to_string());
    info!(
        source = %source,
        stores = config.stores.len(),
        products = config.products.len(),
        seed = config.scenario.seed,
        horizon = ?config.scenario.horizon(),
        "stowage-engine starting"
    );

    // 3. Build stores and catalogue.
    let env = Environment::new();
    let manager = Arc::new(StoresManager::from_config(env, &config).map_err(EngineError::from)?);

    // 4. Run the scenario.
    let summary = scenario::run(Arc::clone(&manager), &config).await?;

    // 5. Log results.
    manager.log_summary();
    info!(
        end_time = ?summary.end_time,
        requests = summary.requests,
        served = summary.served,
        out_of_stock = summary.out_of_stock,
        pickups = summary.pickups,
        cases_picked = summary.cases_picked,
        orders = summary.orders,
        delivered = summary.delivered_unit_loads,
        failed = summary.failed_tasks,
        "Run complete"
    );
    let json = serde_json::to_string(&summary)?;
    info!(summary = %json, "stowage-engine shutdown complete");

    Ok(())
}

/// Load the configuration and report where it came from.
///
/// An explicitly named file must exist; the default file falls back to
/// built-in defaults when absent.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    let named = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("STOWAGE_CONFIG"))
        .map(PathBuf::from);
    if let Some(path) = named {
        let config = SimulationConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, Some(path.to_path_buf())))
    } else {
        Ok((SimulationConfig::default(), None))
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
