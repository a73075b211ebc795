//! Picking demand.
//!
//! Requests arrive as a Poisson process: exponential inter-arrival times
//! around the configured mean, a uniformly chosen product and a uniform
//! quantity between one case and `max_cases`. Requests of at least one
//! full layer are served from pallet stores, smaller ones from tray stores.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use stowage_core::config::ScenarioConfig;
use stowage_types::{CaseContainer, PickingRequest, Product, ProductId};

/// One generated picking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    /// Time since the previous request.
    pub delay: Duration,
    /// What is requested.
    pub request: PickingRequest,
    /// Preferred kind of store to serve it from.
    pub container: CaseContainer,
}

/// Seeded generator of [`Demand`].
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    rng: SmallRng,
    products: Vec<(ProductId, u32)>,
    mean_interval: Duration,
    max_cases: u32,
}

impl DemandGenerator {
    /// Create a generator over `products`.
    pub fn new(products: &[Product], scenario: &ScenarioConfig) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(scenario.seed),
            products: products
                .iter()
                .map(|product| (product.id, product.cases_per_layer))
                .collect(),
            mean_interval: scenario.mean_interval(),
            max_cases: scenario.max_cases.max(1),
        }
    }

    /// The next request, or `None` if there are no products.
    pub fn next_demand(&mut self) -> Option<Demand> {
        let &(product, cases_per_layer) = self.products.choose(&mut self.rng)?;
        let n_cases = self.rng.random_range(1..=self.max_cases);
        let container = if n_cases >= cases_per_layer {
            CaseContainer::Pallet
        } else {
            CaseContainer::Tray
        };
        Some(Demand {
            delay: self.interarrival(),
            request: PickingRequest { product, n_cases },
            container,
        })
    }

    fn interarrival(&mut self) -> Duration {
        let u: f64 = self.rng.random();
        let mean = self.mean_interval.as_secs_f64();
        Duration::try_from_secs_f64(-(-u).ln_1p() * mean).unwrap_or(self.mean_interval)
    }
}
