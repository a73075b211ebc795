//! Scenario run on the simulation clock.
//!
//! A run warms the stores up, then replays generated picking demand until
//! the request budget or the horizon is exhausted. Every booked pickup is
//! retrieved by its own vehicle; whatever is left on the load after picking
//! goes back into storage. Replenishment orders, raised by stock drops or
//! by the periodic review, are delivered after the configured lead time.
//!
//! Pickups and deliveries run as spawned tasks and finish after the
//! horizon if they are still in flight when it is reached. When a store
//! sets a reservation or booking time-to-live, a sweep releases stale
//! claims until the horizon.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stowage_core::{ManagerError, Pickup, ReplenishmentOrder, SimulationConfig, StoresManager};
use stowage_sim::{Ant, SimError, Vehicle};
use stowage_store::{StoreError, WarehouseStore};
use stowage_types::{CaseContainer, LocationId, PickingRequest, UnitLoad};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::demand::DemandGenerator;
use crate::error::EngineError;

/// Crane and input bay priority of retrievals.
pub const OUTPUT_PRIORITY: i32 = 0;

/// Final state of one store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    /// Store name.
    pub name: String,
    /// Kind of unit load held.
    pub container: CaseContainer,
    /// Unit loads stored at the end of the run.
    pub unit_loads: usize,
    /// Fraction of positions in use at the end of the run.
    pub saturation: f64,
}

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Simulated time when the last task finished.
    pub end_time: Duration,
    /// Unit loads placed by the warm-up.
    pub warmup_unit_loads: u64,
    /// Picking requests generated.
    pub requests: u64,
    /// Requests for which every unit load could be booked.
    pub served: u64,
    /// Requests rejected for lack of stock.
    pub out_of_stock: u64,
    /// Unit loads retrieved for picking.
    pub pickups: u64,
    /// Cases picked off retrieved loads.
    pub cases_picked: u64,
    /// Partially picked loads sent back into storage.
    pub returned_unit_loads: u64,
    /// Replenishment orders placed.
    pub orders: u64,
    /// Unit loads stored by replenishment deliveries.
    pub delivered_unit_loads: u64,
    /// Pickups or deliveries that failed.
    pub failed_tasks: u64,
    /// Location reservations released after their time-to-live.
    pub released_reservations: u64,
    /// Pickup bookings released after their time-to-live.
    pub released_bookings: u64,
    /// Per-store end state.
    pub stores: Vec<StoreSummary>,
}

#[derive(Debug, Clone, Copy)]
struct PickOutcome {
    picked: u32,
    returned: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SweepStats {
    reservations: u64,
    bookings: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct DeliveryStats {
    orders: u64,
    delivered: u64,
    failed: u64,
}

/// Run the scenario described by `config` against `manager`.
///
/// # Errors
///
/// Returns [`EngineError::Manager`] if the warm-up fails or a picking
/// request is rejected for a reason other than missing stock, and
/// [`EngineError::Task`] if the order dispatcher dies.
#[allow(clippy::too_many_lines)]
pub async fn run(
    manager: Arc<StoresManager>,
    config: &SimulationConfig,
) -> Result<RunSummary, EngineError> {
    let env = manager.env();
    let handling = config.scenario.vehicle_handling();
    let horizon = config.scenario.horizon();

    let warmup = manager.warmup()?;

    let (sink, orders) = mpsc::unbounded_channel();
    let periodic = config.replenishment.enabled.then(|| {
        let manager = Arc::clone(&manager);
        let sink = sink.clone();
        let interval = config.replenishment.interval();
        tokio::spawn(async move { manager.periodic_replenishment(interval, sink).await })
    });
    let sweep = sweep_period(&manager).map(|period| {
        tokio::spawn(sweep_stale(Arc::clone(&manager), period, horizon))
    });
    let dispatcher = tokio::spawn(dispatch_orders(
        Arc::clone(&manager),
        orders,
        config.replenishment.lead_time(),
        handling,
    ));

    let mut summary = RunSummary {
        warmup_unit_loads: warmup.unit_loads,
        ..RunSummary::default()
    };
    let mut pickups = JoinSet::new();
    let mut generator = DemandGenerator::new(manager.products(), &config.scenario);

    for _ in 0..config.scenario.n_requests {
        let Some(demand) = generator.next_demand() else {
            break;
        };
        if env.now().saturating_add(demand.delay) > horizon {
            break;
        }
        env.timeout(demand.delay).await;
        summary.requests = summary.requests.saturating_add(1);

        let container = serving_container(&manager, demand.container);
        match manager.unload(container, &demand.request) {
            Ok(plan) => {
                summary.served = summary.served.saturating_add(1);
                for order in plan.orders {
                    if sink.send(order).is_err() {
                        warn!(product = %order.product, "Order dispatcher gone, order dropped");
                    }
                }
                for pickup in plan.pickups {
                    pickups.spawn(pick(
                        Arc::clone(&manager),
                        pickup,
                        demand.request,
                        handling,
                    ));
                }
            }
            Err(ManagerError::OutOfStock {
                product,
                requested,
                available,
            }) => {
                summary.out_of_stock = summary.out_of_stock.saturating_add(1);
                debug!(%product, requested, available, "Picking request out of stock");
            }
            Err(e) => return Err(e.into()),
        }

        while let Some(joined) = pickups.try_join_next() {
            record_pick(&mut summary, joined);
        }
    }

    env.timeout_until(horizon).await;
    info!(time = ?env.now(), requests = summary.requests, "Demand finished");

    if let Some(handle) = periodic {
        handle.abort();
        if let Err(e) = handle.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Periodic review task failed");
        }
    }
    drop(sink);
    if let Some(handle) = sweep {
        let released = handle.await.map_err(|e| EngineError::Task {
            message: e.to_string(),
        })?;
        summary.released_reservations = released.reservations;
        summary.released_bookings = released.bookings;
    }

    while let Some(joined) = pickups.join_next().await {
        record_pick(&mut summary, joined);
    }
    let deliveries = dispatcher.await.map_err(|e| EngineError::Task {
        message: e.to_string(),
    })?;
    summary.orders = deliveries.orders;
    summary.delivered_unit_loads = deliveries.delivered;
    summary.failed_tasks = summary.failed_tasks.saturating_add(deliveries.failed);

    summary.end_time = env.now();
    summary.stores = manager
        .all_stores()
        .map(|store| StoreSummary {
            name: store.name().to_owned(),
            container: store.container(),
            unit_loads: store.inspect(stowage_store::StoreState::n_unit_loads),
            saturation: store.saturation(),
        })
        .collect();
    Ok(summary)
}

/// `preferred` if a store of that kind exists, otherwise the other kind.
fn serving_container(manager: &StoresManager, preferred: CaseContainer) -> CaseContainer {
    if !manager.stores(preferred).is_empty() {
        return preferred;
    }
    match preferred {
        CaseContainer::Pallet => CaseContainer::Tray,
        CaseContainer::Tray => CaseContainer::Pallet,
    }
}

/// The least saturated store of `container`.
fn input_store(manager: &StoresManager, container: CaseContainer) -> Option<Arc<WarehouseStore>> {
    manager
        .stores(container)
        .iter()
        .min_by(|a, b| a.saturation().total_cmp(&b.saturation()))
        .cloned()
}

/// Store the load carried by `vehicle` in `first`, or in another store of
/// the same kind if `first` turns it away.
async fn store_carried(
    manager: &StoresManager,
    first: &Arc<WarehouseStore>,
    vehicle: &mut Vehicle,
) -> Result<LocationId, ManagerError> {
    let others = manager
        .stores(first.container())
        .iter()
        .filter(|store| store.id() != first.id());
    let mut last_error = None;
    for store in std::iter::once(first).chain(others) {
        match manager.load(store, vehicle).await {
            Ok(location) => return Ok(location),
            Err(e) => {
                warn!(store = %store.name(), error = %e, "Unit load turned away");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or(ManagerError::NoStore {
        container: first.container(),
    }))
}

/// Shortest non-zero time-to-live configured on any store.
fn sweep_period(manager: &StoresManager) -> Option<Duration> {
    manager
        .all_stores()
        .flat_map(|store| [store.config().reservation_ttl(), store.config().booking_ttl()])
        .flatten()
        .filter(|ttl| !ttl.is_zero())
        .min()
}

/// Release stale reservations and bookings in every store once per
/// `period`, up to `horizon`.
async fn sweep_stale(manager: Arc<StoresManager>, period: Duration, horizon: Duration) -> SweepStats {
    let env = manager.env();
    let mut stats = SweepStats::default();
    loop {
        let next = env.now().saturating_add(period);
        if next > horizon {
            break;
        }
        env.timeout_until(next).await;

        for store in manager.all_stores() {
            let released = store.release_stale();
            if released.is_empty() {
                continue;
            }
            info!(
                store = %store.name(),
                reservations = ?released.reservations,
                bookings = ?released.bookings,
                "Stale claims released"
            );
            stats.reservations = stats.reservations.saturating_add(count(&released.reservations));
            stats.bookings = stats.bookings.saturating_add(count(&released.bookings));
        }
    }
    stats
}

fn count<T>(items: &[T]) -> u64 {
    u64::try_from(items.len()).unwrap_or(u64::MAX)
}

fn flatten<T>(joined: Result<Result<T, EngineError>, JoinError>) -> Result<T, EngineError> {
    joined.map_err(|e| EngineError::Task {
        message: e.to_string(),
    })?
}

fn record_pick(
    summary: &mut RunSummary,
    joined: Result<Result<PickOutcome, EngineError>, JoinError>,
) {
    match flatten(joined) {
        Ok(outcome) => {
            summary.pickups = summary.pickups.saturating_add(1);
            summary.cases_picked = summary.cases_picked.saturating_add(u64::from(outcome.picked));
            if outcome.returned {
                summary.returned_unit_loads = summary.returned_unit_loads.saturating_add(1);
            }
        }
        Err(e) => {
            warn!(error = %e, "Pickup failed");
            summary.failed_tasks = summary.failed_tasks.saturating_add(1);
        }
    }
}

/// Retrieve one booked load, pick from it, and store the remainder again.
///
/// If the retrieval fails while the load is still stored, its stock is
/// restored before the error is reported.
async fn pick(
    manager: Arc<StoresManager>,
    pickup: Pickup,
    request: PickingRequest,
    handling: Duration,
) -> Result<PickOutcome, EngineError> {
    let env = manager.env();
    let store = Arc::clone(manager.store(pickup.store)?);
    let mut vehicle = Vehicle::new(env, handling);

    let retrieved = tokio::try_join!(
        store.retrieve(pickup.location, pickup.unit_load, OUTPUT_PRIORITY),
        store.unload_ant(&mut vehicle, pickup.unit_load),
    );
    if let Err(e) = retrieved {
        let still_stored = store
            .location(pickup.location)
            .is_ok_and(|location| location.contains(pickup.unit_load));
        if still_stored {
            manager.restore_pickup(&pickup, &request)?;
        }
        return Err(e.into());
    }

    let mut unit_load = vehicle
        .take_cargo()
        .ok_or_else(|| StoreError::from(SimError::AntEmpty { ant: vehicle.id() }))?;
    let picked = unit_load.remove_cases(request.n_cases);
    debug!(
        store = %store.name(),
        unit_load = %unit_load.id,
        picked,
        remaining = unit_load.n_cases,
        "Unit load picked"
    );

    if unit_load.n_cases == 0 {
        return Ok(PickOutcome {
            picked,
            returned: false,
        });
    }
    let mut returning = Vehicle::carrying(env, handling, unit_load);
    store_carried(&manager, &store, &mut returning).await?;
    Ok(PickOutcome {
        picked,
        returned: true,
    })
}

/// Turn every received order into a delivery task; wait for all of them
/// once the channel closes.
async fn dispatch_orders(
    manager: Arc<StoresManager>,
    mut orders: mpsc::UnboundedReceiver<ReplenishmentOrder>,
    lead_time: Duration,
    handling: Duration,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    let mut deliveries = JoinSet::new();

    while let Some(order) = orders.recv().await {
        stats.orders = stats.orders.saturating_add(1);
        deliveries.spawn(deliver(Arc::clone(&manager), order, lead_time, handling));
        while let Some(joined) = deliveries.try_join_next() {
            record_delivery(&mut stats, joined);
        }
    }
    while let Some(joined) = deliveries.join_next().await {
        record_delivery(&mut stats, joined);
    }
    stats
}

fn record_delivery(
    stats: &mut DeliveryStats,
    joined: Result<Result<(u64, u64), EngineError>, JoinError>,
) {
    match flatten(joined) {
        Ok((delivered, failed)) => {
            stats.delivered = stats.delivered.saturating_add(delivered);
            stats.failed = stats.failed.saturating_add(failed);
        }
        Err(e) => {
            warn!(error = %e, "Delivery failed");
            stats.failed = stats.failed.saturating_add(1);
        }
    }
}

/// Wait out the lead time, then bring the ordered unit loads into the
/// least saturated store of the ordered kind.
///
/// Pallet orders arrive as pallets; tray orders arrive as one tray per
/// pallet layer. Returns the loads stored and the loads that failed.
async fn deliver(
    manager: Arc<StoresManager>,
    order: ReplenishmentOrder,
    lead_time: Duration,
    handling: Duration,
) -> Result<(u64, u64), EngineError> {
    let env = manager.env();
    env.timeout(lead_time).await;

    let product = manager.product(order.product)?.clone();
    let store = input_store(&manager, order.container).ok_or(ManagerError::NoStore {
        container: order.container,
    })?;
    let per_pallet = match order.container {
        CaseContainer::Pallet => 1,
        CaseContainer::Tray => product.layers_per_pallet,
    };

    let arrivals = (0..order.n_pallets.saturating_mul(per_pallet)).map(|_| {
        let mut vehicle = Vehicle::carrying(
            env,
            handling,
            UnitLoad::for_container(order.container, &product),
        );
        let manager = &manager;
        let store = &store;
        async move { store_carried(manager, store, &mut vehicle).await }
    });

    let mut delivered = 0_u64;
    let mut failed = 0_u64;
    for result in futures::future::join_all(arrivals).await {
        match result {
            Ok(_) => delivered = delivered.saturating_add(1),
            Err(e) => {
                warn!(store = %store.name(), error = %e, "Delivered unit load not stored");
                failed = failed.saturating_add(1);
            }
        }
    }
    info!(
        product = %product.name,
        container = %order.container,
        store = %store.name(),
        delivered,
        "Replenishment delivered"
    );
    Ok((delivered, failed))
}
