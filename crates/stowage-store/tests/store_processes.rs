//! Integration tests for the timed store processes.
//!
//! Every test runs on a paused tokio clock, so simulated delays complete
//! instantly and `Environment::now` reports exact virtual times.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use stowage_sim::{Ant, Environment, SimError, Vehicle};
use stowage_store::{InputOperation, StoreConfig, StoreError, WarehouseStore};
use stowage_types::{CaseContainer, LocationId, ProductId, UnitLoad};

const VEHICLE_HANDLING: Duration = Duration::from_secs(2);

/// 3 x 2 double-deep aisle, 5 s conveyor transfer, 10 s crane handling.
fn small_store(env: Environment) -> WarehouseStore {
    let mut config = StoreConfig {
        name: "test-aisle".to_owned(),
        n_positions: 3,
        n_floors: 2,
        ..StoreConfig::default()
    };
    config.crane.handling_ms = 10_000;
    config.conveyor_transfer_ms = 5_000;
    WarehouseStore::new(env, config).unwrap()
}

fn make_load(product: ProductId) -> UnitLoad {
    UnitLoad::new(CaseContainer::Pallet, product, 40)
}

#[tokio::test(start_paused = true)]
async fn load_cycle_stores_unit_load_in_reserved_location() {
    let env = Environment::new();
    let store = small_store(env);
    let load = make_load(ProductId::new());
    let id = load.id;

    let location = store.first_available_location().unwrap();
    assert_eq!(location, LocationId(0));
    store.book_location(location, &load).unwrap();

    let mut vehicle = Vehicle::carrying(env, VEHICLE_HANDLING, load);
    let operation = store.load(&mut vehicle, location, 10).await;
    assert!(operation.is_ok());

    // Unload 2 s, conveyor 5 s, crane cycle to the origin cell 10 s.
    assert_eq!(env.now(), Duration::from_secs(17));
    assert!(vehicle.unit_load().is_none());

    let stored = store.location(location).unwrap();
    assert!(stored.is_half_full());
    assert!(stored.contains(id));
    assert!(stored.future_unit_loads().is_empty());
    assert!(store.inspect(|state| state.input_operations().next().is_none()));
    assert!(store.saturation() > 0.0);
}

#[tokio::test(start_paused = true)]
async fn load_with_empty_ant_fails() {
    let env = Environment::new();
    let store = small_store(env);
    let mut vehicle = Vehicle::new(env, VEHICLE_HANDLING);

    let result = store.load(&mut vehicle, LocationId(0), 10).await;
    assert!(matches!(
        result,
        Err(StoreError::Sim {
            source: SimError::AntEmpty { .. }
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn load_ant_rejects_foreign_unit_load() {
    let env = Environment::new();
    let store = small_store(env);
    let expected = make_load(ProductId::new());
    let carried = make_load(ProductId::new());
    let carried_id = carried.id;

    let operation = store
        .create_input_operation(&expected, LocationId(0), 10)
        .unwrap();
    let mut vehicle = Vehicle::carrying(env, VEHICLE_HANDLING, carried);

    let result = store.load_ant(&mut vehicle, &operation).await;
    assert!(matches!(result, Err(StoreError::OperationMismatch { .. })));
    assert_eq!(vehicle.unit_load().map(|ul| ul.id), Some(carried_id));
}

/// Deliver one vehicle's load at the input bay and report when it finished.
async fn visit_bay(
    store: &WarehouseStore,
    env: Environment,
    vehicle: &mut Vehicle,
    operation: &InputOperation,
) -> Duration {
    store.load_ant(vehicle, operation).await.unwrap();
    env.now()
}

#[tokio::test(start_paused = true)]
async fn input_bay_serves_lower_priority_value_first() {
    let env = Environment::new();
    let store = small_store(env);
    let product = ProductId::new();

    let priorities = [5, 3, 1];
    let loads = priorities.map(|_| make_load(product));
    let operations = loads
        .iter()
        .zip(priorities)
        .enumerate()
        .map(|(index, (load, priority))| {
            store
                .create_input_operation(load, LocationId(index), priority)
                .unwrap()
        })
        .collect::<Vec<_>>();
    let [mut p5, mut p3, mut p1] =
        loads.map(|load| Vehicle::carrying(env, VEHICLE_HANDLING, load));

    let (done_p5, done_p3, done_p1) = tokio::join!(
        visit_bay(&store, env, &mut p5, &operations[0]),
        visit_bay(&store, env, &mut p3, &operations[1]),
        visit_bay(&store, env, &mut p1, &operations[2])
    );

    // Each bay visit holds the bay for 2 s unload plus 5 s transfer. The
    // first request finds the bay free; the others queue by priority.
    assert_eq!(done_p5, Duration::from_secs(7));
    assert_eq!(done_p1, Duration::from_secs(14));
    assert_eq!(done_p3, Duration::from_secs(21));

    let queue = store.inspect(|state| state.queue_history().to_vec());
    assert_eq!(queue.len(), 6);
    assert_eq!(queue.iter().map(|(_, len)| *len).max(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn retrieve_requires_booking() {
    let env = Environment::new();
    let store = small_store(env);
    let load = make_load(ProductId::new());
    let id = load.id;
    store.put_directly(LocationId(0), load).unwrap();

    let result = store.retrieve(LocationId(0), id, 0).await;
    assert!(matches!(result, Err(StoreError::NotBooked { .. })));
    assert_eq!(env.now(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn retrieve_and_unload_hand_over_to_ant() {
    let env = Environment::new();
    let store = Arc::new(small_store(env));
    let product = ProductId::new();
    let back = make_load(product);
    let front = make_load(product);
    let back_id = back.id;
    store.put_directly(LocationId(0), back).unwrap();
    store.put_directly(LocationId(0), front).unwrap();
    store.book_pickup(LocationId(0), back_id).unwrap();

    let mut vehicle = Vehicle::new(env, VEHICLE_HANDLING);
    let retrieving = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.retrieve(LocationId(0), back_id, 0).await })
    };
    let unloaded = store.unload_ant(&mut vehicle, back_id).await;
    assert!(unloaded.is_ok());
    assert!(retrieving.await.unwrap().is_ok());

    // Crane 10 s plus two shuffle handlings, conveyor 5 s, vehicle 2 s.
    assert_eq!(env.now(), Duration::from_secs(30 + 5 + 2));
    assert_eq!(vehicle.unit_load().map(|ul| ul.id), Some(back_id));
    assert_eq!(vehicle.unit_load().and_then(|ul| ul.location), None);

    let location = store.location(LocationId(0)).unwrap();
    assert!(location.is_half_full());
    assert!(location.booked_pickups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn crane_serialises_concurrent_retrievals() {
    let env = Environment::new();
    let store = Arc::new(small_store(env));
    let product = ProductId::new();

    let mut ids = Vec::new();
    for index in 0..2 {
        let load = make_load(product);
        ids.push(load.id);
        store.put_directly(LocationId(index), load).unwrap();
        store.book_pickup(LocationId(index), ids[index]).unwrap();
    }

    let (first, second) = tokio::join!(
        store.retrieve(LocationId(0), ids[0], 0),
        store.retrieve(LocationId(1), ids[1], 0)
    );
    assert!(first.is_ok() && second.is_ok());
    // Both cells sit at the aisle origin: two back-to-back 10 s cycles.
    assert_eq!(env.now(), Duration::from_secs(20));
    assert!(store.inspect(|state| state.n_unit_loads() == 0));
}

#[tokio::test(start_paused = true)]
async fn second_booking_of_same_unit_load_fails_fast() {
    let env = Environment::new();
    let store = small_store(env);
    let load = make_load(ProductId::new());
    let id = load.id;
    store.put_directly(LocationId(0), load).unwrap();

    assert!(store.book_pickup(LocationId(0), id).is_ok());
    assert!(matches!(
        store.book_pickup(LocationId(0), id),
        Err(StoreError::AlreadyBooked { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stale_reservation_is_released_after_ttl() {
    let env = Environment::new();
    let config = StoreConfig {
        n_positions: 2,
        n_floors: 1,
        reservation_ttl_ms: Some(60_000),
        ..StoreConfig::default()
    };
    let store = WarehouseStore::new(env, config).unwrap();
    let load = make_load(ProductId::new());
    store.book_location(LocationId(0), &load).unwrap();

    env.timeout(Duration::from_secs(30)).await;
    assert!(store.release_stale().is_empty());

    env.timeout(Duration::from_secs(30)).await;
    let released = store.release_stale();
    assert_eq!(released.reservations, vec![load.id]);
    assert_eq!(store.first_available_location(), Some(LocationId(0)));
}

#[tokio::test(start_paused = true)]
async fn rejected_put_hands_unit_load_back_for_redirect() {
    let env = Environment::new();
    let store = small_store(env);
    let load = make_load(ProductId::new());
    let (id, product) = (load.id, load.product);

    // The reservation does not bind the product of an empty location, so
    // another product can take it while the reserved load is on its way.
    store.book_location(LocationId(0), &load).unwrap();
    store
        .put_directly(LocationId(0), make_load(ProductId::new()))
        .unwrap();

    let mut vehicle = Vehicle::carrying(env, VEHICLE_HANDLING, load);
    let result = store.load(&mut vehicle, LocationId(0), 10).await;
    assert!(matches!(result, Err(StoreError::IncompatibleUnitLoad { .. })));

    assert_eq!(vehicle.unit_load().map(|ul| ul.id), Some(id));
    assert_eq!(store.inspect(|state| state.pending_inputs(product)), 0);
    assert!(store.inspect(|state| state.input_operations().next().is_none()));
    let rejected_at = store.location(LocationId(0)).unwrap();
    assert!(rejected_at.future_unit_loads().is_empty());
    assert!(!rejected_at.contains(id));

    store.book_location(LocationId(1), vehicle.unit_load().unwrap()).unwrap();
    assert!(store.load(&mut vehicle, LocationId(1), 10).await.is_ok());
    assert!(store.location(LocationId(1)).unwrap().contains(id));
    assert!(vehicle.unit_load().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_retrieval_drops_output_operation() {
    let env = Environment::new();
    let config = StoreConfig {
        n_positions: 2,
        n_floors: 1,
        booking_ttl_ms: Some(1_000),
        ..StoreConfig::default()
    };
    let store = WarehouseStore::new(env, config).unwrap();
    let load = make_load(ProductId::new());
    let id = load.id;
    store.put_directly(LocationId(0), load).unwrap();
    store.book_pickup(LocationId(0), id).unwrap();

    // The booking expires while the crane is on its way.
    let (retrieved, released) = tokio::join!(store.retrieve(LocationId(0), id, 0), async {
        env.timeout(Duration::from_secs(5)).await;
        store.release_stale()
    });
    assert_eq!(released.bookings, vec![id]);
    assert!(matches!(retrieved, Err(StoreError::NothingBooked { .. })));

    assert!(store.inspect(|state| state.output_operations().next().is_none()));
    assert!(store.location(LocationId(0)).unwrap().contains(id));
}
