//! Synchronous bookkeeping of one store.
//!
//! [`StoreState`] owns the location table and everything the store records
//! about it: in-flight operations, reservation and booking timestamps, and
//! the saturation and queue histories. Every method runs to completion
//! without suspending; [`crate::WarehouseStore`] wraps it in a mutex and
//! never holds the lock across an await point.

use std::collections::HashMap;
use std::time::Duration;

use stowage_types::{LocationId, OperationId, ProductId, Side, UnitLoad, UnitLoadId};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Rejected, StoreError};
use crate::location::{Depth, WarehouseLocation};
use crate::operation::{InputOperation, OutputOperation};

/// Reservations and bookings released by [`StoreState::release_stale`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Released {
    /// Unit loads whose reservation expired.
    pub reservations: Vec<UnitLoadId>,
    /// Unit loads whose pickup booking expired.
    pub bookings: Vec<UnitLoadId>,
}

impl Released {
    /// Whether nothing was released.
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.bookings.is_empty()
    }
}

/// Location table and statistics of one store.
#[derive(Debug)]
pub struct StoreState {
    locations: Vec<WarehouseLocation>,
    depth: Depth,
    input_operations: HashMap<OperationId, InputOperation>,
    output_operations: HashMap<OperationId, OutputOperation>,
    pending_inputs: HashMap<ProductId, usize>,
    reserved_at: HashMap<UnitLoadId, Duration>,
    booked_at: HashMap<UnitLoadId, Duration>,
    saturation_history: Vec<(Duration, f64)>,
    queue_history: Vec<(Duration, usize)>,
}

impl StoreState {
    /// Build the location grid described by `config`.
    ///
    /// Every `(x, y)` cell exists on both sides of the aisle. The table is
    /// sorted once by distance from the aisle origin, ties broken by
    /// `(x, y, side)`, and each location's id is its index in that order.
    ///
    /// # Errors
    ///
    /// Returns the validation error of an invalid `config`.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let depth = config.location_depth()?;
        let (width, height) = (config.location_width, config.location_height);

        let mut cells = Vec::new();
        for x in 0..config.n_positions {
            for y in 0..config.n_floors {
                for side in [Side::Left, Side::Right] {
                    let distance = (f64::from(x) * width).hypot(f64::from(y) * height);
                    cells.push((distance, x, y, side));
                }
            }
        }
        cells.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
        });

        let locations = cells
            .into_iter()
            .enumerate()
            .map(|(index, (_, x, y, side))| {
                WarehouseLocation::new(LocationId(index), x, y, side, depth, width, height)
            })
            .collect::<Vec<_>>();

        info!(
            store = %config.name,
            locations = locations.len(),
            depth = depth.positions(),
            "Store layout built"
        );

        Ok(Self {
            locations,
            depth,
            input_operations: HashMap::new(),
            output_operations: HashMap::new(),
            pending_inputs: HashMap::new(),
            reserved_at: HashMap::new(),
            booked_at: HashMap::new(),
            saturation_history: Vec::new(),
            queue_history: Vec::new(),
        })
    }

    // -------------------------------------------------------------------
    // Locations
    // -------------------------------------------------------------------

    /// All locations, nearest to the origin first.
    pub fn locations(&self) -> &[WarehouseLocation] {
        &self.locations
    }

    /// Location depth shared by the whole store.
    pub const fn depth(&self) -> Depth {
        self.depth
    }

    /// Look up a location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] for an index outside the
    /// table.
    pub fn location(&self, id: LocationId) -> Result<&WarehouseLocation, StoreError> {
        self.locations
            .get(id.index())
            .ok_or(StoreError::LocationNotFound(id))
    }

    fn location_mut(&mut self, id: LocationId) -> Result<&mut WarehouseLocation, StoreError> {
        self.locations
            .get_mut(id.index())
            .ok_or(StoreError::LocationNotFound(id))
    }

    /// Nearest location that is empty and has nothing reserved.
    pub fn first_available_location(&self) -> Option<LocationId> {
        self.locations
            .iter()
            .find(|location| location.is_empty() && location.future_unit_loads().is_empty())
            .map(WarehouseLocation::id)
    }

    /// Nearest location a warm-up load can go to: an empty location, or a
    /// half-full one already holding the same product.
    ///
    /// Locations whose remaining capacity is already reserved are skipped.
    pub fn first_available_location_for_warmup(&self, unit_load: &UnitLoad) -> Option<LocationId> {
        let depth = self.depth.positions();
        self.locations
            .iter()
            .filter(|location| location.committed() < depth)
            .find(|location| {
                location.is_empty()
                    || (location.is_half_full() && location.product() == Some(unit_load.product))
            })
            .map(WarehouseLocation::id)
    }

    /// Stored unit loads of `product` that are not booked for pickup, in
    /// location order. Within a location the front load comes first.
    pub fn output_candidates(
        &self,
        product: ProductId,
    ) -> impl Iterator<Item = (LocationId, &UnitLoad)> {
        self.locations.iter().flat_map(move |location| {
            [location.first_position(), location.second_position()]
                .into_iter()
                .filter_map(|position| position.unit_load())
                .filter(move |unit_load| {
                    unit_load.product == product && !location.is_booked(unit_load.id)
                })
                .map(|unit_load| (location.id(), unit_load))
        })
    }

    /// Cases of `product` physically stored.
    pub fn stored_cases(&self, product: ProductId) -> u32 {
        self.locations
            .iter()
            .flat_map(WarehouseLocation::unit_loads)
            .filter(|unit_load| unit_load.product == product)
            .map(|unit_load| unit_load.n_cases)
            .sum()
    }

    /// Unit loads physically stored.
    pub fn n_unit_loads(&self) -> usize {
        self.locations
            .iter()
            .map(WarehouseLocation::n_unit_loads)
            .sum()
    }

    /// Fraction of positions holding a unit load.
    #[allow(clippy::cast_precision_loss)]
    pub fn saturation(&self) -> f64 {
        let total = self.locations.len().saturating_mul(self.depth.positions());
        if total == 0 {
            return 0.0;
        }
        self.n_unit_loads() as f64 / total as f64
    }

    // -------------------------------------------------------------------
    // Reservation and pickup protocols
    // -------------------------------------------------------------------

    /// Reserve capacity at `location` for `unit_load`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's
    /// [`freeze`](WarehouseLocation::freeze) error.
    pub fn book_location(
        &mut self,
        location: LocationId,
        unit_load: &UnitLoad,
        now: Duration,
    ) -> Result<(), StoreError> {
        self.location_mut(location)?.freeze(unit_load)?;
        self.reserved_at.insert(unit_load.id, now);
        Ok(())
    }

    /// Release the reservation `unit_load` holds at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or
    /// [`StoreError::NotFrozen`].
    pub fn unbook_location(
        &mut self,
        location: LocationId,
        unit_load: UnitLoadId,
    ) -> Result<(), StoreError> {
        self.location_mut(location)?.unfreeze(unit_load)?;
        self.reserved_at.remove(&unit_load);
        Ok(())
    }

    /// Claim the stored `unit_load` at `location` for removal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's
    /// [`book_pickup`](WarehouseLocation::book_pickup) error.
    pub fn book_pickup(
        &mut self,
        location: LocationId,
        unit_load: UnitLoadId,
        now: Duration,
    ) -> Result<(), StoreError> {
        self.location_mut(location)?.book_pickup(unit_load)?;
        self.booked_at.insert(unit_load, now);
        Ok(())
    }

    /// Place `unit_load` at `location` and sample saturation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's
    /// [`put`](WarehouseLocation::put) error, with the load handed back.
    pub fn put(
        &mut self,
        location: LocationId,
        unit_load: UnitLoad,
        now: Duration,
    ) -> Result<(), Rejected> {
        let id = unit_load.id;
        match self.location_mut(location) {
            Ok(target) => target.put(unit_load)?,
            Err(e) => return Err(Rejected::new(e, unit_load)),
        }
        self.reserved_at.remove(&id);
        self.record_saturation(now);
        Ok(())
    }

    /// Remove the booked `unit_load` from `location` and sample saturation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's
    /// [`get`](WarehouseLocation::get) error.
    pub fn get(
        &mut self,
        location: LocationId,
        unit_load: UnitLoadId,
        now: Duration,
    ) -> Result<UnitLoad, StoreError> {
        let taken = self.location_mut(location)?.get(unit_load)?;
        self.booked_at.remove(&unit_load);
        self.record_saturation(now);
        Ok(taken)
    }

    /// Drop reservations and bookings older than their time-to-live.
    ///
    /// A `None` TTL keeps the corresponding entries forever.
    pub fn release_stale(
        &mut self,
        now: Duration,
        reservation_ttl: Option<Duration>,
        booking_ttl: Option<Duration>,
    ) -> Released {
        let expired = |since: Option<&Duration>, ttl: Option<Duration>| match (since, ttl) {
            (Some(since), Some(ttl)) => now.saturating_sub(*since) >= ttl,
            _ => false,
        };

        let mut released = Released::default();
        for location in &mut self.locations {
            let (reservations, bookings) = location.release_where(|unit_load, is_booking| {
                if is_booking {
                    expired(self.booked_at.get(&unit_load), booking_ttl)
                } else {
                    expired(self.reserved_at.get(&unit_load), reservation_ttl)
                }
            });
            released.reservations.extend(reservations);
            released.bookings.extend(bookings);
        }
        for unit_load in &released.reservations {
            self.reserved_at.remove(unit_load);
        }
        for unit_load in &released.bookings {
            self.booked_at.remove(unit_load);
        }
        if !released.is_empty() {
            debug!(
                reservations = released.reservations.len(),
                bookings = released.bookings.len(),
                "Stale claims released"
            );
        }
        released
    }

    // -------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------

    /// Register an input operation and count it as in flight for its
    /// product.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] for an unknown target.
    pub fn create_input_operation(
        &mut self,
        unit_load: &UnitLoad,
        location: LocationId,
        priority: i32,
        now: Duration,
    ) -> Result<InputOperation, StoreError> {
        self.location(location)?;
        let operation = InputOperation::new(unit_load, location, priority, now);
        let pending = self.pending_inputs.entry(operation.product).or_default();
        *pending = pending.saturating_add(1);
        self.input_operations.insert(operation.id, operation.clone());
        debug!(
            operation = %operation.id,
            unit_load = %unit_load.id,
            location = %location,
            priority,
            "Input operation created"
        );
        Ok(operation)
    }

    /// Retire a finished input operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OperationNotFound`] if it is not registered.
    pub fn complete_input_operation(
        &mut self,
        operation: OperationId,
    ) -> Result<InputOperation, StoreError> {
        let finished = self
            .input_operations
            .remove(&operation)
            .ok_or(StoreError::OperationNotFound(operation))?;
        if let Some(pending) = self.pending_inputs.get_mut(&finished.product) {
            *pending = pending.saturating_sub(1);
            if *pending == 0 {
                self.pending_inputs.remove(&finished.product);
            }
        }
        Ok(finished)
    }

    /// Drop an input operation whose unit load never reached its location,
    /// along with the reservation it held there.
    ///
    /// Returns the dropped operation, or `None` if it was not registered.
    pub fn abandon_input_operation(&mut self, operation: OperationId) -> Option<InputOperation> {
        let abandoned = self.complete_input_operation(operation).ok()?;
        if let Ok(location) = self.location_mut(abandoned.location)
            && location.unfreeze(abandoned.unit_load).is_ok()
        {
            self.reserved_at.remove(&abandoned.unit_load);
        }
        debug!(
            operation = %abandoned.id,
            unit_load = %abandoned.unit_load,
            location = %abandoned.location,
            "Input operation abandoned"
        );
        Some(abandoned)
    }

    /// Register an output operation for a booked unit load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] for an unknown location, or
    /// [`StoreError::NotBooked`] if the load has no pickup booking there.
    pub fn create_output_operation(
        &mut self,
        location: LocationId,
        unit_load: UnitLoadId,
        priority: i32,
        now: Duration,
    ) -> Result<OutputOperation, StoreError> {
        if !self.location(location)?.is_booked(unit_load) {
            return Err(StoreError::NotBooked {
                location,
                unit_load,
            });
        }
        let operation = OutputOperation::new(unit_load, location, priority, now);
        self.output_operations.insert(operation.id, operation.clone());
        Ok(operation)
    }

    /// Retire a finished output operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OperationNotFound`] if it is not registered.
    pub fn complete_output_operation(
        &mut self,
        operation: OperationId,
    ) -> Result<OutputOperation, StoreError> {
        self.output_operations
            .remove(&operation)
            .ok_or(StoreError::OperationNotFound(operation))
    }

    /// Drop an output operation whose unit load was never taken out.
    ///
    /// The pickup booking stays in place. Returns the dropped operation, or
    /// `None` if it was not registered.
    pub fn abandon_output_operation(&mut self, operation: OperationId) -> Option<OutputOperation> {
        let abandoned = self.output_operations.remove(&operation)?;
        debug!(
            operation = %abandoned.id,
            unit_load = %abandoned.unit_load,
            location = %abandoned.location,
            "Output operation abandoned"
        );
        Some(abandoned)
    }

    /// Input operations not yet completed.
    pub fn input_operations(&self) -> impl Iterator<Item = &InputOperation> {
        self.input_operations.values()
    }

    /// Output operations not yet completed.
    pub fn output_operations(&self) -> impl Iterator<Item = &OutputOperation> {
        self.output_operations.values()
    }

    /// Input operations in flight for `product`.
    pub fn pending_inputs(&self, product: ProductId) -> usize {
        self.pending_inputs.get(&product).copied().unwrap_or(0)
    }

    // -------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------

    fn record_saturation(&mut self, now: Duration) {
        let saturation = self.saturation();
        self.saturation_history.push((now, saturation));
    }

    /// Append a queue-length sample.
    pub fn record_queue(&mut self, now: Duration, queue_len: usize) {
        self.queue_history.push((now, queue_len));
    }

    /// `(time, saturation)` samples, one per put or get.
    pub fn saturation_history(&self) -> &[(Duration, f64)] {
        &self.saturation_history
    }

    /// `(time, queue length)` samples of the input service point.
    pub fn queue_history(&self) -> &[(Duration, usize)] {
        &self.queue_history
    }
}

#[cfg(test)]
mod tests {
    use stowage_types::CaseContainer;

    use super::*;

    fn small_config() -> StoreConfig {
        StoreConfig {
            n_positions: 3,
            n_floors: 2,
            ..StoreConfig::default()
        }
    }

    fn make_state() -> Result<StoreState, StoreError> {
        StoreState::new(&small_config())
    }

    fn make_load(product: ProductId) -> UnitLoad {
        UnitLoad::new(CaseContainer::Pallet, product, 20)
    }

    #[test]
    fn layout_is_sorted_by_distance() -> Result<(), StoreError> {
        let state = make_state()?;
        assert_eq!(state.locations().len(), 3 * 2 * 2);

        let origin_distance = |location: &WarehouseLocation| {
            let (dx, dy) = location.offset();
            dx.hypot(dy)
        };
        let distances = state
            .locations()
            .iter()
            .map(origin_distance)
            .collect::<Vec<_>>();
        assert!(distances.is_sorted_by(|a, b| a <= b));

        for (index, location) in state.locations().iter().enumerate() {
            assert_eq!(location.id(), LocationId(index));
        }
        let nearest = state.locations().iter().take(2).collect::<Vec<_>>();
        assert!(nearest.iter().all(|location| location.coordinates() == (0, 0)));
        assert_eq!(
            nearest.iter().map(|location| location.side()).collect::<Vec<_>>(),
            vec![Side::Left, Side::Right]
        );

        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StoreConfig {
            depth: 0,
            ..small_config()
        };
        assert!(matches!(
            StoreState::new(&config),
            Err(StoreError::InvalidDepth(0))
        ));
    }

    #[test]
    fn first_available_skips_reserved_and_occupied() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        assert_eq!(state.first_available_location(), Some(LocationId(0)));

        assert!(state.book_location(LocationId(0), &load, Duration::ZERO).is_ok());
        assert_eq!(state.first_available_location(), Some(LocationId(1)));

        assert!(state.put(LocationId(1), make_load(ProductId::new()), Duration::ZERO).is_ok());
        assert_eq!(state.first_available_location(), Some(LocationId(2)));

        Ok(())
    }

    #[test]
    fn warmup_consolidates_same_product() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let product = ProductId::new();
        assert!(state.put(LocationId(0), make_load(product), Duration::ZERO).is_ok());

        let same = make_load(product);
        assert_eq!(
            state.first_available_location_for_warmup(&same),
            Some(LocationId(0))
        );
        let other = make_load(ProductId::new());
        assert_eq!(
            state.first_available_location_for_warmup(&other),
            Some(LocationId(1))
        );

        Ok(())
    }

    #[test]
    fn unknown_location_is_reported() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let result = state.book_location(LocationId(999), &make_load(ProductId::new()), Duration::ZERO);
        assert!(matches!(result, Err(StoreError::LocationNotFound(LocationId(999)))));

        Ok(())
    }

    #[test]
    fn saturation_is_sampled_on_put_and_get() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        let id = load.id;
        assert!(state.put(LocationId(0), load, Duration::from_secs(1)).is_ok());
        assert!(state.book_pickup(LocationId(0), id, Duration::from_secs(2)).is_ok());
        assert!(state.get(LocationId(0), id, Duration::from_secs(3)).is_ok());

        let history = state.saturation_history();
        assert_eq!(history.len(), 2);
        let samples = history.iter().map(|(_, saturation)| *saturation).collect::<Vec<_>>();
        assert!(matches!(samples.as_slice(), [after_put, after_get]
            if (after_put - 1.0 / 24.0).abs() < 1e-12 && after_get.abs() < f64::EPSILON));

        Ok(())
    }

    #[test]
    fn pending_inputs_track_operations() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        let operation = state.create_input_operation(&load, LocationId(0), 10, Duration::ZERO);
        assert!(operation.is_ok());
        assert_eq!(state.pending_inputs(load.product), 1);

        let id = operation.map(|op| op.id).unwrap_or_default();
        assert!(state.complete_input_operation(id).is_ok());
        assert_eq!(state.pending_inputs(load.product), 0);
        assert!(matches!(
            state.complete_input_operation(id),
            Err(StoreError::OperationNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn abandoned_input_releases_reservation() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        state.book_location(LocationId(0), &load, Duration::ZERO)?;
        let operation = state.create_input_operation(&load, LocationId(0), 10, Duration::ZERO)?;

        let abandoned = state.abandon_input_operation(operation.id);
        assert_eq!(abandoned.map(|op| op.unit_load), Some(load.id));
        assert_eq!(state.pending_inputs(load.product), 0);
        assert_eq!(state.input_operations().count(), 0);
        assert!(
            state
                .location(LocationId(0))
                .is_ok_and(|location| location.future_unit_loads().is_empty())
        );
        assert!(state.abandon_input_operation(operation.id).is_none());

        Ok(())
    }

    #[test]
    fn abandoned_output_keeps_booking() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        let id = load.id;
        state.put(LocationId(0), load, Duration::ZERO)?;
        state.book_pickup(LocationId(0), id, Duration::ZERO)?;
        let operation = state.create_output_operation(LocationId(0), id, 0, Duration::ZERO)?;

        assert!(state.abandon_output_operation(operation.id).is_some());
        assert_eq!(state.output_operations().count(), 0);
        assert!(
            state
                .location(LocationId(0))
                .is_ok_and(|location| location.is_booked(id))
        );

        Ok(())
    }

    #[test]
    fn output_operation_requires_booking() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let load = make_load(ProductId::new());
        let id = load.id;
        assert!(state.put(LocationId(0), load, Duration::ZERO).is_ok());
        assert!(matches!(
            state.create_output_operation(LocationId(0), id, 0, Duration::ZERO),
            Err(StoreError::NotBooked { .. })
        ));
        assert!(state.book_pickup(LocationId(0), id, Duration::ZERO).is_ok());
        assert!(state.create_output_operation(LocationId(0), id, 0, Duration::ZERO).is_ok());

        Ok(())
    }

    #[test]
    fn output_candidates_skip_booked_and_other_products() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let product = ProductId::new();
        let first = make_load(product);
        let second = make_load(product);
        let (first_id, second_id) = (first.id, second.id);
        assert!(state.put(LocationId(0), first, Duration::ZERO).is_ok());
        assert!(state.put(LocationId(0), second, Duration::ZERO).is_ok());
        assert!(state.put(LocationId(1), make_load(ProductId::new()), Duration::ZERO).is_ok());

        let candidates = state
            .output_candidates(product)
            .map(|(_, unit_load)| unit_load.id)
            .collect::<Vec<_>>();
        // Front load first.
        assert_eq!(candidates, vec![second_id, first_id]);

        assert!(state.book_pickup(LocationId(0), second_id, Duration::ZERO).is_ok());
        let candidates = state
            .output_candidates(product)
            .map(|(_, unit_load)| unit_load.id)
            .collect::<Vec<_>>();
        assert_eq!(candidates, vec![first_id]);
        assert_eq!(state.stored_cases(product), 40);

        Ok(())
    }

    #[test]
    fn stale_reservations_and_bookings_are_released() -> Result<(), StoreError> {
        let mut state = make_state()?;
        let product = ProductId::new();
        let reserved = make_load(product);
        let stored = make_load(product);
        let stored_id = stored.id;

        assert!(state.book_location(LocationId(0), &reserved, Duration::ZERO).is_ok());
        assert!(state.put(LocationId(1), stored, Duration::ZERO).is_ok());
        assert!(state.book_pickup(LocationId(1), stored_id, Duration::from_secs(50)).is_ok());

        let ttl = Some(Duration::from_secs(60));

        // Nothing is released without a TTL.
        assert!(state.release_stale(Duration::from_secs(500), None, None).is_empty());

        let released = state.release_stale(Duration::from_secs(60), ttl, ttl);
        assert_eq!(released.reservations, vec![reserved.id]);
        assert!(released.bookings.is_empty());
        assert!(
            state
                .location(LocationId(0))
                .is_ok_and(|location| location.future_unit_loads().is_empty())
        );

        let released = state.release_stale(Duration::from_secs(110), ttl, ttl);
        assert_eq!(released.bookings, vec![stored_id]);
        assert!(
            state
                .location(LocationId(1))
                .is_ok_and(|location| !location.is_booked(stored_id))
        );
        Ok(())
    }
}
