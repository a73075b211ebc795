//! The warehouse store and its timed processes.
//!
//! A [`WarehouseStore`] is one aisle: its location table (inside a
//! [`StoreState`]), an input and an output [`Conveyor`], an input bay
//! [`ServicePoint`] shared by delivering vehicles, and a crane
//! [`ServicePoint`] serialising storage and retrieval cycles.
//!
//! Processes are `async` methods on `&self`, so a store behind an `Arc` can
//! run any number of them concurrently. State is only touched between
//! suspension points; the lock is never held across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};

use stowage_sim::{Ant, Conveyor, Environment, ServicePoint, SimError};
use stowage_types::{CaseContainer, LocationId, OperationId, StoreId, UnitLoad, UnitLoadId};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Rejected, StoreError};
use crate::handling::{ConstantSpeedCrane, HandlingModel};
use crate::location::{Depth, WarehouseLocation};
use crate::operation::InputOperation;
use crate::state::{Released, StoreState};

/// One automated aisle.
#[derive(Debug)]
pub struct WarehouseStore {
    id: StoreId,
    config: StoreConfig,
    depth: Depth,
    env: Environment,
    state: Mutex<StoreState>,
    input_conveyor: Conveyor<UnitLoad>,
    output_conveyor: Conveyor<UnitLoad>,
    input_service: ServicePoint,
    crane: ServicePoint,
    handling: Box<dyn HandlingModel>,
}

impl WarehouseStore {
    /// Build a store whose crane follows the configured constant speeds.
    ///
    /// # Errors
    ///
    /// Returns the validation error of an invalid `config`.
    pub fn new(env: Environment, config: StoreConfig) -> Result<Self, StoreError> {
        let crane = ConstantSpeedCrane::from_config(&config.crane);
        Self::with_handling(env, config, Box::new(crane))
    }

    /// Build a store with a custom crane timing model.
    ///
    /// # Errors
    ///
    /// Returns the validation error of an invalid `config`.
    pub fn with_handling(
        env: Environment,
        config: StoreConfig,
        handling: Box<dyn HandlingModel>,
    ) -> Result<Self, StoreError> {
        let state = StoreState::new(&config)?;
        let depth = state.depth();
        let name = config.name.clone();
        Ok(Self {
            id: StoreId::new(),
            depth,
            env,
            state: Mutex::new(state),
            input_conveyor: Conveyor::new(format!("{name}/input")),
            output_conveyor: Conveyor::new(format!("{name}/output")),
            input_service: ServicePoint::new(
                format!("{name}/input-bay"),
                config.input_service_capacity,
            ),
            crane: ServicePoint::new(format!("{name}/crane"), 1),
            handling,
            config,
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the store's state under its lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state())
    }

    // -------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------

    /// Unique identifier.
    pub const fn id(&self) -> StoreId {
        self.id
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Kind of unit load the store holds.
    pub const fn container(&self) -> CaseContainer {
        self.config.container
    }

    /// Locations per rack level.
    pub const fn n_positions(&self) -> u32 {
        self.config.n_positions
    }

    /// Rack levels.
    pub const fn n_floors(&self) -> u32 {
        self.config.n_floors
    }

    /// Positions per location.
    pub const fn depth(&self) -> Depth {
        self.depth
    }

    /// The store's configuration.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Fraction of positions holding a unit load.
    pub fn saturation(&self) -> f64 {
        self.state().saturation()
    }

    /// Vehicles waiting at the input bay.
    pub fn queue_len(&self) -> usize {
        self.input_service.queue_len()
    }

    /// Snapshot of one location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] for an unknown index.
    pub fn location(&self, id: LocationId) -> Result<WarehouseLocation, StoreError> {
        self.state().location(id).cloned()
    }

    // -------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------

    /// Nearest location that is empty and has nothing reserved.
    pub fn first_available_location(&self) -> Option<LocationId> {
        self.state().first_available_location()
    }

    /// Nearest empty location, or half-full location of the same product,
    /// for warm-up stock.
    pub fn first_available_location_for_warmup(&self, unit_load: &UnitLoad) -> Option<LocationId> {
        self.state().first_available_location_for_warmup(unit_load)
    }

    /// Reserve `location` for `unit_load`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's freeze
    /// error.
    pub fn book_location(&self, location: LocationId, unit_load: &UnitLoad) -> Result<(), StoreError> {
        let now = self.env.now();
        self.state().book_location(location, unit_load, now)
    }

    /// Release the reservation of `unit_load` at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or
    /// [`StoreError::NotFrozen`].
    pub fn unbook_location(&self, location: LocationId, unit_load: UnitLoadId) -> Result<(), StoreError> {
        self.state().unbook_location(location, unit_load)
    }

    /// Claim the stored `unit_load` at `location` for retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's booking
    /// error.
    pub fn book_pickup(&self, location: LocationId, unit_load: UnitLoadId) -> Result<(), StoreError> {
        let now = self.env.now();
        self.state().book_pickup(location, unit_load, now)
    }

    /// Register the intent to store `unit_load` at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] for an unknown target.
    pub fn create_input_operation(
        &self,
        unit_load: &UnitLoad,
        location: LocationId,
        priority: i32,
    ) -> Result<InputOperation, StoreError> {
        let now = self.env.now();
        self.state()
            .create_input_operation(unit_load, location, priority, now)
    }

    /// Place a unit load without any crane or conveyor timing.
    ///
    /// Used to seed stock before the simulation starts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationNotFound`] or the location's put
    /// error, with the load handed back.
    pub fn put_directly(&self, location: LocationId, unit_load: UnitLoad) -> Result<(), Rejected> {
        let now = self.env.now();
        self.state().put(location, unit_load, now)
    }

    /// Drop reservations and bookings older than the configured TTLs.
    pub fn release_stale(&self) -> Released {
        let now = self.env.now();
        let (reservation_ttl, booking_ttl) =
            (self.config.reservation_ttl(), self.config.booking_ttl());
        self.state()
            .release_stale(now, reservation_ttl, booking_ttl)
    }

    fn record_queue(&self) {
        let now = self.env.now();
        let queue_len = self.input_service.queue_len();
        self.state().record_queue(now, queue_len);
    }

    // -------------------------------------------------------------------
    // Input processes
    // -------------------------------------------------------------------

    /// Take the operation's unit load off `ant` at the input bay and place
    /// it on the input conveyor.
    ///
    /// The bay is requested at the operation's priority and held for the
    /// conveyor transfer time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OperationMismatch`] if the ant carries another
    /// load (which stays on the ant), or [`StoreError::Sim`] if the ant is
    /// empty or the bay is gone.
    pub async fn load_ant<A>(&self, ant: &mut A, operation: &InputOperation) -> Result<(), StoreError>
    where
        A: Ant + Send,
    {
        let grant = self.input_service.request(operation.priority).await?;
        self.record_queue();

        let unit_load = ant.unload().await?;
        if unit_load.id != operation.unit_load {
            let delivered = unit_load.id;
            ant.load(unit_load).await?;
            return Err(StoreError::OperationMismatch {
                expected: operation.unit_load,
                delivered,
            });
        }

        self.env.timeout(self.config.conveyor_transfer_time()).await;
        debug!(
            store = %self.config.name,
            ant = %ant.id(),
            unit_load = %unit_load.id,
            "Unit load on input conveyor"
        );
        self.input_conveyor.put(unit_load);

        drop(grant);
        self.record_queue();
        Ok(())
    }

    /// Move the operation's unit load from the input conveyor into its
    /// location.
    ///
    /// Waits for the load to reach the conveyor, then for the crane.
    ///
    /// # Errors
    ///
    /// If the load cannot be stored, the operation and its reservation are
    /// dropped and the load comes back inside [`Rejected`], together with
    /// [`StoreError::LocationNotFound`], the location's put error, or
    /// [`StoreError::Sim`] if the crane is gone.
    pub async fn put(&self, operation: &InputOperation) -> Result<(), Rejected> {
        let id = operation.unit_load;
        let unit_load = self.input_conveyor.get_where(|ul| ul.id == id).await;

        let stored = self.put_away(operation, unit_load).await;
        if let Err(rejected) = &stored {
            self.state().abandon_input_operation(operation.id);
            warn!(
                store = %self.config.name,
                location = %operation.location,
                unit_load = %id,
                error = %rejected.error,
                "Unit load rejected"
            );
        }
        stored
    }

    /// Crane cycle of [`put`](Self::put), run while holding the crane.
    async fn put_away(&self, operation: &InputOperation, unit_load: UnitLoad) -> Result<(), Rejected> {
        let crane = self.crane.request(operation.priority).await;
        let _crane = match crane {
            Ok(grant) => grant,
            Err(e) => return Err(Rejected::new(e.into(), unit_load)),
        };
        let travel = self
            .state()
            .location(operation.location)
            .map(|location| self.handling.storage_time(location));
        let travel = match travel {
            Ok(travel) => travel,
            Err(e) => return Err(Rejected::new(e, unit_load)),
        };
        self.env.timeout(travel).await;

        let id = unit_load.id;
        let now = self.env.now();
        {
            let mut state = self.state();
            state.put(operation.location, unit_load, now)?;
            // The load is stored; a missing operation record is not a rejection.
            if let Err(e) = state.complete_input_operation(operation.id) {
                warn!(store = %self.config.name, error = %e, "Input operation already retired");
            }
        }
        debug!(
            store = %self.config.name,
            location = %operation.location,
            unit_load = %id,
            "Unit load stored"
        );
        Ok(())
    }

    /// Full storage cycle for the load carried by `ant`: register the
    /// operation, unload the ant at the input bay, and put the load away at
    /// `location`.
    ///
    /// `location` is normally reserved beforehand with
    /// [`book_location`](Self::book_location).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sim`] if the ant is empty, or any error of
    /// [`load_ant`](Self::load_ant) and [`put`](Self::put). On failure the
    /// load is back on `ant`, the operation is dropped and the reservation
    /// at `location` is released, so the caller may retry elsewhere.
    pub async fn load<A>(&self, ant: &mut A, location: LocationId, priority: i32) -> Result<OperationId, StoreError>
    where
        A: Ant + Send,
    {
        let operation = {
            let unit_load = ant
                .unit_load()
                .ok_or_else(|| SimError::AntEmpty { ant: ant.id() })?;
            self.create_input_operation(unit_load, location, priority)?
        };
        if let Err(e) = self.load_ant(ant, &operation).await {
            self.state().abandon_input_operation(operation.id);
            return Err(e);
        }
        if let Err(rejected) = self.put(&operation).await {
            ant.load(*rejected.unit_load).await?;
            return Err(rejected.error);
        }
        Ok(operation.id)
    }

    // -------------------------------------------------------------------
    // Output processes
    // -------------------------------------------------------------------

    /// Fetch the booked `unit_load` from `location` and place it on the
    /// output conveyor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotBooked`] if the load has no pickup booking,
    /// the location's get error, or [`StoreError::Sim`] if the crane is
    /// gone. A failed retrieval drops its output operation and leaves the
    /// load and its pickup booking in place.
    pub async fn retrieve(&self, location: LocationId, unit_load: UnitLoadId, priority: i32) -> Result<(), StoreError> {
        let now = self.env.now();
        let operation = self
            .state()
            .create_output_operation(location, unit_load, priority, now)?;

        let fetched = self.fetch(location, unit_load, priority).await;
        let taken = match fetched {
            Ok(taken) => taken,
            Err(e) => {
                self.state().abandon_output_operation(operation.id);
                warn!(
                    store = %self.config.name,
                    %location,
                    %unit_load,
                    error = %e,
                    "Retrieval failed"
                );
                return Err(e);
            }
        };
        if let Err(e) = self.state().complete_output_operation(operation.id) {
            warn!(store = %self.config.name, error = %e, "Output operation already retired");
        }
        debug!(
            store = %self.config.name,
            %location,
            %unit_load,
            "Unit load on output conveyor"
        );
        self.output_conveyor.put(taken);
        Ok(())
    }

    /// Crane cycle of [`retrieve`](Self::retrieve).
    async fn fetch(&self, location: LocationId, unit_load: UnitLoadId, priority: i32) -> Result<UnitLoad, StoreError> {
        let _crane = self.crane.request(priority).await?;
        let travel = self
            .state()
            .location(location)
            .map(|stored| self.handling.retrieval_time(stored, unit_load))?;
        self.env.timeout(travel).await;

        let now = self.env.now();
        self.state().get(location, unit_load, now)
    }

    /// Hand `unit_load` from the output conveyor to `ant`.
    ///
    /// Waits until the load reaches the conveyor end.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sim`] if the ant is already loaded.
    pub async fn unload_ant<A>(&self, ant: &mut A, unit_load: UnitLoadId) -> Result<(), StoreError>
    where
        A: Ant + Send,
    {
        let taken = self.output_conveyor.get_where(|ul| ul.id == unit_load).await;
        self.env.timeout(self.config.conveyor_transfer_time()).await;
        ant.load(taken).await?;
        debug!(
            store = %self.config.name,
            ant = %ant.id(),
            %unit_load,
            "Unit load handed to ant"
        );
        Ok(())
    }

    /// Log a one-line summary of the store's state.
    pub fn log_summary(&self) {
        let state = self.state();
        info!(
            store = %self.config.name,
            container = %self.config.container,
            stored = state.n_unit_loads(),
            saturation = state.saturation(),
            saturation_samples = state.saturation_history().len(),
            queue_samples = state.queue_history().len(),
            "Store summary"
        );
    }
}
