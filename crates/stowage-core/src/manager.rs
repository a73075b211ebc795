//! The stores manager.
//!
//! [`StoresManager`] sits above every [`WarehouseStore`] of the warehouse.
//! All stock movements go through it so that the [`StockLedger`] always
//! reflects what is stored and what is on its way, and so that
//! replenishment can be triggered the moment stock drops too low.
//!
//! Stores are grouped by the kind of unit load they hold. Pallet stores and
//! tray stores keep separate stock levels and separate reorder points.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stowage_sim::{Ant, Environment, SimError};
use stowage_store::{StoreError, WarehouseStore};
use stowage_types::{
    CaseContainer, Inventory, LocationId, PickingRequest, Product, ProductId, StoreId, UnitLoad,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::ManagerError;
use crate::policy::{LocationPolicy, Pickup, UnitLoadPolicy};
use crate::stock::{StockEntry, StockLedger, StockSample};

/// Service point priority of replenishment inputs.
pub const INPUT_PRIORITY: i32 = 10;

/// Unit loads to order to bring one product back to its order-up-to level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplenishmentOrder {
    /// The product.
    pub product: ProductId,
    /// The container kind to refill.
    pub container: CaseContainer,
    /// Full pallets ordered.
    pub n_pallets: u32,
    /// Cases ordered (`n_pallets` full pallets).
    pub n_cases: u64,
    /// Raised by the periodic review rather than by a stock drop.
    pub periodic: bool,
}

/// Outcome of [`StoresManager::unload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnloadPlan {
    /// Booked unit loads, in retrieval order.
    pub pickups: Vec<Pickup>,
    /// Replenishment triggered by the stock drop.
    pub orders: Vec<ReplenishmentOrder>,
}

/// Stock placed by [`StoresManager::warmup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Unit loads stored.
    pub unit_loads: u64,
    /// Cases stored.
    pub cases: u64,
}

/// Owner of the stores, the product catalogue and the stock ledger.
#[derive(Debug)]
pub struct StoresManager {
    env: Environment,
    products: Vec<Product>,
    stores: BTreeMap<CaseContainer, Vec<Arc<WarehouseStore>>>,
    ledger: Mutex<StockLedger>,
    location_policy: Box<dyn LocationPolicy>,
    unit_load_policy: Box<dyn UnitLoadPolicy>,
}

impl StoresManager {
    /// Create a manager with no stores.
    pub fn new(
        env: Environment,
        products: Vec<Product>,
        location_policy: Box<dyn LocationPolicy>,
        unit_load_policy: Box<dyn UnitLoadPolicy>,
    ) -> Self {
        Self {
            env,
            products,
            stores: BTreeMap::new(),
            ledger: Mutex::new(StockLedger::new()),
            location_policy,
            unit_load_policy,
        }
    }

    /// Build the catalogue, the policies and every configured store.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] if a store configuration is invalid.
    pub fn from_config(env: Environment, config: &SimulationConfig) -> Result<Self, ManagerError> {
        let products = config
            .products
            .iter()
            .map(crate::config::ProductConfig::to_product)
            .collect();
        let mut manager = Self::new(
            env,
            products,
            config.policies.location.build(),
            config.policies.unit_load.build(),
        );
        for store_config in &config.stores {
            let store = WarehouseStore::new(env, store_config.clone())?;
            manager.register(Arc::new(store));
        }
        Ok(manager)
    }

    /// Add a store; it is grouped with the stores of the same container.
    pub fn register(&mut self, store: Arc<WarehouseStore>) {
        info!(
            store = %store.name(),
            container = %store.container(),
            "Store registered"
        );
        self.stores.entry(store.container()).or_default().push(store);
    }

    fn ledger(&self) -> MutexGuard<'_, StockLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------

    /// The simulation clock.
    pub const fn env(&self) -> Environment {
        self.env
    }

    /// The product catalogue.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownProduct`] if it is not catalogued.
    pub fn product(&self, id: ProductId) -> Result<&Product, ManagerError> {
        self.products
            .iter()
            .find(|product| product.id == id)
            .ok_or(ManagerError::UnknownProduct(id))
    }

    /// Stores holding `container` unit loads, in registration order.
    pub fn stores(&self, container: CaseContainer) -> &[Arc<WarehouseStore>] {
        self.stores.get(&container).map_or(&[], Vec::as_slice)
    }

    /// Every store, pallet stores first.
    pub fn all_stores(&self) -> impl Iterator<Item = &Arc<WarehouseStore>> {
        self.stores.values().flatten()
    }

    /// Look up a store by id.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownStore`] if it is not registered.
    pub fn store(&self, id: StoreId) -> Result<&Arc<WarehouseStore>, ManagerError> {
        self.all_stores()
            .find(|store| store.id() == id)
            .ok_or(ManagerError::UnknownStore(id))
    }

    // -------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------

    /// Add `delta` cases to one stock bucket.
    pub fn update_stock(
        &self,
        product: ProductId,
        container: CaseContainer,
        inventory: Inventory,
        delta: i64,
    ) {
        let now = self.env.now();
        self.ledger()
            .update(product, container, inventory, delta, now);
    }

    /// Current stock levels.
    pub fn stock(&self, product: ProductId, container: CaseContainer) -> StockEntry {
        self.ledger().entry(product, container)
    }

    /// On hand plus on transit.
    pub fn inventory_position(&self, product: ProductId, container: CaseContainer) -> i64 {
        self.ledger().inventory_position(product, container)
    }

    /// Every stock change so far.
    pub fn stock_history(&self) -> Vec<StockSample> {
        self.ledger().history().to_vec()
    }

    // -------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------

    /// Choose a location for `unit_load` in `store` and reserve it.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoLocation`] if the location policy finds no
    /// room, or [`ManagerError::Store`] if the reservation fails.
    pub fn get_location_for_unit_load(
        &self,
        store: &WarehouseStore,
        unit_load: &UnitLoad,
    ) -> Result<LocationId, ManagerError> {
        let location = store
            .inspect(|state| self.location_policy.select(state, unit_load.product))
            .ok_or_else(|| ManagerError::NoLocation {
                store: store.name().to_owned(),
                product: unit_load.product,
            })?;
        store.book_location(location, unit_load)?;
        Ok(location)
    }

    /// Store the unit load carried by `ant`, which waits in front of
    /// `store`.
    ///
    /// The load's cases move from on transit to on hand as soon as the
    /// location is reserved; the store then runs its input cycle at
    /// [`INPUT_PRIORITY`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Store`] if the ant is empty or a store
    /// process fails, or [`ManagerError::NoLocation`] if the store is full.
    /// A load the store turns away is back on `ant` and its cases are on
    /// transit again.
    pub async fn load<A>(&self, store: &WarehouseStore, ant: &mut A) -> Result<LocationId, ManagerError>
    where
        A: Ant + Send,
    {
        let unit_load = ant
            .unit_load()
            .cloned()
            .ok_or_else(|| StoreError::from(SimError::AntEmpty { ant: ant.id() }))?;
        let location = self.get_location_for_unit_load(store, &unit_load)?;

        let container = store.container();
        let n_cases = i64::from(unit_load.n_cases);
        self.update_stock(unit_load.product, container, Inventory::OnTransit, n_cases.saturating_neg());
        self.update_stock(unit_load.product, container, Inventory::OnHand, n_cases);

        if let Err(e) = store.load(ant, location, INPUT_PRIORITY).await {
            self.update_stock(unit_load.product, container, Inventory::OnHand, n_cases.saturating_neg());
            self.update_stock(unit_load.product, container, Inventory::OnTransit, n_cases);
            return Err(e.into());
        }
        debug!(
            store = %store.name(),
            %location,
            unit_load = %unit_load.id,
            "Replenishment stored"
        );
        Ok(location)
    }

    // -------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------

    /// Book the unit loads that serve `request` from the `container` stores.
    ///
    /// Does not start any retrieval; the caller runs
    /// [`WarehouseStore::retrieve`] for each pickup. Each booked load
    /// leaves on-hand stock; whatever it carries beyond the requested
    /// quantity is counted on transit until it comes back. Replenishment is
    /// checked after every pickup.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownProduct`], [`ManagerError::NoStore`],
    /// [`ManagerError::OutOfStock`], or [`ManagerError::Store`] if a
    /// booking fails.
    pub fn unload(
        &self,
        container: CaseContainer,
        request: &PickingRequest,
    ) -> Result<UnloadPlan, ManagerError> {
        let product = self.product(request.product)?;
        let stores = self.stores(container);
        if stores.is_empty() {
            return Err(ManagerError::NoStore { container });
        }

        let pickups = self
            .unit_load_policy
            .select(stores, request.product, request.n_cases)?;

        let mut orders = Vec::new();
        for pickup in &pickups {
            self.store(pickup.store)?
                .book_pickup(pickup.location, pickup.unit_load)?;

            let leftover = pickup.n_cases.saturating_sub(request.n_cases);
            self.update_stock(product.id, container, Inventory::OnTransit, i64::from(leftover));
            self.update_stock(
                product.id,
                container,
                Inventory::OnHand,
                i64::from(pickup.n_cases).saturating_neg(),
            );

            if let Some(order) = self.check_replenishment(product, container, false) {
                orders.push(order);
            }
        }

        debug!(
            product = %product.name,
            %container,
            requested = request.n_cases,
            pickups = pickups.len(),
            "Picking request booked"
        );
        Ok(UnloadPlan { pickups, orders })
    }

    /// Undo the stock movement [`unload`](Self::unload) made for `pickup`
    /// when its unit load never left the location, for instance because
    /// the booking expired before the crane got there.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownStore`] if the pickup's store is not
    /// registered.
    pub fn restore_pickup(&self, pickup: &Pickup, request: &PickingRequest) -> Result<(), ManagerError> {
        let container = self.store(pickup.store)?.container();
        let leftover = pickup.n_cases.saturating_sub(request.n_cases);
        self.update_stock(request.product, container, Inventory::OnHand, i64::from(pickup.n_cases));
        self.update_stock(
            request.product,
            container,
            Inventory::OnTransit,
            i64::from(leftover).saturating_neg(),
        );
        debug!(
            store = %pickup.store,
            location = %pickup.location,
            unit_load = %pickup.unit_load,
            "Pickup restored to stock"
        );
        Ok(())
    }

    // -------------------------------------------------------------------
    // Replenishment
    // -------------------------------------------------------------------

    /// Order pallets of `product` if its inventory position is at or below
    /// the reorder point, or unconditionally on a periodic review.
    ///
    /// The order brings the inventory position up to at least `s_max`, in
    /// whole pallets, and is counted on transit immediately. Returns `None`
    /// when nothing needs ordering.
    pub fn check_replenishment(
        &self,
        product: &Product,
        container: CaseContainer,
        periodic: bool,
    ) -> Option<ReplenishmentOrder> {
        let case_per_pallet = u64::from(product.case_per_pallet());
        if case_per_pallet == 0 {
            return None;
        }

        let now = self.env.now();
        let mut ledger = self.ledger();
        let position = ledger.inventory_position(product.id, container);
        if !periodic && position > i64::from(product.s_min.get(container)) {
            return None;
        }

        let missing = i64::from(product.s_max.get(container)).saturating_sub(position);
        let n_pallets = u64::try_from(missing).unwrap_or(0).div_ceil(case_per_pallet);
        if n_pallets == 0 {
            return None;
        }
        let n_cases = n_pallets.saturating_mul(case_per_pallet);
        ledger.update(
            product.id,
            container,
            Inventory::OnTransit,
            i64::try_from(n_cases).unwrap_or(i64::MAX),
            now,
        );
        drop(ledger);

        info!(
            product = %product.name,
            %container,
            inventory_position = position,
            n_pallets,
            periodic,
            "Replenishment ordered"
        );
        Some(ReplenishmentOrder {
            product: product.id,
            container,
            n_pallets: u32::try_from(n_pallets).unwrap_or(u32::MAX),
            n_cases,
            periodic,
        })
    }

    /// Review every product every `interval` and send the resulting orders
    /// to `sink`.
    ///
    /// Only containers with at least one registered store are reviewed.
    /// Returns once the receiving side of `sink` is dropped.
    pub async fn periodic_replenishment(
        &self,
        interval: Duration,
        sink: mpsc::UnboundedSender<ReplenishmentOrder>,
    ) {
        if interval.is_zero() {
            return;
        }
        loop {
            self.env.timeout(interval).await;
            if sink.is_closed() {
                break;
            }
            debug!(time = ?self.env.now(), "Periodic replenishment review");
            for product in &self.products {
                for &container in self.stores.keys() {
                    if let Some(order) = self.check_replenishment(product, container, true)
                        && sink.send(order).is_err()
                    {
                        return;
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------
    // Warm-up
    // -------------------------------------------------------------------

    /// Fill the stores with initial stock, bypassing the timed processes.
    ///
    /// Each product receives `max(1, ceil(s_max / case_per_pallet))`
    /// pallets' worth of stock per container kind. Pallet stores get one
    /// pallet unit load per pallet; tray stores get one tray per pallet
    /// layer. Loads are spread over the stores of a kind round robin, and
    /// each goes to the nearest empty location or the nearest half-full
    /// location of the same product.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoLocation`] once a store runs out of room,
    /// or [`ManagerError::Store`] if placing a load fails.
    pub fn warmup(&self) -> Result<WarmupReport, ManagerError> {
        let mut report = WarmupReport::default();
        for product in &self.products {
            for (&container, stores) in &self.stores {
                let case_per_pallet = product.case_per_pallet();
                let n_pallets = if case_per_pallet == 0 {
                    1
                } else {
                    product.s_max.get(container).div_ceil(case_per_pallet).max(1)
                };

                match container {
                    CaseContainer::Pallet => {
                        for (_, store) in (0..n_pallets).zip(stores.iter().cycle()) {
                            self.warmup_unit_load(store, UnitLoad::pallet(product), &mut report)?;
                        }
                    }
                    CaseContainer::Tray => {
                        for _ in 0..n_pallets {
                            let layers = 0..product.layers_per_pallet;
                            for (_, store) in layers.zip(stores.iter().cycle()) {
                                self.warmup_unit_load(store, UnitLoad::tray(product), &mut report)?;
                            }
                        }
                    }
                }
            }
        }
        info!(
            unit_loads = report.unit_loads,
            cases = report.cases,
            "Warm-up complete"
        );
        Ok(report)
    }

    fn warmup_unit_load(
        &self,
        store: &WarehouseStore,
        unit_load: UnitLoad,
        report: &mut WarmupReport,
    ) -> Result<(), ManagerError> {
        let location = store
            .first_available_location_for_warmup(&unit_load)
            .ok_or_else(|| ManagerError::NoLocation {
                store: store.name().to_owned(),
                product: unit_load.product,
            })?;
        store.book_location(location, &unit_load)?;

        let (product, n_cases) = (unit_load.product, unit_load.n_cases);
        store.put_directly(location, unit_load)?;
        self.update_stock(product, store.container(), Inventory::OnHand, i64::from(n_cases));

        report.unit_loads = report.unit_loads.saturating_add(1);
        report.cases = report.cases.saturating_add(u64::from(n_cases));
        Ok(())
    }

    /// Log stock levels and per-store summaries.
    pub fn log_summary(&self) {
        for store in self.all_stores() {
            store.log_summary();
        }
        let ledger = self.ledger();
        for product in &self.products {
            for &container in self.stores.keys() {
                let entry = ledger.entry(product.id, container);
                info!(
                    product = %product.name,
                    %container,
                    on_hand = entry.on_hand,
                    on_transit = entry.on_transit,
                    "Stock level"
                );
            }
        }
    }
}
