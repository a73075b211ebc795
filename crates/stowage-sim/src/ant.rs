//! Transport vehicles ("ants").
//!
//! The store processes only need two things from a vehicle: hand over the
//! unit load it carries, and accept one. [`Ant`] captures that capability;
//! [`Vehicle`] is the concrete forklift-style implementation used by the
//! engine and the tests.

use std::future::Future;
use std::time::Duration;

use stowage_types::{AntId, UnitLoad};
use tracing::debug;

use crate::environment::Environment;
use crate::error::SimError;

/// A vehicle that carries at most one unit load between stores and bays.
pub trait Ant {
    /// The vehicle's identifier.
    fn id(&self) -> AntId;

    /// The unit load currently on board, if any.
    fn unit_load(&self) -> Option<&UnitLoad>;

    /// Take `unit_load` on board.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AntLoaded`] if the vehicle already carries a load.
    fn load(&mut self, unit_load: UnitLoad) -> impl Future<Output = Result<(), SimError>> + Send;

    /// Hand over the unit load on board.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AntEmpty`] if the vehicle carries nothing.
    fn unload(&mut self) -> impl Future<Output = Result<UnitLoad, SimError>> + Send;
}

/// A vehicle whose load and unload each take a fixed handling time.
#[derive(Debug, Clone)]
pub struct Vehicle {
    id: AntId,
    env: Environment,
    handling_time: Duration,
    cargo: Option<UnitLoad>,
    missions: u64,
}

impl Vehicle {
    /// Create an empty vehicle.
    pub fn new(env: Environment, handling_time: Duration) -> Self {
        Self {
            id: AntId::new(),
            env,
            handling_time,
            cargo: None,
            missions: 0,
        }
    }

    /// Create a vehicle that already carries `unit_load` (e.g. arriving
    /// from a supplier dock).
    pub fn carrying(env: Environment, handling_time: Duration, unit_load: UnitLoad) -> Self {
        Self {
            cargo: Some(unit_load),
            ..Self::new(env, handling_time)
        }
    }

    /// Number of completed unloads.
    pub const fn missions(&self) -> u64 {
        self.missions
    }

    /// Remove the cargo immediately, e.g. when it is consumed at a bay.
    pub const fn take_cargo(&mut self) -> Option<UnitLoad> {
        self.cargo.take()
    }
}

impl Ant for Vehicle {
    fn id(&self) -> AntId {
        self.id
    }

    fn unit_load(&self) -> Option<&UnitLoad> {
        self.cargo.as_ref()
    }

    async fn load(&mut self, unit_load: UnitLoad) -> Result<(), SimError> {
        if let Some(current) = &self.cargo {
            return Err(SimError::AntLoaded {
                ant: self.id,
                unit_load: current.id,
            });
        }
        self.env.timeout(self.handling_time).await;
        debug!(ant = %self.id, unit_load = %unit_load.id, "Ant loaded");
        self.cargo = Some(unit_load);
        Ok(())
    }

    async fn unload(&mut self) -> Result<UnitLoad, SimError> {
        if self.cargo.is_none() {
            return Err(SimError::AntEmpty { ant: self.id });
        }
        self.env.timeout(self.handling_time).await;
        let unit_load = self.cargo.take().ok_or(SimError::AntEmpty { ant: self.id })?;
        self.missions = self.missions.saturating_add(1);
        debug!(ant = %self.id, unit_load = %unit_load.id, "Ant unloaded");
        Ok(unit_load)
    }
}
