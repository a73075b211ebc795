//! Crane travel-time models.
//!
//! The store processes only ask a [`HandlingModel`] how long a storage or
//! retrieval cycle takes; how the crane moves is up to the model.
//! [`ConstantSpeedCrane`] is the stock implementation.

use std::fmt::Debug;
use std::time::Duration;

use stowage_types::UnitLoadId;

use crate::config::CraneConfig;
use crate::location::WarehouseLocation;

/// Timing of crane cycles between the aisle origin and a location.
pub trait HandlingModel: Debug + Send + Sync {
    /// Time to carry a unit load from the input conveyor to `location` and
    /// return.
    fn storage_time(&self, location: &WarehouseLocation) -> Duration;

    /// Time to fetch `unit_load` from `location` and bring it to the output
    /// conveyor.
    fn retrieval_time(&self, location: &WarehouseLocation, unit_load: UnitLoadId) -> Duration;
}

/// A stacker crane moving horizontally and vertically at the same time,
/// each axis at a constant speed.
///
/// One-way travel is the slower of the two axes (Chebyshev metric). A cycle
/// is travel out and back plus a fixed handling time. Fetching a load from
/// the back of a double-deep cell while the front is occupied costs two
/// extra handlings to shuffle the front load.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSpeedCrane {
    speed_x: f64,
    speed_y: f64,
    handling: Duration,
}

impl ConstantSpeedCrane {
    /// Build a crane from speeds in metres per second and a handling time.
    pub const fn new(speed_x: f64, speed_y: f64, handling: Duration) -> Self {
        Self {
            speed_x,
            speed_y,
            handling,
        }
    }

    /// Build a crane from its configuration section.
    pub const fn from_config(config: &CraneConfig) -> Self {
        Self::new(
            config.speed_x,
            config.speed_y,
            Duration::from_millis(config.handling_ms),
        )
    }

    /// Out-and-back travel time to `location`, excluding handling.
    pub fn round_trip(&self, location: &WarehouseLocation) -> Duration {
        let (dx, dy) = location.offset();
        let one_way = (dx / self.speed_x).max(dy / self.speed_y);
        Duration::try_from_secs_f64(2.0 * one_way).unwrap_or(Duration::MAX)
    }
}

impl HandlingModel for ConstantSpeedCrane {
    fn storage_time(&self, location: &WarehouseLocation) -> Duration {
        self.round_trip(location).saturating_add(self.handling)
    }

    fn retrieval_time(&self, location: &WarehouseLocation, unit_load: UnitLoadId) -> Duration {
        let base = self.storage_time(location);
        let behind_front = location
            .second_position()
            .unit_load()
            .is_some_and(|stored| stored.id == unit_load)
            && location.first_position().busy();
        if behind_front {
            base.saturating_add(self.handling.saturating_mul(2))
        } else {
            base
        }
    }
}
