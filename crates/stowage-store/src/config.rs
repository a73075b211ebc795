//! Typed configuration for a single warehouse store.
//!
//! A [`StoreConfig`] mirrors one entry of the `stores` list in
//! `stowage-config.yaml`. Every field has a default, so an empty mapping
//! yields a 20 x 8 double-deep pallet aisle.

use std::time::Duration;

use serde::Deserialize;
use stowage_types::CaseContainer;

use crate::error::StoreError;
use crate::location::Depth;

/// Layout, timing and protocol options for one store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Human-readable store name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Kind of unit load the store holds.
    #[serde(default = "default_container")]
    pub container: CaseContainer,

    /// Locations per rack level, along the aisle.
    #[serde(default = "default_n_positions")]
    pub n_positions: u32,

    /// Rack levels.
    #[serde(default = "default_n_floors")]
    pub n_floors: u32,

    /// Positions per location (1 or 2).
    #[serde(default = "default_depth")]
    pub depth: u8,

    /// Width of one location along the aisle, in metres.
    #[serde(default = "default_location_width")]
    pub location_width: f64,

    /// Height of one rack level, in metres.
    #[serde(default = "default_location_height")]
    pub location_height: f64,

    /// Time to move a unit load between a vehicle and a conveyor end.
    #[serde(default = "default_conveyor_transfer_ms")]
    pub conveyor_transfer_ms: u64,

    /// Vehicles the input bay can serve at once.
    #[serde(default = "default_input_service_capacity")]
    pub input_service_capacity: usize,

    /// Stacker crane kinematics.
    #[serde(default)]
    pub crane: CraneConfig,

    /// Reservations older than this are released by
    /// `StoreState::release_stale`. `None` keeps them forever.
    #[serde(default)]
    pub reservation_ttl_ms: Option<u64>,

    /// Pickup bookings older than this are released by
    /// `StoreState::release_stale`. `None` keeps them forever.
    #[serde(default)]
    pub booking_ttl_ms: Option<u64>,
}

impl StoreConfig {
    /// Check the configuration for values the store cannot be built from.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDepth`] for a depth other than 1 or 2,
    /// or [`StoreError::InvalidConfig`] for empty grids and non-positive
    /// dimensions or speeds.
    pub fn validate(&self) -> Result<(), StoreError> {
        Depth::try_from(self.depth)?;
        if self.n_positions == 0 || self.n_floors == 0 {
            return Err(StoreError::InvalidConfig {
                reason: format!(
                    "store {} needs at least one position and one floor",
                    self.name
                ),
            });
        }
        let dimensions = [
            ("location_width", self.location_width),
            ("location_height", self.location_height),
            ("crane.speed_x", self.crane.speed_x),
            ("crane.speed_y", self.crane.speed_y),
        ];
        for (field, value) in dimensions {
            if !value.is_finite() || value <= 0.0 {
                return Err(StoreError::InvalidConfig {
                    reason: format!("store {}: {field} must be positive, got {value}", self.name),
                });
            }
        }
        Ok(())
    }

    /// The validated location depth.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDepth`] for a depth other than 1 or 2.
    pub fn location_depth(&self) -> Result<Depth, StoreError> {
        Depth::try_from(self.depth)
    }

    /// Time to move a unit load between a vehicle and a conveyor end.
    pub const fn conveyor_transfer_time(&self) -> Duration {
        Duration::from_millis(self.conveyor_transfer_ms)
    }

    /// Reservation time-to-live, if enabled.
    pub fn reservation_ttl(&self) -> Option<Duration> {
        self.reservation_ttl_ms.map(Duration::from_millis)
    }

    /// Booking time-to-live, if enabled.
    pub fn booking_ttl(&self) -> Option<Duration> {
        self.booking_ttl_ms.map(Duration::from_millis)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            container: default_container(),
            n_positions: default_n_positions(),
            n_floors: default_n_floors(),
            depth: default_depth(),
            location_width: default_location_width(),
            location_height: default_location_height(),
            conveyor_transfer_ms: default_conveyor_transfer_ms(),
            input_service_capacity: default_input_service_capacity(),
            crane: CraneConfig::default(),
            reservation_ttl_ms: None,
            booking_ttl_ms: None,
        }
    }
}

/// Stacker crane kinematics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CraneConfig {
    /// Horizontal travel speed, metres per second.
    #[serde(default = "default_speed_x")]
    pub speed_x: f64,

    /// Vertical lift speed, metres per second.
    #[serde(default = "default_speed_y")]
    pub speed_y: f64,

    /// Fixed time to pick or deposit a load at either end of a cycle.
    #[serde(default = "default_handling_ms")]
    pub handling_ms: u64,
}

impl Default for CraneConfig {
    fn default() -> Self {
        Self {
            speed_x: default_speed_x(),
            speed_y: default_speed_y(),
            handling_ms: default_handling_ms(),
        }
    }
}

fn default_name() -> String {
    "store".to_owned()
}

const fn default_container() -> CaseContainer {
    CaseContainer::Pallet
}

const fn default_n_positions() -> u32 {
    20
}

const fn default_n_floors() -> u32 {
    8
}

const fn default_depth() -> u8 {
    2
}

const fn default_location_width() -> f64 {
    1.2
}

const fn default_location_height() -> f64 {
    1.5
}

const fn default_conveyor_transfer_ms() -> u64 {
    5_000
}

const fn default_input_service_capacity() -> usize {
    1
}

const fn default_speed_x() -> f64 {
    2.0
}

const fn default_speed_y() -> f64 {
    0.5
}

const fn default_handling_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.location_depth().ok(), Some(Depth::Double));
        assert_eq!(config.conveyor_transfer_time(), Duration::from_secs(5));
        assert!(config.reservation_ttl().is_none());
    }

    #[test]
    fn empty_json_object_uses_defaults() {
        let parsed: Result<StoreConfig, _> = serde_json::from_str("{}");
        assert_eq!(parsed.ok(), Some(StoreConfig::default()));
    }

    #[test]
    fn depth_three_is_rejected() {
        let config = StoreConfig {
            depth: 3,
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidDepth(3))));
    }

    #[test]
    fn zero_floors_is_rejected() {
        let config = StoreConfig {
            n_floors: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn negative_speed_is_rejected() {
        let mut config = StoreConfig::default();
        config.crane.speed_y = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ttl_fields_parse() {
        let parsed: Result<StoreConfig, _> =
            serde_json::from_str(r#"{"reservation_ttl_ms": 60000, "container": "tray"}"#);
        let config = parsed.ok();
        assert_eq!(
            config.as_ref().and_then(StoreConfig::reservation_ttl),
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.map(|c| c.container), Some(CaseContainer::Tray));
    }
}
