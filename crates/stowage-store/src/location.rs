//! Dual-depth storage locations.
//!
//! A [`WarehouseLocation`] is a rack cell with one or two
//! [`PhysicalPosition`]s. In a double-deep cell the back position
//! (`second_position`) becomes unreachable once the front one
//! (`first_position`) is occupied, so the cell always fills from the back:
//! an empty cell takes its first load at the back, a half-full cell takes
//! the second load at the front.
//!
//! Two protocols sit on top of the positions:
//!
//! - **freeze / put**: capacity is reserved for a unit load that has not
//!   arrived yet, and the reservation is consumed when it is put away.
//!   Stored plus reserved loads never exceed the depth.
//! - **book / get**: a stored unit load is claimed for removal before the
//!   crane travels to fetch it. A load can be claimed once, so two
//!   retrieval processes can never both remove the same load.
//!
//! Every mutation checks all of its preconditions before touching any
//! state, so a failed call leaves the location exactly as it was. A refused
//! put hands the unit load back to the caller.

use stowage_types::{LocationId, ProductId, Side, UnitLoad, UnitLoadId};
use tracing::debug;

use crate::error::{Rejected, StoreError};
use crate::position::PhysicalPosition;

/// Number of physical positions in a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Depth {
    /// One position (`first_position` only).
    Single,
    /// Front and back positions.
    Double,
}

impl Depth {
    /// Number of positions.
    pub const fn positions(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

impl TryFrom<u8> for Depth {
    type Error = StoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Single),
            2 => Ok(Self::Double),
            other => Err(StoreError::InvalidDepth(other)),
        }
    }
}

/// Capacity reserved for a unit load that has not been put away yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// The expected unit load.
    pub unit_load: UnitLoadId,
    /// Its product.
    pub product: ProductId,
}

/// Placement preference of a location for a product. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Affinity {
    /// The location already stores or expects this product and has room.
    SameProduct,
    /// The location is empty with nothing reserved.
    Empty,
    /// No room left, or a different product is stored or expected.
    Unusable,
}

impl Affinity {
    /// Numeric score: 0 for same product, 1 for empty, infinity otherwise.
    pub const fn score(self) -> f64 {
        match self {
            Self::SameProduct => 0.0,
            Self::Empty => 1.0,
            Self::Unusable => f64::INFINITY,
        }
    }

    /// Whether a unit load can be directed here at all.
    pub const fn is_usable(self) -> bool {
        !matches!(self, Self::Unusable)
    }
}

/// A one- or two-deep rack cell.
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseLocation {
    id: LocationId,
    x: u32,
    y: u32,
    side: Side,
    depth: Depth,
    width: f64,
    height: f64,
    first_position: PhysicalPosition,
    second_position: PhysicalPosition,
    future_unit_loads: Vec<Reservation>,
    booked_pickups: Vec<UnitLoadId>,
}

impl WarehouseLocation {
    /// Create an empty location at grid coordinates `(x, y)`.
    ///
    /// `width` and `height` are the physical size of the cell in metres and
    /// turn grid coordinates into travel distances.
    pub const fn new(
        id: LocationId,
        x: u32,
        y: u32,
        side: Side,
        depth: Depth,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            id,
            x,
            y,
            side,
            depth,
            width,
            height,
            first_position: PhysicalPosition::new(),
            second_position: PhysicalPosition::new(),
            future_unit_loads: Vec::new(),
            booked_pickups: Vec::new(),
        }
    }

    /// Replace the table index, used once while the store sorts its grid.
    pub(crate) const fn with_id(mut self, id: LocationId) -> Self {
        self.id = id;
        self
    }

    // -------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------

    /// Index in the owning store's location table.
    pub const fn id(&self) -> LocationId {
        self.id
    }

    /// Grid coordinates `(x, y)`: position along the aisle and rack level.
    pub const fn coordinates(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Side of the aisle.
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Number of positions.
    pub const fn depth(&self) -> Depth {
        self.depth
    }

    /// Cell width in metres.
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Cell height in metres.
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Horizontal and vertical offset of the cell from the aisle origin,
    /// in metres.
    pub fn offset(&self) -> (f64, f64) {
        (
            f64::from(self.x) * self.width,
            f64::from(self.y) * self.height,
        )
    }

    /// Straight-line distance to another location, in metres.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let (x1, y1) = self.offset();
        let (x2, y2) = other.offset();
        (x1 - x2).hypot(y1 - y2)
    }

    // -------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------

    /// The front (accessible) position.
    pub const fn first_position(&self) -> &PhysicalPosition {
        &self.first_position
    }

    /// The back position; unused when the depth is [`Depth::Single`].
    pub const fn second_position(&self) -> &PhysicalPosition {
        &self.second_position
    }

    /// No position holds a load. Reservations may still exist.
    pub const fn is_empty(&self) -> bool {
        self.first_position.free() && self.second_position.free()
    }

    /// Only the back position holds a load.
    pub const fn is_half_full(&self) -> bool {
        match self.depth {
            Depth::Single => false,
            Depth::Double => self.second_position.busy() && self.first_position.free(),
        }
    }

    /// Every usable position holds a load.
    pub const fn is_full(&self) -> bool {
        match self.depth {
            Depth::Single => self.first_position.busy(),
            Depth::Double => self.first_position.busy() && self.second_position.busy(),
        }
    }

    /// Number of stored unit loads.
    pub fn n_unit_loads(&self) -> usize {
        self.unit_loads().count()
    }

    /// Total cases stored.
    pub fn n_cases(&self) -> u32 {
        self.first_position
            .n_cases()
            .saturating_add(self.second_position.n_cases())
    }

    /// Stored plus reserved unit loads.
    pub fn committed(&self) -> usize {
        self.n_unit_loads()
            .saturating_add(self.future_unit_loads.len())
    }

    /// Stored unit loads, back position first.
    pub fn unit_loads(&self) -> impl Iterator<Item = &UnitLoad> {
        self.second_position
            .unit_load()
            .into_iter()
            .chain(self.first_position.unit_load())
    }

    /// Product physically stored, if any.
    pub fn product(&self) -> Option<ProductId> {
        self.unit_loads().next().map(|unit_load| unit_load.product)
    }

    /// Product stored, or else the product of the first reservation.
    pub fn expected_product(&self) -> Option<ProductId> {
        self.product().or_else(|| {
            self.future_unit_loads
                .first()
                .map(|reservation| reservation.product)
        })
    }

    /// Whether `unit_load` is physically stored here.
    pub fn contains(&self, unit_load: UnitLoadId) -> bool {
        self.unit_loads().any(|stored| stored.id == unit_load)
    }

    /// Reservations not yet put away.
    pub fn future_unit_loads(&self) -> &[Reservation] {
        &self.future_unit_loads
    }

    /// Whether `unit_load` holds a reservation here.
    pub fn is_frozen(&self, unit_load: UnitLoadId) -> bool {
        self.future_unit_loads
            .iter()
            .any(|reservation| reservation.unit_load == unit_load)
    }

    /// Unit loads claimed for removal.
    pub fn booked_pickups(&self) -> &[UnitLoadId] {
        &self.booked_pickups
    }

    /// Whether `unit_load` is claimed for removal.
    pub fn is_booked(&self, unit_load: UnitLoadId) -> bool {
        self.booked_pickups.contains(&unit_load)
    }

    /// Check that `product` may join the stock already stored here.
    ///
    /// An empty location accepts any product.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IncompatibleUnitLoad`] on a product mismatch.
    pub fn check_product_compatibility(&self, product: ProductId) -> Result<(), StoreError> {
        match self.product() {
            Some(stored) if stored != product => Err(StoreError::IncompatibleUnitLoad {
                location: self.id,
                stored,
                incoming: product,
            }),
            _ => Ok(()),
        }
    }

    // -------------------------------------------------------------------
    // Reservation protocol
    // -------------------------------------------------------------------

    /// Reserve capacity for `unit_load`, which will be put away later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OverReserved`] if stored plus reserved loads
    /// already fill the location, or [`StoreError::IncompatibleUnitLoad`]
    /// if the location holds a different product.
    pub fn freeze(&mut self, unit_load: &UnitLoad) -> Result<(), StoreError> {
        let depth = self.depth.positions();
        if self.committed() >= depth {
            return Err(StoreError::OverReserved {
                location: self.id,
                depth,
            });
        }
        if !self.is_empty() {
            self.check_product_compatibility(unit_load.product)?;
        }
        self.future_unit_loads.push(Reservation {
            unit_load: unit_load.id,
            product: unit_load.product,
        });
        debug!(location = %self.id, unit_load = %unit_load.id, "Location frozen");
        Ok(())
    }

    /// Release the reservation held by `unit_load`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFrozen`] if `unit_load` has no reservation
    /// here.
    pub fn unfreeze(&mut self, unit_load: UnitLoadId) -> Result<Reservation, StoreError> {
        let index = self
            .future_unit_loads
            .iter()
            .position(|reservation| reservation.unit_load == unit_load)
            .ok_or(StoreError::NotFrozen {
                location: self.id,
                unit_load,
            })?;
        debug!(location = %self.id, %unit_load, "Location unfrozen");
        Ok(self.future_unit_loads.remove(index))
    }

    /// Whether a unit load of `product` could be put away right now.
    ///
    /// # Errors
    ///
    /// Returns the error [`put`](Self::put) would fail with.
    pub fn check_put(&self, product: ProductId) -> Result<(), StoreError> {
        if self.is_full() {
            return Err(StoreError::LocationBusy { location: self.id });
        }
        if !self.is_empty() {
            self.check_product_compatibility(product)?;
        }
        Ok(())
    }

    /// Put `unit_load` away, back position first.
    ///
    /// Consumes the load's reservation when it has one; a load arriving
    /// without a reservation is accepted as long as it fits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LocationBusy`] if the location is full, or
    /// [`StoreError::IncompatibleUnitLoad`] if it holds a different product.
    /// The refused load is handed back inside the [`Rejected`] error and
    /// any reservation it holds is kept.
    pub fn put(&mut self, mut unit_load: UnitLoad) -> Result<(), Rejected> {
        if let Err(e) = self.check_put(unit_load.product) {
            return Err(Rejected::new(e, unit_load));
        }

        let id = unit_load.id;
        unit_load.location = Some(self.id);
        if self.depth == Depth::Double && self.second_position.free() {
            self.second_position.put(unit_load)?;
        } else {
            self.first_position.put(unit_load)?;
        }

        if let Some(index) = self
            .future_unit_loads
            .iter()
            .position(|reservation| reservation.unit_load == id)
        {
            self.future_unit_loads.remove(index);
        }
        debug!(
            location = %self.id,
            unit_load = %id,
            stored = self.n_unit_loads(),
            "Unit load put away"
        );
        Ok(())
    }

    // -------------------------------------------------------------------
    // Pickup protocol
    // -------------------------------------------------------------------

    /// Claim the stored `unit_load` for removal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotStored`] if the load is not here,
    /// [`StoreError::FullyBooked`] if every position is already claimed, or
    /// [`StoreError::AlreadyBooked`] if this load is already claimed.
    pub fn book_pickup(&mut self, unit_load: UnitLoadId) -> Result<(), StoreError> {
        if !self.contains(unit_load) {
            return Err(StoreError::NotStored {
                location: self.id,
                unit_load,
            });
        }
        let depth = self.depth.positions();
        if self.booked_pickups.len() >= depth {
            return Err(StoreError::FullyBooked {
                location: self.id,
                depth,
            });
        }
        if self.is_booked(unit_load) {
            return Err(StoreError::AlreadyBooked {
                location: self.id,
                unit_load,
            });
        }
        self.booked_pickups.push(unit_load);
        debug!(location = %self.id, %unit_load, "Pickup booked");
        Ok(())
    }

    /// Withdraw a pickup booking without removing the load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotBooked`] if `unit_load` is not booked here.
    pub fn cancel_pickup(&mut self, unit_load: UnitLoadId) -> Result<(), StoreError> {
        let index = self
            .booked_pickups
            .iter()
            .position(|booked| *booked == unit_load)
            .ok_or(StoreError::NotBooked {
                location: self.id,
                unit_load,
            })?;
        self.booked_pickups.remove(index);
        debug!(location = %self.id, %unit_load, "Pickup cancelled");
        Ok(())
    }

    /// Remove the booked `unit_load` and return it.
    ///
    /// A load sitting in the back behind an occupied front position is
    /// swapped to the front first and taken from there. Any load left in
    /// the location afterwards is in the back position (`second_position`)
    /// with the front free, which is the half-full state new loads fill
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NothingBooked`] if no pickup is booked here,
    /// [`StoreError::LocationEmpty`] if nothing is stored,
    /// [`StoreError::UnitLoadNotFound`] if the load is in neither position,
    /// or [`StoreError::NotBooked`] if this load was not booked.
    pub fn get(&mut self, unit_load: UnitLoadId) -> Result<UnitLoad, StoreError> {
        if self.booked_pickups.is_empty() {
            return Err(StoreError::NothingBooked { location: self.id });
        }
        if self.is_empty() {
            return Err(StoreError::LocationEmpty { location: self.id });
        }

        let in_first = holds(&self.first_position, unit_load);
        let in_second = holds(&self.second_position, unit_load);
        if !in_first && !in_second {
            return Err(StoreError::UnitLoadNotFound {
                location: self.id,
                unit_load,
            });
        }
        let booking = self
            .booked_pickups
            .iter()
            .position(|booked| *booked == unit_load)
            .ok_or(StoreError::NotBooked {
                location: self.id,
                unit_load,
            })?;

        let from_back = in_second && self.first_position.free();
        if in_second && !from_back {
            core::mem::swap(&mut self.first_position, &mut self.second_position);
        }
        let mut taken = if from_back {
            self.second_position.get()?
        } else {
            self.first_position.get()?
        };

        self.booked_pickups.remove(booking);
        taken.location = None;
        debug!(
            location = %self.id,
            %unit_load,
            stored = self.n_unit_loads(),
            "Unit load retrieved"
        );
        Ok(taken)
    }

    // -------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------

    /// Placement preference of this location for `product`.
    ///
    /// A location whose stored and reserved loads all carry `product` and
    /// that still has room is the best fit; an untouched empty location is
    /// second best. Full locations and locations committed to another
    /// product are unusable.
    pub fn affinity(&self, product: ProductId) -> Affinity {
        if self.committed() >= self.depth.positions() {
            return Affinity::Unusable;
        }
        let mut committed_products = self
            .unit_loads()
            .map(|unit_load| unit_load.product)
            .chain(self.future_unit_loads.iter().map(|r| r.product))
            .peekable();
        if committed_products.peek().is_none() {
            return Affinity::Empty;
        }
        if committed_products.all(|committed| committed == product) {
            Affinity::SameProduct
        } else {
            Affinity::Unusable
        }
    }

    /// Drop every reservation and booking matching `stale`.
    ///
    /// Returns the released reservations and bookings.
    pub(crate) fn release_where<F>(&mut self, stale: F) -> (Vec<UnitLoadId>, Vec<UnitLoadId>)
    where
        F: Fn(UnitLoadId, bool) -> bool,
    {
        let mut reservations = Vec::new();
        self.future_unit_loads.retain(|reservation| {
            let drop_it = stale(reservation.unit_load, false);
            if drop_it {
                reservations.push(reservation.unit_load);
            }
            !drop_it
        });
        let mut bookings = Vec::new();
        self.booked_pickups.retain(|booked| {
            let drop_it = stale(*booked, true);
            if drop_it {
                bookings.push(*booked);
            }
            !drop_it
        });
        (reservations, bookings)
    }
}

/// Whether `position` holds the unit load with id `unit_load`.
fn holds(position: &PhysicalPosition, unit_load: UnitLoadId) -> bool {
    position
        .unit_load()
        .is_some_and(|stored| stored.id == unit_load)
}

#[cfg(test)]
mod tests {
    use stowage_types::CaseContainer;

    use super::*;

    fn make_location(depth: Depth) -> WarehouseLocation {
        WarehouseLocation::new(LocationId(0), 3, 2, Side::Left, depth, 1.2, 1.5)
    }

    fn make_load(product: ProductId) -> UnitLoad {
        UnitLoad::new(CaseContainer::Pallet, product, 40)
    }

    /// Double-deep location holding two loads of one product.
    fn full_location() -> (WarehouseLocation, ProductId, UnitLoadId, UnitLoadId) {
        let product = ProductId::new();
        let mut location = make_location(Depth::Double);
        let load1 = make_load(product);
        let load2 = make_load(product);
        let (id1, id2) = (load1.id, load2.id);
        assert!(location.put(load1).is_ok());
        assert!(location.put(load2).is_ok());
        (location, product, id1, id2)
    }

    fn assert_capacity_invariants(location: &WarehouseLocation) {
        let depth = location.depth().positions();
        assert!(location.committed() <= depth);
        assert!(location.booked_pickups().len() <= depth);
    }

    #[test]
    fn depth_from_u8() {
        assert_eq!(Depth::try_from(1).ok(), Some(Depth::Single));
        assert_eq!(Depth::try_from(2).ok(), Some(Depth::Double));
        assert!(matches!(Depth::try_from(0), Err(StoreError::InvalidDepth(0))));
    }

    #[test]
    fn new_location_is_empty() {
        let location = make_location(Depth::Double);
        assert!(location.is_empty());
        assert!(!location.is_half_full());
        assert!(!location.is_full());
        assert_eq!(location.n_unit_loads(), 0);
        assert_eq!(location.product(), None);
    }

    #[test]
    fn first_put_fills_back_position() {
        let mut location = make_location(Depth::Double);
        assert!(location.put(make_load(ProductId::new())).is_ok());
        assert!(location.is_half_full());
        assert!(location.second_position().busy());
        assert!(location.first_position().free());
        assert_eq!(location.n_unit_loads(), 1);
    }

    #[test]
    fn second_put_of_same_product_fills_location() {
        let (mut location, product, _, _) = full_location();
        assert!(location.is_full());
        assert_eq!(location.n_unit_loads(), 2);
        assert_eq!(location.n_cases(), 80);

        let load = make_load(product);
        let id = load.id;
        let result = location.put(load);
        assert!(matches!(
            &result,
            Err(Rejected { error: StoreError::LocationBusy { .. }, unit_load }) if unit_load.id == id
        ));
    }

    #[test]
    fn put_sets_location_on_unit_load() {
        let mut location = make_location(Depth::Double);
        assert!(location.put(make_load(ProductId::new())).is_ok());
        let stored = location.second_position().unit_load();
        assert_eq!(stored.and_then(|ul| ul.location), Some(LocationId(0)));
    }

    #[test]
    fn put_of_other_product_into_half_full_fails() {
        let mut location = make_location(Depth::Double);
        assert!(location.put(make_load(ProductId::new())).is_ok());
        let result = location.put(make_load(ProductId::new()));
        assert!(matches!(
            result.map_err(StoreError::from),
            Err(StoreError::IncompatibleUnitLoad { .. })
        ));
        assert!(location.is_half_full());
    }

    #[test]
    fn check_put_reports_put_error_without_side_effects() {
        let (location, product, _, _) = full_location();
        assert!(matches!(
            location.check_put(product),
            Err(StoreError::LocationBusy { .. })
        ));

        let mut location = make_location(Depth::Double);
        let reserved = make_load(ProductId::new());
        assert!(location.freeze(&reserved).is_ok());
        assert!(location.put(make_load(ProductId::new())).is_ok());
        assert!(matches!(
            location.check_put(reserved.product),
            Err(StoreError::IncompatibleUnitLoad { .. })
        ));
        assert_eq!(location.future_unit_loads().len(), 1);
        assert_eq!(location.n_unit_loads(), 1);
    }

    #[test]
    fn freeze_on_full_location_fails() {
        let (mut location, product, _, _) = full_location();
        let result = location.freeze(&make_load(product));
        assert!(matches!(result, Err(StoreError::OverReserved { depth: 2, .. })));
        assert!(location.future_unit_loads().is_empty());
    }

    #[test]
    fn freeze_respects_depth_on_empty_location() {
        let mut location = make_location(Depth::Double);
        let product = ProductId::new();
        assert!(location.freeze(&make_load(product)).is_ok());
        assert!(location.freeze(&make_load(product)).is_ok());
        let result = location.freeze(&make_load(product));
        assert!(matches!(result, Err(StoreError::OverReserved { .. })));
        assert_eq!(location.future_unit_loads().len(), 2);
        assert_capacity_invariants(&location);
    }

    #[test]
    fn freeze_on_half_full_allows_one_reservation() {
        let mut location = make_location(Depth::Double);
        let product = ProductId::new();
        assert!(location.put(make_load(product)).is_ok());
        assert!(location.freeze(&make_load(product)).is_ok());
        assert!(location.freeze(&make_load(product)).is_err());
        assert_capacity_invariants(&location);
    }

    #[test]
    fn freeze_on_half_full_checks_product() {
        let mut location = make_location(Depth::Double);
        assert!(location.put(make_load(ProductId::new())).is_ok());
        let result = location.freeze(&make_load(ProductId::new()));
        assert!(matches!(
            result,
            Err(StoreError::IncompatibleUnitLoad { .. })
        ));
    }

    #[test]
    fn put_consumes_reservation() {
        let mut location = make_location(Depth::Double);
        let load = make_load(ProductId::new());
        assert!(location.freeze(&load).is_ok());
        assert!(location.is_frozen(load.id));
        assert!(location.put(load).is_ok());
        assert!(location.future_unit_loads().is_empty());
        assert_eq!(location.committed(), 1);
    }

    #[test]
    fn put_without_reservation_is_accepted() {
        let mut location = make_location(Depth::Double);
        assert!(location.put(make_load(ProductId::new())).is_ok());
        assert!(location.future_unit_loads().is_empty());
    }

    #[test]
    fn reservation_does_not_bind_product_of_empty_location() {
        // Compatibility is only checked against physically stored stock, so
        // a different product may still be put into an empty location that
        // holds a reservation for another product.
        let mut location = make_location(Depth::Double);
        let reserved = make_load(ProductId::new());
        assert!(location.freeze(&reserved).is_ok());

        let other = make_load(ProductId::new());
        let other_product = other.product;
        assert!(location.put(other).is_ok());
        assert_eq!(location.product(), Some(other_product));
        assert!(location.is_frozen(reserved.id));
        assert_capacity_invariants(&location);
    }

    #[test]
    fn unfreeze_unknown_load_fails() {
        let mut location = make_location(Depth::Double);
        let result = location.unfreeze(UnitLoadId::new());
        assert!(matches!(result, Err(StoreError::NotFrozen { .. })));
    }

    #[test]
    fn unfreeze_releases_capacity() {
        let mut location = make_location(Depth::Single);
        let load = make_load(ProductId::new());
        assert!(location.freeze(&load).is_ok());
        assert!(location.freeze(&make_load(load.product)).is_err());
        let released = location.unfreeze(load.id);
        assert_eq!(released.ok().map(|r| r.unit_load), Some(load.id));
        assert!(location.freeze(&make_load(load.product)).is_ok());
    }

    #[test]
    fn book_pickup_twice_fails() {
        let (mut location, _, id1, _) = full_location();
        assert!(location.book_pickup(id1).is_ok());
        let result = location.book_pickup(id1);
        assert!(matches!(result, Err(StoreError::AlreadyBooked { .. })));
        assert_eq!(location.booked_pickups().len(), 1);
    }

    #[test]
    fn book_pickup_of_absent_load_fails() {
        let (mut location, _, _, _) = full_location();
        let result = location.book_pickup(UnitLoadId::new());
        assert!(matches!(result, Err(StoreError::NotStored { .. })));
    }

    #[test]
    fn booking_is_bounded_by_depth() {
        let mut location = make_location(Depth::Single);
        let load = make_load(ProductId::new());
        let id = load.id;
        assert!(location.put(load).is_ok());
        assert!(location.book_pickup(id).is_ok());
        let result = location.book_pickup(id);
        assert!(matches!(result, Err(StoreError::FullyBooked { depth: 1, .. })));
        assert_capacity_invariants(&location);
    }

    #[test]
    fn put_book_get_roundtrip() {
        let mut location = make_location(Depth::Double);
        let load = make_load(ProductId::new());
        let id = load.id;
        assert!(location.put(load).is_ok());
        assert!(location.book_pickup(id).is_ok());

        let taken = location.get(id);
        assert!(taken.is_ok());
        let taken = taken.ok();
        assert_eq!(taken.as_ref().map(|ul| ul.id), Some(id));
        assert_eq!(taken.and_then(|ul| ul.location), None);
        assert!(location.is_empty());
        assert!(location.booked_pickups().is_empty());
    }

    #[test]
    fn get_back_load_swaps_and_leaves_front_load_in_back() {
        let (mut location, _, back, front) = full_location();
        assert_eq!(
            location.second_position().unit_load().map(|ul| ul.id),
            Some(back)
        );
        assert!(location.book_pickup(back).is_ok());

        let taken = location.get(back);
        assert_eq!(taken.ok().map(|ul| ul.id), Some(back));
        assert!(location.is_half_full());
        assert_eq!(
            location.second_position().unit_load().map(|ul| ul.id),
            Some(front)
        );
    }

    #[test]
    fn get_front_load_leaves_back_load() {
        let (mut location, _, back, front) = full_location();
        assert!(location.book_pickup(front).is_ok());
        let taken = location.get(front);
        assert_eq!(taken.ok().map(|ul| ul.id), Some(front));
        assert!(location.is_half_full());
        assert!(location.contains(back));
    }

    #[test]
    fn get_without_any_booking_fails() {
        let (mut location, _, id1, _) = full_location();
        let result = location.get(id1);
        assert!(matches!(result, Err(StoreError::NothingBooked { .. })));
        assert!(location.is_full());
    }

    #[test]
    fn get_of_unbooked_load_fails_without_side_effects() {
        let (mut location, _, back, front) = full_location();
        assert!(location.book_pickup(front).is_ok());
        let result = location.get(back);
        assert!(matches!(result, Err(StoreError::NotBooked { .. })));
        assert!(location.is_full());
        assert_eq!(
            location.second_position().unit_load().map(|ul| ul.id),
            Some(back)
        );
    }

    #[test]
    fn get_of_unknown_load_fails() {
        let (mut location, _, id1, _) = full_location();
        assert!(location.book_pickup(id1).is_ok());
        let result = location.get(UnitLoadId::new());
        assert!(matches!(result, Err(StoreError::UnitLoadNotFound { .. })));
    }

    #[test]
    fn cancel_pickup_allows_rebooking() {
        let (mut location, _, id1, _) = full_location();
        assert!(location.book_pickup(id1).is_ok());
        assert!(location.cancel_pickup(id1).is_ok());
        assert!(!location.is_booked(id1));
        assert!(location.book_pickup(id1).is_ok());
        assert!(matches!(
            location.cancel_pickup(UnitLoadId::new()),
            Err(StoreError::NotBooked { .. })
        ));
    }

    #[test]
    fn single_depth_location_uses_front_only() {
        let mut location = make_location(Depth::Single);
        let load = make_load(ProductId::new());
        let id = load.id;
        assert!(location.put(load).is_ok());
        assert!(location.is_full());
        assert!(!location.is_half_full());
        assert!(location.first_position().busy());
        assert!(location.second_position().free());

        assert!(location.book_pickup(id).is_ok());
        assert!(location.get(id).is_ok());
        assert!(location.is_empty());
    }

    #[test]
    fn affinity_scores() {
        let product = ProductId::new();

        let empty = make_location(Depth::Double);
        assert_eq!(empty.affinity(product), Affinity::Empty);
        assert!((empty.affinity(product).score() - 1.0).abs() < f64::EPSILON);

        let mut same = make_location(Depth::Double);
        assert!(same.put(make_load(product)).is_ok());
        assert_eq!(same.affinity(product), Affinity::SameProduct);
        assert!(same.affinity(product).score().abs() < f64::EPSILON);

        let (full, full_product, _, _) = full_location();
        assert_eq!(full.affinity(full_product), Affinity::Unusable);
        assert!(full.affinity(full_product).score().is_infinite());

        assert_eq!(same.affinity(ProductId::new()), Affinity::Unusable);
        assert!(!same.affinity(ProductId::new()).is_usable());
    }

    #[test]
    fn affinity_counts_reservations() {
        let product = ProductId::new();
        let mut location = make_location(Depth::Double);
        assert!(location.freeze(&make_load(product)).is_ok());
        assert_eq!(location.affinity(product), Affinity::SameProduct);
        assert_eq!(location.affinity(ProductId::new()), Affinity::Unusable);

        assert!(location.freeze(&make_load(product)).is_ok());
        assert_eq!(location.affinity(product), Affinity::Unusable);
    }

    #[test]
    fn affinity_orders_best_first() {
        assert!(Affinity::SameProduct < Affinity::Empty);
        assert!(Affinity::Empty < Affinity::Unusable);
    }

    #[test]
    fn distance_uses_cell_dimensions() {
        let origin = WarehouseLocation::new(LocationId(0), 0, 0, Side::Origin, Depth::Single, 1.2, 1.5);
        let far = WarehouseLocation::new(LocationId(1), 4, 3, Side::Right, Depth::Single, 1.2, 1.5);
        // (4.8, 4.5) from the origin.
        let expected = 4.8_f64.hypot(4.5);
        assert!((origin.distance_to(&far) - expected).abs() < 1e-9);
    }

    #[test]
    fn release_where_drops_matching_entries() {
        let (mut location, _, id1, id2) = full_location();
        assert!(location.book_pickup(id1).is_ok());
        assert!(location.book_pickup(id2).is_ok());
        let (reservations, bookings) = location.release_where(|id, is_booking| is_booking && id == id1);
        assert!(reservations.is_empty());
        assert_eq!(bookings, vec![id1]);
        assert_eq!(location.booked_pickups(), &[id2]);
    }
}
