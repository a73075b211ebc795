//! Stock ledger.
//!
//! Tracks, per product and container kind, the cases physically stored
//! (on hand) and the cases on their way in (on transit). Their sum is the
//! inventory position the replenishment rule looks at. Every change is
//! appended to a history for later reporting.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use stowage_types::{CaseContainer, Inventory, ProductId};

/// On-hand and on-transit cases of one product in one container kind.
///
/// Values are signed: the ledger records what callers report and never
/// clamps, so an out-of-order update shows up as a negative level instead
/// of being hidden.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StockEntry {
    /// Cases stored.
    pub on_hand: i64,
    /// Cases ordered or returning, not yet stored.
    pub on_transit: i64,
}

impl StockEntry {
    /// On hand plus on transit.
    pub const fn inventory_position(&self) -> i64 {
        self.on_hand.saturating_add(self.on_transit)
    }

    const fn bucket_mut(&mut self, inventory: Inventory) -> &mut i64 {
        match inventory {
            Inventory::OnHand => &mut self.on_hand,
            Inventory::OnTransit => &mut self.on_transit,
        }
    }
}

/// One ledger change, with the resulting levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockSample {
    /// Simulated time of the change.
    pub time: Duration,
    /// The product.
    pub product: ProductId,
    /// The container kind.
    pub container: CaseContainer,
    /// Levels after the change.
    pub levels: StockEntry,
}

/// Stock levels of every product, per container kind.
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    entries: BTreeMap<(ProductId, CaseContainer), StockEntry>,
    history: Vec<StockSample>,
}

impl StockLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` cases (negative to remove) to one bucket.
    pub fn update(
        &mut self,
        product: ProductId,
        container: CaseContainer,
        inventory: Inventory,
        delta: i64,
        now: Duration,
    ) {
        let entry = self.entries.entry((product, container)).or_default();
        let bucket = entry.bucket_mut(inventory);
        *bucket = bucket.saturating_add(delta);
        let levels = *entry;
        self.history.push(StockSample {
            time: now,
            product,
            container,
            levels,
        });
    }

    /// Current levels; zero for a product never touched.
    pub fn entry(&self, product: ProductId, container: CaseContainer) -> StockEntry {
        self.entries
            .get(&(product, container))
            .copied()
            .unwrap_or_default()
    }

    /// On hand plus on transit.
    pub fn inventory_position(&self, product: ProductId, container: CaseContainer) -> i64 {
        self.entry(product, container).inventory_position()
    }

    /// Every change so far, oldest first.
    pub fn history(&self) -> &[StockSample] {
        &self.history
    }
}
