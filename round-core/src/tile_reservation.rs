//! Mutual exclusion over board cells.
//!
//! A unit that is about to land on a cell holds a reservation, a unit standing on a cell marks it occupied.
//! Both block new claims. All decisions go through the coordinator, so a plain set is enough.

use crate::traits::{Cell, Side};
use protocol::{ArenaId, GridCoord};
use std::collections::{BTreeSet, HashSet};

/// Key of a cell in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub arena: ArenaId,
    pub side: Side,
    pub coord: GridCoord,
}

impl TileKey {
    pub fn new(arena: ArenaId, side: Side, coord: GridCoord) -> Self {
        TileKey { arena, side, coord }
    }
}

impl From<Cell> for TileKey {
    fn from(cell: Cell) -> Self {
        TileKey::new(cell.arena, cell.side, cell.coord)
    }
}

#[derive(Default, Debug)]
pub struct TileReservationLedger {
    reserved: HashSet<TileKey>,
    occupied: HashSet<TileKey>,
}

impl TileReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the cell if it is neither occupied nor reserved. Returns false otherwise.
    pub fn try_reserve(&mut self, key: TileKey) -> bool {
        if self.occupied.contains(&key) {
            return false;
        }
        self.reserved.insert(key)
    }

    /// Clears the reservation regardless of who holds it.
    pub fn release(&mut self, key: TileKey) {
        self.reserved.remove(&key);
    }

    pub fn is_reserved(&self, key: TileKey) -> bool {
        self.reserved.contains(&key)
    }

    pub fn is_occupied(&self, key: TileKey) -> bool {
        self.occupied.contains(&key)
    }

    /// Marks a cell occupied without a prior reservation. False if it was taken.
    pub fn occupy(&mut self, key: TileKey) -> bool {
        if self.reserved.contains(&key) {
            return false;
        }
        self.occupied.insert(key)
    }

    pub fn vacate(&mut self, key: TileKey) {
        self.occupied.remove(&key);
    }

    /// The unit arrived: the reservation turns into occupancy.
    pub fn commit(&mut self, key: TileKey) {
        self.reserved.remove(&key);
        self.occupied.insert(key);
    }

    /// Starts moving a unit towards `to`. The cell it leaves stays occupied until the move finishes.
    pub fn begin_move(&mut self, to: TileKey) -> bool {
        self.try_reserve(to)
    }

    /// The unit arrived on `to`.
    pub fn finish_move(&mut self, from: TileKey, to: TileKey) {
        self.vacate(from);
        self.commit(to);
    }

    /// The move got interrupted, the unit stays on its old cell.
    pub fn abort_move(&mut self, to: TileKey) {
        self.release(to);
    }

    pub fn reserved_tiles(&self) -> BTreeSet<TileKey> {
        self.reserved.iter().copied().collect()
    }

    pub fn occupied_tiles(&self) -> BTreeSet<TileKey> {
        self.occupied.iter().copied().collect()
    }

    /// Forgets everything. Called when a new combat phase starts.
    pub fn clear(&mut self) {
        self.reserved.clear();
        self.occupied.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32, y: i32) -> TileKey {
        TileKey::new(0, Side::Home, GridCoord::new(x, y))
    }

    #[test]
    fn reservation_is_exclusive_until_release() {
        let mut ledger = TileReservationLedger::new();
        assert!(ledger.try_reserve(key(1, 1)));
        assert!(!ledger.try_reserve(key(1, 1)));
        assert!(ledger.is_reserved(key(1, 1)));
        ledger.release(key(1, 1));
        ledger.release(key(1, 1));
        assert!(!ledger.is_reserved(key(1, 1)));
        assert!(ledger.try_reserve(key(1, 1)));
    }

    #[test]
    fn occupied_cell_blocks_reservation() {
        let mut ledger = TileReservationLedger::new();
        assert!(ledger.occupy(key(2, 0)));
        assert!(!ledger.try_reserve(key(2, 0)));
        assert!(!ledger.is_reserved(key(2, 0)));
    }

    #[test]
    fn sides_do_not_collide() {
        let mut ledger = TileReservationLedger::new();
        assert!(ledger.try_reserve(key(3, 3)));
        assert!(ledger.try_reserve(TileKey::new(0, Side::Visitor, GridCoord::new(3, 3))));
        assert!(ledger.try_reserve(TileKey::new(1, Side::Home, GridCoord::new(3, 3))));
    }

    #[test]
    fn move_hands_over_the_cell() {
        let mut ledger = TileReservationLedger::new();
        ledger.occupy(key(0, 0));
        assert!(ledger.begin_move(key(0, 1)));
        assert!(!ledger.begin_move(key(0, 1)));
        ledger.finish_move(key(0, 0), key(0, 1));
        assert!(!ledger.is_occupied(key(0, 0)));
        assert!(ledger.is_occupied(key(0, 1)));
        assert!(!ledger.is_reserved(key(0, 1)));
    }

    #[test]
    fn aborted_move_frees_the_target() {
        let mut ledger = TileReservationLedger::new();
        ledger.occupy(key(0, 0));
        assert!(ledger.begin_move(key(1, 0)));
        ledger.abort_move(key(1, 0));
        assert!(ledger.is_occupied(key(0, 0)));
        assert!(ledger.try_reserve(key(1, 0)));
    }

    #[test]
    fn clear_drops_stale_claims() {
        let mut ledger = TileReservationLedger::new();
        ledger.try_reserve(key(1, 2));
        ledger.occupy(key(2, 2));
        ledger.clear();
        assert!(ledger.try_reserve(key(1, 2)));
        assert!(ledger.try_reserve(key(2, 2)));
    }
}
