//! Property-based tests for pairing, mirroring, the snapshot codec, reservations and damage.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use protocol::{GridCoord, ParticipantId};
use round_core::arena_replicator::mirror;
use round_core::board_codec::{self, RosterUnit, UnitLocation, UnitPlacement};
use round_core::matchmaking::{Matchup, MatchmakingEngine, Opponent, RandomShuffle};
use round_core::participant_ledger::ParticipantLedger;
use round_core::tile_reservation::{TileKey, TileReservationLedger};
use round_core::traits::Side;

const UNIT_TYPES: [&str; 4] = ["knight", "archer", "mage", "golem"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Every living participant appears exactly once, with at most one bye.
    #[test]
    fn prop_pairings_are_complete_and_symmetric(
        ids in prop::collection::btree_set(1i32..500, 2..40),
        seed in any::<u64>()
    ) {
        let alive: Vec<ParticipantId> = ids.iter().copied().collect();
        let mut engine = MatchmakingEngine::new(RandomShuffle(StdRng::seed_from_u64(seed)));
        let table = engine.generate_pairings(1, &alive).unwrap();

        prop_assert_eq!(table.records().len(), alive.len().div_ceil(2));
        let byes = table.records().iter().filter(|r| matches!(r, Matchup::Bye(_))).count();
        prop_assert!(byes <= 1);
        prop_assert_eq!(byes, alive.len() % 2);

        for id in &alive {
            match table.opponent_of(*id) {
                Some(Opponent::Participant(other)) => {
                    prop_assert_ne!(other, *id);
                    prop_assert_eq!(table.opponent_of(other), Some(Opponent::Participant(*id)));
                }
                Some(Opponent::Bye) => {}
                None => prop_assert!(false, "participant {} was not paired", id),
            }
        }
    }

    /// Mirroring twice is the identity and stays on the board.
    #[test]
    fn prop_mirror_is_an_involution(width in 1i32..64, offset in 0i32..64) {
        let x = offset % width;
        let mirrored = mirror(x, width);
        prop_assert!((0..width).contains(&mirrored));
        prop_assert_eq!(mirror(mirrored, width), x);
    }

    /// Decoding an encoded roster yields exactly the units on the board, in roster order.
    #[test]
    fn prop_codec_keeps_board_units(
        board in prop::collection::btree_map((0i32..8, 0i32..4), (0usize..4, 1u32..4), 0..20),
        bench in prop::collection::vec((0usize..4, 1u32..4), 0..8)
    ) {
        let mut roster: Vec<RosterUnit> = Vec::new();
        for (slot, (kind, stars)) in bench.iter().enumerate() {
            roster.push(RosterUnit {
                unit_type_id: UNIT_TYPES[*kind].to_string(),
                star_level: *stars,
                location: UnitLocation::Bench(slot),
            });
        }
        for ((x, y), (kind, stars)) in &board {
            roster.push(RosterUnit {
                unit_type_id: UNIT_TYPES[*kind].to_string(),
                star_level: *stars,
                location: UnitLocation::Board(GridCoord::new(*x, *y)),
            });
        }

        let json = board_codec::to_json(&board_codec::encode(&roster)).unwrap();
        let decoded = board_codec::decode_json(&json).unwrap();
        let expected: Vec<UnitPlacement> = board
            .iter()
            .map(|((x, y), (kind, stars))| UnitPlacement {
                unit_type_id: UNIT_TYPES[*kind].to_string(),
                star_level: *stars,
                coord: GridCoord::new(*x, *y),
            })
            .collect();
        prop_assert_eq!(decoded, expected);
    }

    /// A cell can only be claimed again after its release.
    #[test]
    fn prop_reservations_are_exclusive(
        cells in prop::collection::vec((0i32..3, any::<bool>(), 0i32..8, 0i32..4), 1..50)
    ) {
        let mut ledger = TileReservationLedger::new();
        let mut held = BTreeSet::new();
        for (arena, visitor, x, y) in cells {
            let side = if visitor { Side::Visitor } else { Side::Home };
            let key = TileKey::new(arena, side, GridCoord::new(x, y));
            let fresh = held.insert((arena, visitor, x, y));
            prop_assert_eq!(ledger.try_reserve(key), fresh);
            prop_assert!(!ledger.try_reserve(key));
            prop_assert!(ledger.is_reserved(key));
        }
        let (arena, visitor, x, y) = *held.iter().next().unwrap();
        let side = if visitor { Side::Visitor } else { Side::Home };
        let key = TileKey::new(arena, side, GridCoord::new(x, y));
        ledger.release(key);
        ledger.release(key);
        prop_assert!(ledger.try_reserve(key));
    }

    /// Health never rises, never drops below zero and stays at zero.
    #[test]
    fn prop_damage_is_monotonic(amounts in prop::collection::vec(-50i32..200, 1..30)) {
        let mut ledger = ParticipantLedger::new(&[(1, "solo".to_string())], 100).unwrap();
        let mut previous = 100;
        for amount in amounts {
            let lost = ledger.apply_damage(1, amount);
            let health = ledger.get(1).unwrap().health;
            prop_assert!(health >= 0);
            prop_assert!(health <= previous);
            prop_assert_eq!(previous - health, lost);
            if previous == 0 {
                prop_assert_eq!(lost, 0);
            }
            previous = health;
        }
        prop_assert_eq!(ledger.get(1).unwrap().is_alive(), previous > 0);
    }
}
