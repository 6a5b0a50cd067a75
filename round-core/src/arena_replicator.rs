//! Copies a participant's board onto the arena that hosts its fight.
//!
//! The coordinator spawns every unit and broadcasts a spawn message followed by a configuration message.
//! Observers then derive the team of the unit relative to themselves with [`perspective`]: the same
//! configuration message yields "friendly" on the owner's client and "enemy" everywhere else.

use crate::board_codec::UnitPlacement;
use crate::error::RoundError;
use crate::tile_reservation::{TileKey, TileReservationLedger};
use crate::traits::{BoardService, Side, Team, Unit};
use protocol::{ArenaId, Broadcast, EntityRef, GridCoord, ParticipantId};

/// Mirrors an x coordinate within a board of the given width. An involution for `0 <= x < width`.
pub fn mirror(x: i32, width: i32) -> i32 {
    width - 1 - x
}

/// The result of replicating one snapshot.
#[derive(Debug, Default, PartialEq)]
pub struct ReplicationReport {
    /// The spawned units with their placement on the arena (destination coordinates).
    pub spawned: Vec<(EntityRef, UnitPlacement)>,
    /// Placements that were skipped.
    pub dropped: Vec<(UnitPlacement, RoundError)>,
    /// Spawn and configuration messages in the order they have to be sent.
    pub messages: Vec<Broadcast>,
}

impl ReplicationReport {
    /// The placements that made it onto the arena.
    pub fn landed(&self) -> Vec<UnitPlacement> {
        self.spawned.iter().map(|(_, p)| p.clone()).collect()
    }
}

/// How an observer sees a configured unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Perspective {
    pub team: Team,
    /// The tile list the unit's cell gets resolved on.
    pub side: Side,
}

/// Derives team and tile list of a unit for one observer.
///
/// * `viewer_side` is the side the observer fights on in this arena, `None` if the observer only watches.
/// * `owner_side` is the side of the owner in this arena.
///
/// Own units resolve on the observer's own side, foreign units on the opposing one. An observer without
/// a side on the arena sees both boards as enemy and falls back to the owner's side.
pub fn perspective(
    owner: ParticipantId,
    viewer: ParticipantId,
    viewer_side: Option<Side>,
    owner_side: Side,
) -> Perspective {
    let team = Team::relative_to(owner, viewer);
    let side = match (team, viewer_side) {
        (Team::Friendly, Some(side)) => side,
        (Team::Enemy, Some(side)) => side.opposite(),
        (_, None) => owner_side,
    };
    Perspective { team, side }
}

#[derive(Default)]
pub struct ArenaReplicator;

impl ArenaReplicator {
    pub fn new() -> Self {
        ArenaReplicator
    }

    /// Replicates the placements of `owner` onto `arena`.
    ///
    /// A missing arena is fatal for the fight. Placements on absent, occupied or reserved cells are
    /// dropped one by one and never abort the rest of the snapshot.
    pub fn replicate<B: BoardService>(
        &self,
        board: &mut B,
        reservations: &mut TileReservationLedger,
        placements: &[UnitPlacement],
        owner: ParticipantId,
        arena: ArenaId,
        owner_is_visitor: bool,
    ) -> Result<ReplicationReport, RoundError> {
        let side = if owner_is_visitor {
            Side::Visitor
        } else {
            Side::Home
        };
        let missing_arena = || RoundError::MissingArena {
            participant: owner,
            arena: Some(arena),
        };
        let width = board.board_width(arena).ok_or_else(missing_arena)?;
        // The destination cell set has to exist, otherwise there is no board to fight on.
        board.cells(arena, side).ok_or_else(missing_arena)?;

        // On the coordinator the arena is seen from its home participant.
        let team = if owner_is_visitor {
            Team::Enemy
        } else {
            Team::Friendly
        };

        let mut report = ReplicationReport::default();
        for placement in placements {
            let destination = if owner_is_visitor {
                GridCoord::new(mirror(placement.coord.x, width), placement.coord.y)
            } else {
                placement.coord
            };
            let unavailable = RoundError::TileUnavailable {
                arena,
                side,
                coord: destination,
            };

            let Some(cell) = board.cell_at(arena, side, destination) else {
                tracing::warn!(owner, arena, ?destination, "Placement outside the arena dropped.");
                report.dropped.push((placement.clone(), unavailable));
                continue;
            };
            let key = TileKey::from(cell);
            if !reservations.try_reserve(key) {
                tracing::warn!(owner, arena, ?destination, "Placement on a taken cell dropped.");
                report.dropped.push((placement.clone(), unavailable));
                continue;
            }
            let Some(entity) = board.spawn_unit(arena, &placement.unit_type_id, placement.star_level)
            else {
                reservations.release(key);
                tracing::warn!(owner, arena, unit = %placement.unit_type_id, "Unit could not be spawned.");
                report.dropped.push((placement.clone(), unavailable));
                continue;
            };
            if let Some(unit) = board.unit_mut(entity) {
                unit.set_owner(team);
                unit.assign_to_cell(cell);
            }
            reservations.commit(key);

            report.messages.push(Broadcast::SpawnUnit {
                entity_ref: entity,
                arena_id: arena,
                unit_type_id: placement.unit_type_id.clone(),
                star_level: placement.star_level,
            });
            report.messages.push(Broadcast::ConfigureUnit {
                entity_ref: entity,
                owner_id: owner,
                arena_id: arena,
                grid_x: destination.x,
                grid_y: destination.y,
            });
            report.spawned.push((
                entity,
                UnitPlacement {
                    coord: destination,
                    ..placement.clone()
                },
            ));
        }
        tracing::debug!(
            owner,
            arena,
            spawned = report.spawned.len(),
            dropped = report.dropped.len(),
            "Board replicated."
        );
        Ok(report)
    }
}
