//! The observing side of the replication: applies the broadcasts of the coordinator to a local view and a
//! local board replica, and resolves every configured unit relative to the local participant.
//!
//! A participant also answers the coordinator: when it gets paired for combat, and whenever its snapshot
//! is requested again, [`ObserverView::apply`] returns the encoded local roster.

use crate::arena_replicator::perspective;
use crate::board_codec::{self, RosterUnit};
use crate::error::RoundError;
use crate::traits::{BoardService, Cell, PresentationService, Side, Team, Unit};
use crate::view_state::MatchView;
use protocol::{ArenaId, Broadcast, EntityRef, GridCoord, ParticipantId, Phase, ToCoordinator};
use std::collections::BTreeMap;

/// A replicated unit as the local participant sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedUnit {
    /// The entity of the local replica.
    pub local: EntityRef,
    pub owner: ParticipantId,
    pub team: Team,
    pub cell: Cell,
}

pub struct ObserverView<B: BoardService, P: PresentationService> {
    me: ParticipantId,
    view: MatchView,
    board: B,
    presentation: P,
    /// Coordinator entity reference to local replica.
    replicas: BTreeMap<EntityRef, EntityRef>,
    resolved: BTreeMap<EntityRef, ResolvedUnit>,
    /// The own units, bench included. Sent as snapshot when combat starts.
    roster: Vec<RosterUnit>,
}

impl<B: BoardService, P: PresentationService> ObserverView<B, P> {
    pub fn new(me: ParticipantId, board: B, presentation: P) -> Self {
        ObserverView {
            me,
            view: MatchView::default(),
            board,
            presentation,
            replicas: BTreeMap::new(),
            resolved: BTreeMap::new(),
            roster: Vec::new(),
        }
    }

    pub fn view(&self) -> &MatchView {
        &self.view
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// Replaces the own roster, e.g. after the participant rearranged its board during preparation.
    pub fn set_roster(&mut self, roster: Vec<RosterUnit>) {
        self.roster = roster;
    }

    pub fn roster(&self) -> &[RosterUnit] {
        &self.roster
    }

    /// Looks up a unit by the reference the coordinator handed out.
    pub fn resolved_unit(&self, entity_ref: EntityRef) -> Option<&ResolvedUnit> {
        self.resolved.get(&entity_ref)
    }

    /// Replaces everything with a full view, as received on joining.
    pub fn apply_full(&mut self, view: MatchView) {
        self.clear_replicas();
        let units = view.units.clone();
        self.view = view;
        self.activate_watched_arena();
        for unit in units {
            self.spawn_replica(unit.entity_ref, unit.arena_id, &unit.unit_type_id, unit.star_level);
            if let (Some(owner), Some(coord)) = (unit.owner_id, unit.coord) {
                self.configure_replica(unit.entity_ref, owner, unit.arena_id, coord);
            }
        }
    }

    /// Applies one broadcast. Returns the answer the coordinator expects from this participant, if any.
    pub fn apply(&mut self, message: &Broadcast) -> Option<ToCoordinator> {
        let previous_round = self.view.round;
        self.view.apply(message);
        match message {
            Broadcast::EnterPhase(Phase::Prep) => {
                self.clear_replicas();
                self.activate_watched_arena();
            }
            Broadcast::SyncRound { round } if *round != previous_round => {
                self.clear_replicas();
            }
            Broadcast::SyncMatchups { .. } => {
                self.activate_watched_arena();
                if self.view.phase == Phase::Combat && self.view.matchups().fight_of(self.me).is_some() {
                    return self.board_snapshot();
                }
            }
            Broadcast::RequestSnapshot { owner_id } if *owner_id == self.me && self.view.phase == Phase::Combat => {
                return self.board_snapshot();
            }
            Broadcast::SpawnUnit {
                entity_ref,
                arena_id,
                unit_type_id,
                star_level,
            } => self.spawn_replica(*entity_ref, *arena_id, unit_type_id, *star_level),
            Broadcast::ConfigureUnit {
                entity_ref,
                owner_id,
                arena_id,
                grid_x,
                grid_y,
            } => self.configure_replica(*entity_ref, *owner_id, *arena_id, GridCoord::new(*grid_x, *grid_y)),
            _ => {}
        }
        None
    }

    fn board_snapshot(&self) -> Option<ToCoordinator> {
        match board_codec::to_json(&board_codec::encode(&self.roster)) {
            Ok(snapshot_json) => Some(ToCoordinator::SendBoardSnapshot {
                owner_id: self.me,
                snapshot_json,
            }),
            Err(error) => {
                tracing::warn!(%error, participant = self.me, "Board snapshot could not be encoded.");
                None
            }
        }
    }

    fn clear_replicas(&mut self) {
        for arena in self.board.arena_ids() {
            self.board.clear_arena(arena);
        }
        self.replicas.clear();
        self.resolved.clear();
    }

    /// The arena hosting the own fight, the own arena otherwise. Spectators have none.
    fn watched_arena(&self) -> Option<ArenaId> {
        let arenas = self.view.arenas();
        match self.view.matchups().fight_of(self.me) {
            Some((home, _)) => arenas.arena_of(home),
            None => arenas.arena_of(self.me),
        }
    }

    fn activate_watched_arena(&mut self) {
        if let Some(arena) = self.watched_arena() {
            self.presentation.activate_arena(arena, self.me);
        }
    }

    /// The side a participant takes on an arena in the current round, `None` if it does not fight there.
    fn side_on(&self, participant: ParticipantId, arena: ArenaId) -> Option<Side> {
        let arenas = self.view.arenas();
        match self.view.matchups().fight_of(participant) {
            Some((home, visitor)) if arenas.arena_of(home) == Some(arena) => {
                Some(if participant == visitor { Side::Visitor } else { Side::Home })
            }
            Some(_) => None,
            None => (arenas.arena_of(participant) == Some(arena)).then_some(Side::Home),
        }
    }

    fn spawn_replica(&mut self, entity_ref: EntityRef, arena: ArenaId, unit_type_id: &str, star_level: u32) {
        match self.board.spawn_unit(arena, unit_type_id, star_level) {
            Some(local) => {
                self.replicas.insert(entity_ref, local);
            }
            None => {
                let error = RoundError::MissingArena {
                    participant: self.me,
                    arena: Some(arena),
                };
                tracing::warn!(%error, entity_ref, "Replica could not be spawned.");
            }
        }
    }

    fn configure_replica(&mut self, entity_ref: EntityRef, owner: ParticipantId, arena: ArenaId, coord: GridCoord) {
        let Some(local) = self.replicas.get(&entity_ref).copied() else {
            tracing::warn!(entity_ref, "Configuration for an unknown unit.");
            return;
        };
        let owner_side = self.side_on(owner, arena).unwrap_or(Side::Home);
        let viewer_side = self.side_on(self.me, arena);
        let seen = perspective(owner, self.me, viewer_side, owner_side);
        let Some(cell) = self.board.cell_at(arena, seen.side, coord) else {
            let error = RoundError::TileUnavailable {
                arena,
                side: seen.side,
                coord,
            };
            tracing::warn!(%error, entity_ref, "Replica could not be placed.");
            return;
        };
        if let Some(unit) = self.board.unit_mut(local) {
            unit.set_owner(seen.team);
            unit.assign_to_cell(cell);
        }
        self.resolved.insert(
            entity_ref,
            ResolvedUnit {
                local,
                owner,
                team: seen.team,
                cell,
            },
        );
    }
}
