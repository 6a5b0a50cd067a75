//! The view state as needed by observers. This is the central data structure that gets synchronized:
//! a new observer receives it whole, afterwards every [`Broadcast`] is applied on top of it.

use crate::arena_assignment::ArenaAssignment;
use crate::matchmaking::MatchupTable;
use protocol::{ArenaId, Broadcast, EntityRef, GridCoord, NO_WINNER, ParticipantId, Phase};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub display_name: String,
    pub health: i32,
}

/// A unit replicated onto an arena in the current round.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ReplicatedUnit {
    pub entity_ref: EntityRef,
    pub arena_id: ArenaId,
    pub unit_type_id: String,
    pub star_level: u32,
    /// Set once the configuration message arrived.
    pub owner_id: Option<ParticipantId>,
    pub coord: Option<GridCoord>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MatchView {
    pub phase: Phase,
    pub seconds_remaining: f32,
    pub round: u32,
    /// Sorted by id.
    pub participants: Vec<ParticipantView>,
    /// Parallel arrays as in [`Broadcast::SyncMatchups`], empty outside of a combat round.
    pub matchup_participants: Vec<ParticipantId>,
    pub matchup_opponents: Vec<ParticipantId>,
    pub arena_participants: Vec<ParticipantId>,
    pub arena_ids: Vec<ArenaId>,
    pub units: Vec<ReplicatedUnit>,
    pub winner_id: Option<ParticipantId>,
}

impl MatchView {
    /// Applies a broadcast. Every message except the damage sets a value, so applying the latest message
    /// twice leaves the view unchanged.
    pub fn apply(&mut self, message: &Broadcast) {
        match message {
            Broadcast::EnterPhase(phase) => {
                self.phase = *phase;
                if *phase == Phase::Prep {
                    self.clear_round();
                }
            }
            Broadcast::SyncTimer { seconds_remaining } => {
                self.seconds_remaining = *seconds_remaining;
            }
            Broadcast::SyncRound { round } => {
                if *round != self.round {
                    self.clear_round();
                }
                self.round = *round;
            }
            Broadcast::SyncMatchups {
                participant_ids,
                opponent_ids,
            } => {
                self.matchup_participants = participant_ids.clone();
                self.matchup_opponents = opponent_ids.clone();
            }
            Broadcast::SyncArenas {
                participant_ids,
                arena_ids,
            } => {
                self.arena_participants = participant_ids.clone();
                self.arena_ids = arena_ids.clone();
            }
            Broadcast::SyncParticipant {
                participant_id,
                display_name,
                health,
            } => {
                let entry = ParticipantView {
                    id: *participant_id,
                    display_name: display_name.clone(),
                    health: *health,
                };
                match self
                    .participants
                    .binary_search_by_key(participant_id, |p| p.id)
                {
                    Ok(index) => self.participants[index] = entry,
                    Err(index) => self.participants.insert(index, entry),
                }
            }
            Broadcast::RequestSnapshot { .. } => {}
            Broadcast::SpawnUnit {
                entity_ref,
                arena_id,
                unit_type_id,
                star_level,
            } => {
                self.units.retain(|u| u.entity_ref != *entity_ref);
                self.units.push(ReplicatedUnit {
                    entity_ref: *entity_ref,
                    arena_id: *arena_id,
                    unit_type_id: unit_type_id.clone(),
                    star_level: *star_level,
                    owner_id: None,
                    coord: None,
                });
            }
            Broadcast::ConfigureUnit {
                entity_ref,
                owner_id,
                grid_x,
                grid_y,
                ..
            } => {
                if let Some(unit) = self.units.iter_mut().find(|u| u.entity_ref == *entity_ref) {
                    unit.owner_id = Some(*owner_id);
                    unit.coord = Some(GridCoord::new(*grid_x, *grid_y));
                }
            }
            Broadcast::ApplyDamage { target_id, amount } => {
                if let Some(participant) = self.participants.iter_mut().find(|p| p.id == *target_id) {
                    participant.health = (participant.health - (*amount).max(0)).max(0);
                }
            }
            Broadcast::AnnounceWinner { winner_id } => {
                self.winner_id = (*winner_id != NO_WINNER).then_some(*winner_id);
            }
        }
    }

    /// Matchups and units are only valid within their round.
    fn clear_round(&mut self) {
        self.matchup_participants.clear();
        self.matchup_opponents.clear();
        self.units.clear();
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn matchups(&self) -> MatchupTable {
        MatchupTable::from_wire(self.round, &self.matchup_participants, &self.matchup_opponents)
    }

    pub fn arenas(&self) -> ArenaAssignment {
        ArenaAssignment::from_wire(&self.arena_participants, &self.arena_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: ParticipantId, health: i32) -> Broadcast {
        Broadcast::SyncParticipant {
            participant_id: id,
            display_name: format!("p{id}"),
            health,
        }
    }

    #[test]
    fn latest_value_wins() {
        let mut view = MatchView::default();
        view.apply(&Broadcast::SyncTimer {
            seconds_remaining: 10.0,
        });
        view.apply(&Broadcast::EnterPhase(Phase::Combat));
        view.apply(&Broadcast::SyncTimer {
            seconds_remaining: 3.0,
        });
        let snapshot = view.clone();
        view.apply(&Broadcast::SyncTimer {
            seconds_remaining: 3.0,
        });
        assert_eq!(view, snapshot);
        assert_eq!(view.phase, Phase::Combat);
        assert_eq!(view.seconds_remaining, 3.0);
    }

    #[test]
    fn participants_stay_sorted() {
        let mut view = MatchView::default();
        view.apply(&participant(5, 100));
        view.apply(&participant(2, 100));
        view.apply(&participant(5, 80));
        let ids: Vec<ParticipantId> = view.participants.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(view.participant(5).map(|p| p.health), Some(80));
    }

    #[test]
    fn damage_is_floor_clamped() {
        let mut view = MatchView::default();
        view.apply(&participant(1, 15));
        view.apply(&Broadcast::ApplyDamage {
            target_id: 1,
            amount: 40,
        });
        assert_eq!(view.participant(1).map(|p| p.health), Some(0));
    }

    #[test]
    fn new_round_drops_stale_matchups() {
        let mut view = MatchView::default();
        view.apply(&Broadcast::SyncRound { round: 1 });
        view.apply(&Broadcast::SyncMatchups {
            participant_ids: vec![1, 2],
            opponent_ids: vec![2, 1],
        });
        assert_eq!(view.matchups().fights().count(), 1);
        view.apply(&Broadcast::SyncRound { round: 2 });
        assert_eq!(view.matchups().records().len(), 0);
    }

    #[test]
    fn configuration_completes_a_spawned_unit() {
        let mut view = MatchView::default();
        view.apply(&Broadcast::SpawnUnit {
            entity_ref: 4,
            arena_id: 1,
            unit_type_id: "mage".to_string(),
            star_level: 2,
        });
        view.apply(&Broadcast::ConfigureUnit {
            entity_ref: 4,
            owner_id: 9,
            arena_id: 1,
            grid_x: 5,
            grid_y: 3,
        });
        assert_eq!(view.units[0].owner_id, Some(9));
        assert_eq!(view.units[0].coord, Some(GridCoord::new(5, 3)));
        view.apply(&Broadcast::AnnounceWinner { winner_id: NO_WINNER });
        assert_eq!(view.winner_id, None);
    }
}
