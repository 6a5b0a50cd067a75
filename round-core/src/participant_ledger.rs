//! Health, elimination and standings of the participants of one match.

use crate::error::RoundError;
use protocol::ParticipantId;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantState {
    pub id: ParticipantId,
    pub display_name: String,
    pub health: i32,
    /// The round the participant is currently playing or was eliminated in.
    pub round: u32,
    pub eliminated_in: Option<u32>,
    /// Lost the connection. Gets eliminated at the next results phase.
    pub disconnected: bool,
}

impl ParticipantState {
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// Participants are never removed, eliminated ones are needed for the final standings.
#[derive(Clone, Debug)]
pub struct ParticipantLedger {
    participants: BTreeMap<ParticipantId, ParticipantState>,
    round: u32,
}

impl ParticipantLedger {
    /// Creates the ledger, at least one participant is required.
    pub fn new(
        participants: &[(ParticipantId, String)],
        starting_health: i32,
    ) -> Result<Self, RoundError> {
        if participants.is_empty() {
            return Err(RoundError::InsufficientPlayers {
                available: 0,
                required: 1,
            });
        }
        let participants = participants
            .iter()
            .map(|(id, name)| {
                (
                    *id,
                    ParticipantState {
                        id: *id,
                        display_name: name.clone(),
                        health: starting_health,
                        round: 0,
                        eliminated_in: None,
                        disconnected: false,
                    },
                )
            })
            .collect();
        Ok(ParticipantLedger {
            participants,
            round: 0,
        })
    }

    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantState> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantState> {
        self.participants.values()
    }

    pub fn set_round(&mut self, round: u32) {
        self.round = round;
        for state in self.participants.values_mut().filter(|s| s.is_alive()) {
            state.round = round;
        }
    }

    pub fn set_display_name(&mut self, id: ParticipantId, name: String) -> bool {
        match self.participants.get_mut(&id) {
            Some(state) => {
                state.display_name = name;
                true
            }
            None => false,
        }
    }

    /// Subtracts health and clamps at 0. Returns the health actually lost, which is 0 for an
    /// eliminated or unknown participant.
    pub fn apply_damage(&mut self, id: ParticipantId, amount: i32) -> i32 {
        let Some(state) = self.participants.get_mut(&id) else {
            tracing::warn!(participant = id, "Damage for unknown participant.");
            return 0;
        };
        if !state.is_alive() {
            return 0;
        }
        let lost = amount.clamp(0, state.health);
        state.health -= lost;
        if !state.is_alive() {
            state.eliminated_in = Some(self.round);
            tracing::info!(participant = id, round = self.round, "Participant eliminated.");
        }
        lost
    }

    /// All living participants in ascending id order.
    pub fn alive(&self) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|s| s.is_alive())
            .map(|s| s.id)
            .collect()
    }

    /// Only defined when exactly one participant is alive.
    pub fn winner(&self) -> Option<ParticipantId> {
        match self.alive().as_slice() {
            [winner] => Some(*winner),
            _ => None,
        }
    }

    pub fn mark_disconnected(&mut self, id: ParticipantId) {
        if let Some(state) = self.participants.get_mut(&id) {
            state.disconnected = true;
        }
    }

    pub fn is_disconnected(&self, id: ParticipantId) -> bool {
        self.participants.get(&id).is_some_and(|s| s.disconnected)
    }

    /// Eliminates every living disconnected participant. Returns the damage dealt per participant.
    pub fn eliminate_disconnected(&mut self) -> Vec<(ParticipantId, i32)> {
        let targets: Vec<(ParticipantId, i32)> = self
            .participants
            .values()
            .filter(|s| s.disconnected && s.is_alive())
            .map(|s| (s.id, s.health))
            .collect();
        targets
            .into_iter()
            .map(|(id, health)| (id, self.apply_damage(id, health)))
            .collect()
    }

    /// Final placement: survivors first, then the later an elimination happened the better.
    pub fn standings(&self) -> Vec<ParticipantId> {
        let mut states: Vec<&ParticipantState> = self.participants.values().collect();
        states.sort_by(|a, b| {
            b.is_alive()
                .cmp(&a.is_alive())
                .then(b.eliminated_in.cmp(&a.eliminated_in))
                .then(b.health.cmp(&a.health))
                .then(a.id.cmp(&b.id))
        });
        states.into_iter().map(|s| s.id).collect()
    }
}
