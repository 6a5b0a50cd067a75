//! The fixed mapping from participant to home arena. Established once at match start.

use protocol::{ArenaId, ParticipantId};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArenaAssignment {
    by_participant: BTreeMap<ParticipantId, ArenaId>,
}

impl ArenaAssignment {
    /// Hands out the arenas in ascending participant order. Participants beyond the arena capacity
    /// stay without arena, fights they host cannot take place.
    pub fn establish(participants: &[ParticipantId], arenas: &[ArenaId]) -> Self {
        let mut sorted = participants.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() > arenas.len() {
            tracing::warn!(
                participants = sorted.len(),
                arenas = arenas.len(),
                "More participants than arenas, some participants have no home arena."
            );
        }
        let by_participant = sorted.into_iter().zip(arenas.iter().copied()).collect();
        ArenaAssignment { by_participant }
    }

    pub fn from_wire(participant_ids: &[ParticipantId], arena_ids: &[ArenaId]) -> Self {
        ArenaAssignment {
            by_participant: participant_ids
                .iter()
                .copied()
                .zip(arena_ids.iter().copied())
                .collect(),
        }
    }

    pub fn arena_of(&self, participant: ParticipantId) -> Option<ArenaId> {
        self.by_participant.get(&participant).copied()
    }

    pub fn to_wire(&self) -> (Vec<ParticipantId>, Vec<ArenaId>) {
        self.by_participant.iter().map(|(p, a)| (*p, *a)).unzip()
    }
}
