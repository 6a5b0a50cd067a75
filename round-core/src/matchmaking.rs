//! Pairs the living participants of a round.
//!
//! The pairing is shuffled to avoid deterministic rematches. Which side of a pair is home is never
//! transmitted: every observer derives it from the two ids with [`roles`].

use crate::error::RoundError;
use protocol::{BYE, ParticipantId};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// The opponent of a participant in one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opponent {
    Participant(ParticipantId),
    /// No opponent, no damage, default win.
    Bye,
}

impl Opponent {
    pub fn to_wire(self) -> ParticipantId {
        match self {
            Opponent::Participant(id) => id,
            Opponent::Bye => BYE,
        }
    }

    pub fn from_wire(id: ParticipantId) -> Self {
        if id == BYE {
            Opponent::Bye
        } else {
            Opponent::Participant(id)
        }
    }
}

/// One record of a pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Matchup {
    Fight {
        home: ParticipantId,
        visitor: ParticipantId,
    },
    Bye(ParticipantId),
}

/// Returns `(home, visitor)`. The lower id visits, the home arena hosts the fight.
pub fn roles(a: ParticipantId, b: ParticipantId) -> (ParticipantId, ParticipantId) {
    if a < b { (b, a) } else { (a, b) }
}

/// The pairing of one round. Symmetric, one entry per participant.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchupTable {
    round: u32,
    opponents: BTreeMap<ParticipantId, Opponent>,
    records: Vec<Matchup>,
}

impl MatchupTable {
    /// Pairs consecutive participants of an already shuffled order, the last one of an odd count gets a bye.
    pub fn from_order(round: u32, order: &[ParticipantId]) -> Self {
        let mut opponents = BTreeMap::new();
        let mut records = Vec::with_capacity(order.len().div_ceil(2));
        let pairs = order.chunks_exact(2);
        let leftover = pairs.remainder().first().copied();
        for pair in pairs {
            let (a, b) = (pair[0], pair[1]);
            opponents.insert(a, Opponent::Participant(b));
            opponents.insert(b, Opponent::Participant(a));
            let (home, visitor) = roles(a, b);
            records.push(Matchup::Fight { home, visitor });
        }
        if let Some(single) = leftover {
            opponents.insert(single, Opponent::Bye);
            records.push(Matchup::Bye(single));
        }
        MatchupTable {
            round,
            opponents,
            records,
        }
    }

    /// Rebuilds the table from the parallel arrays of [`protocol::Broadcast::SyncMatchups`].
    pub fn from_wire(round: u32, participant_ids: &[ParticipantId], opponent_ids: &[ParticipantId]) -> Self {
        let mut opponents = BTreeMap::new();
        let mut records = Vec::new();
        for (participant, opponent) in participant_ids.iter().zip(opponent_ids) {
            let opponent = Opponent::from_wire(*opponent);
            opponents.insert(*participant, opponent);
            match opponent {
                Opponent::Bye => records.push(Matchup::Bye(*participant)),
                Opponent::Participant(other) => {
                    let (home, visitor) = roles(*participant, other);
                    if *participant == home {
                        records.push(Matchup::Fight { home, visitor });
                    }
                }
            }
        }
        MatchupTable {
            round,
            opponents,
            records,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn opponent_of(&self, participant: ParticipantId) -> Option<Opponent> {
        self.opponents.get(&participant).copied()
    }

    /// One record per fight or bye, in pairing order.
    pub fn records(&self) -> &[Matchup] {
        &self.records
    }

    pub fn fights(&self) -> impl Iterator<Item = (ParticipantId, ParticipantId)> + '_ {
        self.records.iter().filter_map(|record| match record {
            Matchup::Fight { home, visitor } => Some((*home, *visitor)),
            Matchup::Bye(_) => None,
        })
    }

    /// The fight a participant takes part in as `(home, visitor)`.
    pub fn fight_of(&self, participant: ParticipantId) -> Option<(ParticipantId, ParticipantId)> {
        match self.opponent_of(participant)? {
            Opponent::Participant(other) => Some(roles(participant, other)),
            Opponent::Bye => None,
        }
    }

    pub fn to_wire(&self) -> (Vec<ParticipantId>, Vec<ParticipantId>) {
        self.opponents
            .iter()
            .map(|(participant, opponent)| (*participant, opponent.to_wire()))
            .unzip()
    }
}

/// Produces the order in which participants get paired.
pub trait ParticipantShuffle {
    fn shuffle(&mut self, participants: &mut [ParticipantId]);
}

/// Uniform random permutation.
pub struct RandomShuffle<R: Rng>(pub R);

impl<R: Rng> ParticipantShuffle for RandomShuffle<R> {
    fn shuffle(&mut self, participants: &mut [ParticipantId]) {
        participants.shuffle(&mut self.0);
    }
}

/// A scripted order, participants not listed go last in ascending order.
pub struct FixedOrder(pub Vec<ParticipantId>);

impl ParticipantShuffle for FixedOrder {
    fn shuffle(&mut self, participants: &mut [ParticipantId]) {
        participants.sort_by_key(|id| {
            let position = self.0.iter().position(|p| p == id).unwrap_or(usize::MAX);
            (position, *id)
        });
    }
}

pub struct MatchmakingEngine<S: ParticipantShuffle> {
    shuffle: S,
}

impl<S: ParticipantShuffle> MatchmakingEngine<S> {
    pub fn new(shuffle: S) -> Self {
        MatchmakingEngine { shuffle }
    }

    /// Pairs the living participants. Must not be called with fewer than two, a single survivor ends the match.
    pub fn generate_pairings(
        &mut self,
        round: u32,
        alive: &[ParticipantId],
    ) -> Result<MatchupTable, RoundError> {
        if alive.len() < 2 {
            return Err(RoundError::InsufficientPlayers {
                available: alive.len(),
                required: 2,
            });
        }
        let mut order = alive.to_vec();
        self.shuffle.shuffle(&mut order);
        tracing::debug!(round, ?order, "Pairing order.");
        Ok(MatchupTable::from_order(round, &order))
    }
}
