//! The error taxonomy of the round engine.
//!
//! Only [`RoundError::InsufficientPlayers`] and [`RoundError::MissingArena`] are structural. Everything else
//! is isolated to a single snapshot or unit placement, logged and skipped.

use crate::traits::Side;
use protocol::{ArenaId, GridCoord, ParticipantId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoundError {
    /// Starting a match or pairing requires more participants.
    #[error("not enough participants ({available} available, {required} required)")]
    InsufficientPlayers { available: usize, required: usize },

    /// A board snapshot could not be parsed or contains duplicate coordinates.
    #[error("malformed board snapshot: {0}")]
    MalformedSnapshot(String),

    /// The home participant has no arena or the board does not know the arena.
    #[error("no arena for participant {participant} (arena {arena:?})")]
    MissingArena {
        participant: ParticipantId,
        arena: Option<ArenaId>,
    },

    /// A single placement hit an absent, occupied or reserved cell.
    #[error("tile ({}, {}) on the {side:?} side of arena {arena} is unavailable", coord.x, coord.y)]
    TileUnavailable {
        arena: ArenaId,
        side: Side,
        coord: GridCoord,
    },

    /// A participant did not deliver its snapshot in time.
    #[error("participant {participant} sent no board snapshot after {attempts} requests")]
    PeerTimeout {
        participant: ParticipantId,
        attempts: u32,
    },
}
