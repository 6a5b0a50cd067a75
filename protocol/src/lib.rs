//! The ids for frames and the messages that we use. They are used consistently across the match server,
//! the round coordinator and the observing clients.
//!
//! Every frame on the web socket is a header byte followed by a postcard payload.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The buffer sizes for the channels for intra server communication.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Stable id of a participant. Signed, because the wire uses `-1` as the bye sentinel.
pub type ParticipantId = i32;
/// Id of a shared arena instance.
pub type ArenaId = i32;
/// Reference to a spawned unit entity as handed out by the coordinator.
pub type EntityRef = u32;

/// Marks a participant without opponent in [`Broadcast::SyncMatchups`].
pub const BYE: ParticipantId = -1;
/// Winner id announced when nobody survived the final round.
pub const NO_WINNER: ParticipantId = -1;

// Client -> Server.

/// Client -> Server RPC, followed by a postcard encoded [`ToCoordinator`].
pub const SERVER_RPC: u8 = 2;

/// The client leaves on its own. The header byte is the whole message.
pub const CLIENT_DISCONNECTS_SELF: u8 = 3;

// Server -> Client

/// The match room got closed.
pub const SERVER_DISCONNECTS: u8 = 0;
/// The disconnection message is just the byte itself.
pub const SERVER_DISCONNECT_MSG_SIZE: usize = 1;

/// A participant gets kicked, followed by the i32 participant id. Every connection task checks if it is meant.
pub const CLIENT_GETS_KICKED: u8 = 1;
/// Header + participant id (u8 + i32).
pub const CLIENT_GETS_KICKED_MSG_SIZE: usize = 5;

/// Followed by a postcard encoded `Vec<Broadcast>`.
pub const DELTA_UPDATE: u8 = 2;

/// Followed by a postcard encoded complete match view.
pub const FULL_UPDATE: u8 = 3;

/// Followed by an utf8 error text.
pub const SERVER_ERROR: u8 = 5;

/// The response message for the handshake, followed by the i32 participant id.
pub const HAND_SHAKE_RESPONSE: u8 = 6;
/// Header + participant id (u8 + i32).
pub const HAND_SHAKE_RESPONSE_SIZE: usize = 5;

/// The join request. This struct is the first binary message a client sends.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct JoinRequest {
    /// The match mode as listed in the server configuration.
    pub mode: String,
    /// Which room do we want to join. The room gets created on the first join.
    pub room_id: String,
    /// The name shown to the other participants.
    pub display_name: String,
}

/// The phases of a match. `Finished` is terminal.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Waiting for enough participants.
    #[default]
    Waiting,
    /// Participants edit their boards.
    Prep,
    /// Boards get replicated and the fights happen.
    Combat,
    /// Damage gets applied.
    Results,
    /// At most one participant is left.
    Finished,
}

/// An integer grid coordinate, local to one cell set of an arena.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        GridCoord { x, y }
    }
}

/// Messages the coordinator sends to every observer. All of them are "set state to X" messages
/// except [`Broadcast::ApplyDamage`], so the latest value always wins.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Broadcast {
    /// Sets the local phase.
    EnterPhase(Phase),
    /// Last value wins countdown.
    SyncTimer { seconds_remaining: f32 },
    /// The current round, starting at 1.
    SyncRound { round: u32 },
    /// Parallel arrays, `opponent_ids[i] == BYE` flags a bye for `participant_ids[i]`.
    SyncMatchups {
        participant_ids: Vec<ParticipantId>,
        opponent_ids: Vec<ParticipantId>,
    },
    /// The fixed home arena of every participant, sent once at match start.
    SyncArenas {
        participant_ids: Vec<ParticipantId>,
        arena_ids: Vec<ArenaId>,
    },
    /// Name and health of one participant.
    SyncParticipant {
        participant_id: ParticipantId,
        display_name: String,
        health: i32,
    },
    /// The coordinator still waits for the board snapshot of the owner.
    RequestSnapshot { owner_id: ParticipantId },
    /// A unit entity got spawned on an arena. Always precedes the matching [`Broadcast::ConfigureUnit`].
    SpawnUnit {
        entity_ref: EntityRef,
        arena_id: ArenaId,
        unit_type_id: String,
        star_level: u32,
    },
    /// Places a spawned unit. Team identity is derived by every observer on its own.
    ConfigureUnit {
        entity_ref: EntityRef,
        owner_id: ParticipantId,
        arena_id: ArenaId,
        grid_x: i32,
        grid_y: i32,
    },
    /// Health loss of one participant.
    ApplyDamage { target_id: ParticipantId, amount: i32 },
    /// The match is over.
    AnnounceWinner { winner_id: ParticipantId },
}

/// Messages observers send to the coordinator.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum ToCoordinator {
    /// The board of the owner, JSON `{positions: [{unitTypeId, starLevel, gridX, gridY}]}`.
    SendBoardSnapshot {
        owner_id: ParticipantId,
        snapshot_json: String,
    },
    /// Changes the name shown to the others.
    SetDisplayName(String),
    /// Moves one of the own units to another cell on the same side of its arena during combat.
    RelocateUnit {
        entity_ref: EntityRef,
        grid_x: i32,
        grid_y: i32,
    },
}

/// Builds a frame out of the header and a postcard encoded payload.
pub fn encode_frame<T: Serialize>(header: u8, payload: &T) -> Result<Bytes, postcard::Error> {
    let body = postcard::to_stdvec(payload)?;
    let mut msg = BytesMut::with_capacity(1 + body.len());
    msg.put_u8(header);
    msg.put_slice(&body);
    Ok(msg.freeze())
}

/// Decodes the payload behind the header byte.
pub fn decode_payload<T: DeserializeOwned>(frame: &[u8]) -> Result<T, postcard::Error> {
    let Some(body) = frame.get(1..) else {
        return Err(postcard::Error::DeserializeUnexpectedEnd);
    };
    postcard::from_bytes(body)
}

/// Builds the frame announcing that a participant got kicked.
pub fn kick_frame(participant: ParticipantId) -> Bytes {
    let mut msg = BytesMut::with_capacity(CLIENT_GETS_KICKED_MSG_SIZE);
    msg.put_u8(CLIENT_GETS_KICKED);
    msg.put_i32(participant);
    msg.freeze()
}
