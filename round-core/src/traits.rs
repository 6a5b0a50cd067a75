//! Core abstractions between the round engine and its collaborators.
//!
//! The round engine never renders, simulates combat or computes unit stats. It talks to those parts of a
//! game only through the traits in this module:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Coordinator (match server room)              │
//! │  ┌──────────────────┐   ┌─────────────────┐  ┌────────────┐  │
//! │  │ RoundOrchestrator│──►│ ArenaReplicator │─►│BoardService│  │
//! │  │ (CoordinatorLogic)   └─────────────────┘  └────────────┘  │
//! │  │                  │──►  CombatResolver                     │
//! │  └──────────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//!                   │ Broadcast (one ordered channel)
//!                   ▼
//!        ┌──────────────────────────────────────┐
//!        │ Observers: ObserverView + BoardService│
//!        │            + PresentationService      │
//!        └──────────────────────────────────────┘
//! ```
//!
//! # Data Flow
//!
//! - **Inbound**: Participant messages arrive via [`CoordinatorLogic::inform_rpc`]
//! - **Outbound**: The coordinator produces [`CoordinatorCommand`]s (broadcasts, kicks)
//! - **Sync**: New observers receive [`CoordinatorLogic::get_view_state`] for the full state

use crate::view_state::MatchView;
use protocol::{ArenaId, Broadcast, EntityRef, GridCoord, ParticipantId, ToCoordinator};
use serde::{Deserialize, Serialize};

/// The two cell sets of an arena.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Cells of the participant owning the arena.
    Home,
    /// Cells the visiting board gets mirrored onto.
    Visitor,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Visitor,
            Side::Visitor => Side::Home,
        }
    }
}

/// Team identity relative to the one looking at the unit. There is no global team value.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Team {
    Friendly,
    Enemy,
}

impl Team {
    /// A unit is friendly exactly when the viewer owns it.
    pub fn relative_to(owner: ParticipantId, viewer: ParticipantId) -> Team {
        if owner == viewer {
            Team::Friendly
        } else {
            Team::Enemy
        }
    }
}

/// One board cell. Cells are addressed by arena, side and the coordinate local to that side.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub arena: ArenaId,
    pub side: Side,
    pub coord: GridCoord,
}

/// The minimal contract of a unit entity.
pub trait Unit {
    /// Sets the team as seen from the local viewer.
    fn set_owner(&mut self, team: Team);

    /// Places the unit on a cell.
    fn assign_to_cell(&mut self, cell: Cell);

    /// Subtracts health.
    fn take_damage(&mut self, amount: i32);

    fn is_alive(&self) -> bool;
}

/// The board service maps arenas and grid coordinates to cells and hosts the unit entities.
///
/// # Implementation Notes
///
/// - [`BoardService::home_cells`] and [`BoardService::visitor_cells`] return `None` for an unknown arena,
///   which the replicator treats as a fatal configuration error for the round.
/// - Occupancy is not tracked here, see [`crate::tile_reservation::TileReservationLedger`].
pub trait BoardService {
    type Unit: Unit;

    /// All arenas in ascending order.
    fn arena_ids(&self) -> Vec<ArenaId>;

    /// The width used for mirroring visiting boards.
    fn board_width(&self, arena: ArenaId) -> Option<i32>;

    fn home_cells(&self, arena: ArenaId) -> Option<Vec<Cell>>;

    fn visitor_cells(&self, arena: ArenaId) -> Option<Vec<Cell>>;

    /// The cell set of one side.
    fn cells(&self, arena: ArenaId, side: Side) -> Option<Vec<Cell>> {
        match side {
            Side::Home => self.home_cells(arena),
            Side::Visitor => self.visitor_cells(arena),
        }
    }

    /// Looks up a single cell, `None` if the arena or the coordinate does not exist.
    fn cell_at(&self, arena: ArenaId, side: Side, coord: GridCoord) -> Option<Cell> {
        self.cells(arena, side)?
            .into_iter()
            .find(|cell| cell.coord == coord)
    }

    /// Spawns a unit entity on an arena, not yet placed on a cell.
    fn spawn_unit(&mut self, arena: ArenaId, unit_type_id: &str, star_level: u32) -> Option<EntityRef>;

    fn unit_mut(&mut self, entity: EntityRef) -> Option<&mut Self::Unit>;

    /// Removes all units of an arena.
    fn clear_arena(&mut self, arena: ArenaId);
}

/// Purely a visibility switch for the arena a participant looks at.
pub trait PresentationService {
    fn activate_arena(&mut self, arena: ArenaId, for_participant: ParticipantId);
}

/// One fight of a round, handed to the [`CombatResolver`].
#[derive(Clone, Debug, PartialEq)]
pub struct Fight {
    pub round: u32,
    pub arena: ArenaId,
    pub home: ParticipantId,
    pub visitor: ParticipantId,
    /// The placements that landed on the home cells.
    pub home_units: Vec<crate::board_codec::UnitPlacement>,
    /// The placements that landed on the visitor cells, already mirrored.
    pub visitor_units: Vec<crate::board_codec::UnitPlacement>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombatOutcome {
    Winner(ParticipantId),
    Draw,
}

/// Combat resolution is external. The coordinator only asks for the outcome of every fight when
/// the combat countdown ran out.
pub trait CombatResolver {
    fn resolve(&mut self, fight: &Fight) -> CombatOutcome;
}

/// Commands emitted by the coordinator to control the session.
///
/// | Command | Network Effect |
/// |---------|----------------|
/// | [`Broadcast`](Self::Broadcast) | Sent in order to all observers |
/// | [`KickPlayer`](Self::KickPlayer) | Targeted disconnect |
/// | [`TerminateMatch`](Self::TerminateMatch) | Disconnect everyone, close the room |
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinatorCommand {
    /// An idempotent state message for all observers. The coordinator has already applied it to its
    /// own view state.
    Broadcast(Broadcast),

    /// Forcibly removes a connection, e.g. when the room is full.
    KickPlayer {
        /// The participant ID to disconnect.
        participant: ParticipantId,
    },

    /// Shuts down the room. This is a terminal state, no further commands are processed.
    TerminateMatch,
}

/// The authoritative coordinator of a match.
///
/// A purely event-driven state machine: it receives events (arrivals, departures, participant messages,
/// elapsed time) and produces commands that the match server translates into network frames.
///
/// # Lifecycle
///
/// ```text
///  player_arrival / player_departure / inform_rpc / tick
///                       │
///                       ▼
///            drain_commands ──► network
///            get_view_state ──► new observers
/// ```
pub trait CoordinatorLogic {
    /// A connection arrived. The match server sends the full view state after this returns.
    fn player_arrival(&mut self, participant: ParticipantId, display_name: String);

    /// A connection got lost or closed intentionally.
    fn player_departure(&mut self, participant: ParticipantId);

    /// A participant message. The sender id is injected by the match server and can be trusted.
    fn inform_rpc(&mut self, participant: ParticipantId, payload: ToCoordinator);

    /// Advances the countdowns by `delta_time` seconds.
    fn tick(&mut self, delta_time: f32);

    /// The complete current state. Must reflect every broadcast that has been emitted.
    fn get_view_state(&self) -> &MatchView;

    /// Collects and clears all pending commands since the last drain.
    fn drain_commands(&mut self) -> Vec<CoordinatorCommand>;
}
