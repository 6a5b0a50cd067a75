//! Round orchestration and board replication for an auto-battler.
//!
//! The [`round_orchestrator::RoundOrchestrator`] is the authoritative coordinator of a match. Observers
//! mirror its state with [`observer_view::ObserverView`].

pub mod arena_assignment;
pub mod arena_replicator;
pub mod board_codec;
pub mod combat;
pub mod config;
pub mod error;
pub mod grid_board;
pub mod matchmaking;
pub mod observer_view;
pub mod participant_ledger;
pub mod round_orchestrator;
pub mod tile_reservation;
pub mod timer;
pub mod traits;
pub mod view_state;
