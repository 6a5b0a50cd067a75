//! The authoritative phase state machine of a match. All game relevant decisions are concentrated here.
//!
//! ```text
//! Waiting ──► Prep ──► Combat ──► Results ──► Prep (next round)
//!                         │           │
//!                         └───────────┴──► Finished (at most one alive)
//! ```
//!
//! Every change is emitted as a [`Broadcast`] that has already been applied to the own [`MatchView`].

use crate::arena_assignment::ArenaAssignment;
use crate::arena_replicator::ArenaReplicator;
use crate::board_codec::{self, UnitPlacement};
use crate::config::MatchConfig;
use crate::error::RoundError;
use crate::matchmaking::{Matchup, MatchmakingEngine, MatchupTable, ParticipantShuffle};
use crate::participant_ledger::ParticipantLedger;
use crate::tile_reservation::{TileKey, TileReservationLedger};
use crate::timer::Timer;
use crate::traits::{
    BoardService, Cell, CombatOutcome, CombatResolver, CoordinatorCommand, CoordinatorLogic, Fight,
    Side, Unit,
};
use crate::view_state::MatchView;
use protocol::{Broadcast, EntityRef, GridCoord, NO_WINNER, ParticipantId, Phase, ToCoordinator};
use std::collections::{BTreeMap, BTreeSet};

/// Runs out at the end of the lobby countdown and of every phase.
const PHASE_TIMER: u16 = 0;
/// Asks silent participants for their snapshot again.
const SNAPSHOT_RETRY_TIMER: u16 = 1;
/// Re-broadcasts the countdown.
const TIMER_SYNC: u16 = 2;

/// Bookkeeping of the combat phase of the current round.
#[derive(Default)]
struct CombatRound {
    /// Snapshots received but not yet replicated, because the opponent is still missing.
    snapshots: BTreeMap<ParticipantId, Vec<UnitPlacement>>,
    /// Paired participants we still wait for.
    awaiting: BTreeSet<ParticipantId>,
    retries: u32,
    /// Participants that lose their fight without a snapshot.
    forfeits: BTreeSet<ParticipantId>,
    /// The placements that landed on the arena per owner, already mirrored for visitors.
    deployed: BTreeMap<ParticipantId, Vec<UnitPlacement>>,
    /// Where every spawned unit currently stands.
    units: BTreeMap<EntityRef, DeployedUnit>,
    /// Target cells of units that are on their way.
    moves: BTreeMap<EntityRef, TileKey>,
    /// A fight had no arena, nobody takes damage this round.
    aborted: bool,
    countdown_started: bool,
}

#[derive(Clone, Copy, Debug)]
struct DeployedUnit {
    owner: ParticipantId,
    tile: TileKey,
}

pub struct RoundOrchestrator<B, C, S>
where
    B: BoardService,
    C: CombatResolver,
    S: ParticipantShuffle,
{
    config: MatchConfig,
    board: B,
    resolver: C,
    matchmaker: MatchmakingEngine<S>,
    replicator: ArenaReplicator,
    reservations: TileReservationLedger,
    /// Exists once the match started.
    ledger: Option<ParticipantLedger>,
    /// Participants collected while waiting.
    lobby: Vec<(ParticipantId, String)>,
    connected: BTreeSet<ParticipantId>,
    spectators: BTreeSet<ParticipantId>,
    arenas: ArenaAssignment,
    /// Only valid within the round it was generated for.
    matchups: Option<MatchupTable>,
    combat: CombatRound,
    timer: Timer,
    /// The view state we have on the server side, that contains all relevant information.
    view_state: MatchView,
    /// The list with the commands for the match server.
    command_list: Vec<CoordinatorCommand>,
}

impl<B, C, S> RoundOrchestrator<B, C, S>
where
    B: BoardService,
    C: CombatResolver,
    S: ParticipantShuffle,
{
    pub fn new(config: MatchConfig, board: B, resolver: C, shuffle: S) -> Self {
        RoundOrchestrator {
            config,
            board,
            resolver,
            matchmaker: MatchmakingEngine::new(shuffle),
            replicator: ArenaReplicator::new(),
            reservations: TileReservationLedger::new(),
            ledger: None,
            lobby: Vec::new(),
            connected: BTreeSet::new(),
            spectators: BTreeSet::new(),
            arenas: ArenaAssignment::default(),
            matchups: None,
            combat: CombatRound::default(),
            timer: Timer::new(),
            view_state: MatchView::default(),
            command_list: Vec::new(),
        }
    }

    /// Starts the match with the given participants and enters the preparation of round 1.
    pub fn start(&mut self, participants: &[(ParticipantId, String)]) -> Result<(), RoundError> {
        if self.ledger.is_some() {
            tracing::warn!("Match already started.");
            return Ok(());
        }
        let ledger = ParticipantLedger::new(participants, self.config.starting_health)?;
        let ids: Vec<ParticipantId> = ledger.iter().map(|s| s.id).collect();
        self.arenas = ArenaAssignment::establish(&ids, &self.board.arena_ids());
        self.timer.cancel_all();
        self.lobby.clear();
        self.connected.extend(ids.iter().copied());
        tracing::info!(participants = ids.len(), mode = %self.config.name, "Match started.");

        let (participant_ids, arena_ids) = self.arenas.to_wire();
        self.emit(Broadcast::SyncArenas {
            participant_ids,
            arena_ids,
        });
        for state in ledger.iter() {
            self.emit(Broadcast::SyncParticipant {
                participant_id: state.id,
                display_name: state.display_name.clone(),
                health: state.health,
            });
        }
        self.ledger = Some(ledger);
        self.enter_prep(1);
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.view_state.phase
    }

    pub fn round(&self) -> u32 {
        self.view_state.round
    }

    pub fn ledger(&self) -> Option<&ParticipantLedger> {
        self.ledger.as_ref()
    }

    pub fn matchups(&self) -> Option<&MatchupTable> {
        self.matchups.as_ref()
    }

    pub fn arenas(&self) -> &ArenaAssignment {
        &self.arenas
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn reservations(&self) -> &TileReservationLedger {
        &self.reservations
    }

    pub fn is_spectator(&self, participant: ParticipantId) -> bool {
        self.spectators.contains(&participant)
    }

    /// Applies the message to the own view state and queues it for all observers.
    fn emit(&mut self, message: Broadcast) {
        self.view_state.apply(&message);
        self.command_list.push(CoordinatorCommand::Broadcast(message));
    }

    fn alive(&self) -> Vec<ParticipantId> {
        self.ledger
            .as_ref()
            .map(|ledger| ledger.alive())
            .unwrap_or_default()
    }

    fn start_lobby_countdown(&mut self) {
        tracing::info!(players = self.lobby.len(), "Lobby countdown started.");
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: self.config.lobby_seconds,
        });
        self.timer.start_timer(PHASE_TIMER, self.config.lobby_seconds);
        self.timer
            .start_timer(TIMER_SYNC, self.config.timer_sync_interval);
    }

    fn cancel_lobby_countdown(&mut self) {
        tracing::info!(players = self.lobby.len(), "Lobby countdown cancelled.");
        self.timer.cancel_timer(PHASE_TIMER);
        self.timer.cancel_timer(TIMER_SYNC);
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: 0.0,
        });
    }

    fn start_from_lobby(&mut self) {
        let participants = std::mem::take(&mut self.lobby);
        if let Err(error) = self.start(&participants) {
            tracing::error!(%error, "Match could not be started.");
            self.lobby = participants;
        }
    }

    fn enter_prep(&mut self, round: u32) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.set_round(round);
        }
        self.matchups = None;
        self.combat = CombatRound::default();
        tracing::info!(round, "Entering preparation.");
        self.emit(Broadcast::EnterPhase(Phase::Prep));
        self.emit(Broadcast::SyncRound { round });
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: self.config.prep_seconds,
        });
        self.timer.start_timer(PHASE_TIMER, self.config.prep_seconds);
        self.timer
            .start_timer(TIMER_SYNC, self.config.timer_sync_interval);
    }

    /// Pairs the living participants and starts waiting for their snapshots. The combat countdown
    /// only runs once every paired participant delivered or forfeited.
    fn enter_combat(&mut self) {
        let round = self.round();
        let alive = self.alive();
        if alive.len() < 2 {
            self.finish();
            return;
        }
        let table = match self.matchmaker.generate_pairings(round, &alive) {
            Ok(table) => table,
            Err(error) => {
                tracing::error!(%error, "Pairing failed.");
                self.finish();
                return;
            }
        };

        self.reservations.clear();
        for arena in self.board.arena_ids() {
            self.board.clear_arena(arena);
        }
        self.timer.cancel_timer(PHASE_TIMER);

        let (participant_ids, opponent_ids) = table.to_wire();
        tracing::info!(round, fights = table.fights().count(), "Entering combat.");
        self.emit(Broadcast::EnterPhase(Phase::Combat));
        self.emit(Broadcast::SyncMatchups {
            participant_ids,
            opponent_ids,
        });
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: self.config.combat_seconds,
        });

        self.combat = CombatRound {
            awaiting: table.fights().flat_map(|(home, visitor)| [home, visitor]).collect(),
            ..CombatRound::default()
        };
        self.matchups = Some(table);

        if let Some(error) = self.missing_arena() {
            self.abort_combat(error);
            return;
        }

        let silent: Vec<ParticipantId> = self
            .combat
            .awaiting
            .iter()
            .copied()
            .filter(|p| self.ledger.as_ref().is_some_and(|l| l.is_disconnected(*p)))
            .collect();
        for participant in silent {
            tracing::info!(participant, "Disconnected participant forfeits.");
            self.forfeit(participant);
        }

        if self.combat.awaiting.is_empty() {
            self.settle();
        } else {
            self.timer
                .start_timer(SNAPSHOT_RETRY_TIMER, self.config.snapshot_retry_interval);
        }
    }

    fn receive_snapshot(&mut self, sender: ParticipantId, owner_id: ParticipantId, snapshot_json: &str) {
        if self.phase() != Phase::Combat || !self.combat.awaiting.contains(&sender) {
            tracing::debug!(participant = sender, "Unexpected board snapshot ignored.");
            return;
        }
        if owner_id != sender {
            tracing::warn!(
                participant = sender,
                owner_id,
                "Snapshot for a foreign board ignored."
            );
            return;
        }
        let placements = match board_codec::decode_json(snapshot_json) {
            Ok(placements) => placements,
            Err(error) => {
                tracing::warn!(participant = sender, %error, "Board snapshot dropped.");
                return;
            }
        };
        tracing::debug!(participant = sender, units = placements.len(), "Board snapshot received.");
        self.combat.awaiting.remove(&sender);
        self.combat.snapshots.insert(sender, placements);
        self.replicate_fight_of(sender);
        if self.combat.awaiting.is_empty() {
            self.settle();
        }
    }

    /// Replicates both boards of the fight once neither side is outstanding.
    fn replicate_fight_of(&mut self, participant: ParticipantId) {
        let Some((home, visitor)) = self.matchups.as_ref().and_then(|t| t.fight_of(participant)) else {
            return;
        };
        if self.combat.aborted
            || self.combat.awaiting.contains(&home)
            || self.combat.awaiting.contains(&visitor)
        {
            return;
        }
        let Some(arena) = self.arenas.arena_of(home) else {
            self.abort_combat(RoundError::MissingArena {
                participant: home,
                arena: None,
            });
            return;
        };
        for (owner, owner_is_visitor) in [(home, false), (visitor, true)] {
            let Some(placements) = self.combat.snapshots.remove(&owner) else {
                continue;
            };
            let result = self.replicator.replicate(
                &mut self.board,
                &mut self.reservations,
                &placements,
                owner,
                arena,
                owner_is_visitor,
            );
            match result {
                Ok(report) => {
                    for (placement, error) in &report.dropped {
                        tracing::debug!(owner, unit = %placement.unit_type_id, %error, "Placement skipped.");
                    }
                    let side = if owner_is_visitor { Side::Visitor } else { Side::Home };
                    for (entity, placement) in &report.spawned {
                        let tile = TileKey::new(arena, side, placement.coord);
                        self.combat.units.insert(*entity, DeployedUnit { owner, tile });
                    }
                    self.combat.deployed.insert(owner, report.landed());
                    for message in report.messages {
                        self.emit(message);
                    }
                }
                Err(error) => {
                    self.abort_combat(error);
                    return;
                }
            }
        }
    }

    /// Reserves `to` for a unit standing on the arena. The target lies on the side the unit stands on,
    /// in arena coordinates. False outside combat, for unknown units, cells that are absent or taken
    /// and units that are already moving.
    pub fn begin_relocation(&mut self, entity: EntityRef, to: GridCoord) -> bool {
        if self.phase() != Phase::Combat || self.combat.moves.contains_key(&entity) {
            return false;
        }
        let Some(unit) = self.combat.units.get(&entity) else {
            return false;
        };
        let Some(cell) = self.board.cell_at(unit.tile.arena, unit.tile.side, to) else {
            return false;
        };
        let target = TileKey::from(cell);
        if !self.reservations.begin_move(target) {
            return false;
        }
        self.combat.moves.insert(entity, target);
        true
    }

    /// The unit arrived on its reserved cell and frees the one it came from.
    pub fn finish_relocation(&mut self, entity: EntityRef) -> bool {
        let Some(target) = self.combat.moves.remove(&entity) else {
            return false;
        };
        let Some(unit) = self.combat.units.get_mut(&entity) else {
            self.reservations.abort_move(target);
            return false;
        };
        let origin = unit.tile;
        unit.tile = target;
        let owner = unit.owner;
        self.reservations.finish_move(origin, target);

        if let Some(landed) = self
            .combat
            .deployed
            .get_mut(&owner)
            .and_then(|placements| placements.iter_mut().find(|p| p.coord == origin.coord))
        {
            landed.coord = target.coord;
        }
        if let Some(unit) = self.board.unit_mut(entity) {
            unit.assign_to_cell(Cell {
                arena: target.arena,
                side: target.side,
                coord: target.coord,
            });
        }
        tracing::debug!(entity, owner, from = ?origin.coord, to = ?target.coord, "Unit relocated.");
        self.emit(Broadcast::ConfigureUnit {
            entity_ref: entity,
            owner_id: owner,
            arena_id: target.arena,
            grid_x: target.coord.x,
            grid_y: target.coord.y,
        });
        true
    }

    /// The unit stays where it is, its target cell is free again.
    pub fn abort_relocation(&mut self, entity: EntityRef) {
        if let Some(target) = self.combat.moves.remove(&entity) {
            self.reservations.abort_move(target);
        }
    }

    fn relocate(&mut self, sender: ParticipantId, entity: EntityRef, to: GridCoord) {
        match self.combat.units.get(&entity) {
            Some(unit) if unit.owner == sender => {}
            Some(unit) => {
                tracing::warn!(participant = sender, owner = unit.owner, entity, "Relocation of a foreign unit ignored.");
                return;
            }
            None => {
                tracing::debug!(participant = sender, entity, "Relocation of an unknown unit ignored.");
                return;
            }
        }
        if !self.begin_relocation(entity, to) {
            tracing::debug!(participant = sender, entity, ?to, "Relocation refused.");
            return;
        }
        self.finish_relocation(entity);
    }

    /// The participant loses its fight without a board.
    fn forfeit(&mut self, participant: ParticipantId) {
        if !self.combat.awaiting.remove(&participant) {
            return;
        }
        self.combat.forfeits.insert(participant);
        self.replicate_fight_of(participant);
        if self.combat.awaiting.is_empty() {
            self.settle();
        }
    }

    /// Every snapshot is in, the combat countdown starts.
    fn settle(&mut self) {
        self.timer.cancel_timer(SNAPSHOT_RETRY_TIMER);
        if self.combat.countdown_started || self.combat.aborted || self.phase() != Phase::Combat {
            return;
        }
        self.combat.countdown_started = true;
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: self.config.combat_seconds,
        });
        self.timer
            .start_timer(PHASE_TIMER, self.config.combat_seconds);
    }

    /// The first fight whose home has no usable arena.
    fn missing_arena(&self) -> Option<RoundError> {
        let table = self.matchups.as_ref()?;
        table.fights().find_map(|(home, _)| match self.arenas.arena_of(home) {
            None => Some(RoundError::MissingArena {
                participant: home,
                arena: None,
            }),
            Some(arena) if self.board.board_width(arena).is_none() => Some(RoundError::MissingArena {
                participant: home,
                arena: Some(arena),
            }),
            Some(_) => None,
        })
    }

    /// Without a destination board the round can not be fought. Skips straight to the results.
    fn abort_combat(&mut self, error: RoundError) {
        tracing::error!(%error, round = self.round(), "Combat aborted, no damage this round.");
        self.combat.aborted = true;
        self.combat.awaiting.clear();
        self.timer.cancel_timer(SNAPSHOT_RETRY_TIMER);
        self.enter_results();
    }

    fn retry_snapshots(&mut self) {
        if self.phase() != Phase::Combat || self.combat.awaiting.is_empty() {
            return;
        }
        self.combat.retries += 1;
        let silent: Vec<ParticipantId> = self.combat.awaiting.iter().copied().collect();
        let exhausted = self
            .config
            .max_snapshot_retries
            .is_some_and(|max| self.combat.retries > max);
        if exhausted {
            for participant in silent {
                let error = RoundError::PeerTimeout {
                    participant,
                    attempts: self.combat.retries - 1,
                };
                tracing::warn!(%error, "Participant forfeits the round.");
                self.forfeit(participant);
            }
            return;
        }
        for owner_id in silent {
            tracing::debug!(participant = owner_id, attempt = self.combat.retries, "Requesting snapshot again.");
            self.emit(Broadcast::RequestSnapshot { owner_id });
        }
        self.timer
            .start_timer(SNAPSHOT_RETRY_TIMER, self.config.snapshot_retry_interval);
    }

    fn enter_results(&mut self) {
        let round = self.round();
        tracing::info!(round, "Entering results.");
        self.emit(Broadcast::EnterPhase(Phase::Results));
        self.emit(Broadcast::SyncTimer {
            seconds_remaining: self.config.results_seconds,
        });

        if self.combat.aborted {
            self.timer
                .start_timer(PHASE_TIMER, self.config.results_seconds);
            return;
        }

        let records: Vec<Matchup> = self
            .matchups
            .as_ref()
            .map(|table| table.records().to_vec())
            .unwrap_or_default();
        for record in records {
            match record {
                Matchup::Bye(participant) => {
                    tracing::debug!(participant, round, "Bye, no damage.");
                }
                Matchup::Fight { home, visitor } => {
                    for loser in self.losers(round, home, visitor) {
                        self.damage(loser, self.config.damage_per_loss);
                    }
                }
            }
        }

        let eliminated = self
            .ledger
            .as_mut()
            .map(|ledger| ledger.eliminate_disconnected())
            .unwrap_or_default();
        for (target_id, amount) in eliminated {
            tracing::info!(participant = target_id, "Disconnected participant eliminated.");
            if amount > 0 {
                self.emit(Broadcast::ApplyDamage { target_id, amount });
            }
        }
        self.timer
            .start_timer(PHASE_TIMER, self.config.results_seconds);
    }

    /// Forfeits decide the fight, otherwise the resolver decides.
    fn losers(&mut self, round: u32, home: ParticipantId, visitor: ParticipantId) -> Vec<ParticipantId> {
        let forfeited: Vec<ParticipantId> = [home, visitor]
            .into_iter()
            .filter(|p| self.combat.forfeits.contains(p))
            .collect();
        if !forfeited.is_empty() {
            return forfeited;
        }
        let Some(arena) = self.arenas.arena_of(home) else {
            return Vec::new();
        };
        let fight = Fight {
            round,
            arena,
            home,
            visitor,
            home_units: self.combat.deployed.get(&home).cloned().unwrap_or_default(),
            visitor_units: self.combat.deployed.get(&visitor).cloned().unwrap_or_default(),
        };
        match self.resolver.resolve(&fight) {
            CombatOutcome::Winner(winner) if winner == home => vec![visitor],
            CombatOutcome::Winner(winner) if winner == visitor => vec![home],
            CombatOutcome::Winner(winner) => {
                tracing::warn!(winner, home, visitor, "Combat outcome names an outsider, treated as draw.");
                Vec::new()
            }
            CombatOutcome::Draw => Vec::new(),
        }
    }

    fn damage(&mut self, target_id: ParticipantId, amount: i32) {
        let lost = self
            .ledger
            .as_mut()
            .map_or(0, |ledger| ledger.apply_damage(target_id, amount));
        if lost > 0 {
            self.emit(Broadcast::ApplyDamage {
                target_id,
                amount: lost,
            });
        }
    }

    fn conclude_round(&mut self) {
        if self.alive().len() <= 1 {
            self.finish();
        } else {
            self.enter_prep(self.round() + 1);
        }
    }

    fn finish(&mut self) {
        self.timer.cancel_all();
        self.matchups = None;
        self.combat = CombatRound::default();
        let winner = self.ledger.as_ref().and_then(|ledger| ledger.winner());
        let standings = self
            .ledger
            .as_ref()
            .map(|ledger| ledger.standings())
            .unwrap_or_default();
        tracing::info!(?winner, ?standings, round = self.round(), "Match finished.");
        self.emit(Broadcast::EnterPhase(Phase::Finished));
        self.emit(Broadcast::AnnounceWinner {
            winner_id: winner.unwrap_or(NO_WINNER),
        });
    }

    fn sync_timer(&mut self) {
        if self.phase() == Phase::Finished {
            return;
        }
        if let Some(seconds_remaining) = self.timer.remaining(PHASE_TIMER) {
            self.emit(Broadcast::SyncTimer { seconds_remaining });
        }
        self.timer
            .start_timer(TIMER_SYNC, self.config.timer_sync_interval);
    }

    fn timer_triggered(&mut self, timer_id: u16) {
        match timer_id {
            PHASE_TIMER => match self.phase() {
                Phase::Waiting => self.start_from_lobby(),
                Phase::Prep => self.enter_combat(),
                Phase::Combat => self.enter_results(),
                Phase::Results => self.conclude_round(),
                Phase::Finished => {}
            },
            SNAPSHOT_RETRY_TIMER => self.retry_snapshots(),
            TIMER_SYNC => self.sync_timer(),
            _ => tracing::warn!(timer_id, "Unknown timer."),
        }
    }
}

impl<B, C, S> CoordinatorLogic for RoundOrchestrator<B, C, S>
where
    B: BoardService,
    C: CombatResolver,
    S: ParticipantShuffle,
{
    /// Collects participants while waiting, everyone arriving later watches as spectator if there is room.
    fn player_arrival(&mut self, participant: ParticipantId, display_name: String) {
        self.connected.insert(participant);
        if self.ledger.is_none() {
            if self.lobby.len() < usize::from(self.config.max_players) {
                tracing::info!(participant, name = %display_name, "Participant joined the lobby.");
                self.lobby.push((participant, display_name));
                let countdown_running = self.timer.remaining(PHASE_TIMER).is_some();
                if self.lobby.len() >= usize::from(self.config.min_players) && !countdown_running {
                    self.start_lobby_countdown();
                }
                return;
            }
        }
        if self.spectators.len() < usize::from(self.config.max_spectators) {
            tracing::info!(participant, name = %display_name, "Spectator joined.");
            self.spectators.insert(participant);
        } else {
            tracing::warn!(participant, "No room left, participant gets kicked.");
            self.connected.remove(&participant);
            self.command_list
                .push(CoordinatorCommand::KickPlayer { participant });
        }
    }

    /// In the lobby the participant simply leaves. In a running match it stays in the ledger and gets
    /// eliminated at the next results phase.
    fn player_departure(&mut self, participant: ParticipantId) {
        self.connected.remove(&participant);
        if self.spectators.remove(&participant) {
            tracing::info!(participant, "Spectator left.");
        } else if self.ledger.is_none() {
            self.lobby.retain(|(id, _)| *id != participant);
            tracing::info!(participant, "Participant left the lobby.");
            let countdown_running = self.timer.remaining(PHASE_TIMER).is_some();
            if countdown_running && self.lobby.len() < usize::from(self.config.min_players) {
                self.cancel_lobby_countdown();
            }
        } else if self.ledger.as_ref().is_some_and(|l| l.contains(participant)) {
            tracing::info!(participant, round = self.round(), "Participant disconnected.");
            if let Some(ledger) = self.ledger.as_mut() {
                ledger.mark_disconnected(participant);
            }
            self.forfeit(participant);
        }

        if self.connected.is_empty() {
            tracing::info!("Everyone left, terminating the match.");
            self.timer.cancel_all();
            self.command_list.push(CoordinatorCommand::TerminateMatch);
        }
    }

    /// The sender id is trusted, the owner id inside the payload is checked against it.
    fn inform_rpc(&mut self, participant: ParticipantId, payload: ToCoordinator) {
        match payload {
            ToCoordinator::SendBoardSnapshot {
                owner_id,
                snapshot_json,
            } => self.receive_snapshot(participant, owner_id, &snapshot_json),
            ToCoordinator::RelocateUnit {
                entity_ref,
                grid_x,
                grid_y,
            } => self.relocate(participant, entity_ref, GridCoord::new(grid_x, grid_y)),
            ToCoordinator::SetDisplayName(name) => {
                if let Some(entry) = self.lobby.iter_mut().find(|(id, _)| *id == participant) {
                    entry.1 = name;
                    return;
                }
                let Some(ledger) = self.ledger.as_mut() else {
                    return;
                };
                if !ledger.set_display_name(participant, name.clone()) {
                    tracing::debug!(participant, "Name change of a non participant ignored.");
                    return;
                }
                let health = ledger.get(participant).map_or(0, |s| s.health);
                self.emit(Broadcast::SyncParticipant {
                    participant_id: participant,
                    display_name: name,
                    health,
                });
            }
        }
    }

    fn tick(&mut self, delta_time: f32) {
        for timer_id in self.timer.advance(delta_time) {
            self.timer_triggered(timer_id);
        }
    }

    fn get_view_state(&self) -> &MatchView {
        &self.view_state
    }

    fn drain_commands(&mut self) -> Vec<CoordinatorCommand> {
        std::mem::take(&mut self.command_list)
    }
}
