//! Whole matches driven through the coordinator, with observers applying the broadcasts.

#![allow(clippy::unwrap_used)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use protocol::{Broadcast, GridCoord, ParticipantId, Phase, ToCoordinator};
use round_core::board_codec::{self, RosterUnit, UnitLocation};
use round_core::combat::StrengthResolver;
use round_core::config::MatchConfig;
use round_core::grid_board::GridBoard;
use round_core::matchmaking::{
    FixedOrder, Matchup, Opponent, ParticipantShuffle, RandomShuffle,
};
use round_core::observer_view::ObserverView;
use round_core::round_orchestrator::RoundOrchestrator;
use round_core::traits::{
    CombatOutcome, CombatResolver, CoordinatorCommand, CoordinatorLogic, Fight, PresentationService,
    Team,
};

/// Lets the hosting participant win every fight.
struct HomeAlwaysWins;

impl CombatResolver for HomeAlwaysWins {
    fn resolve(&mut self, fight: &Fight) -> CombatOutcome {
        CombatOutcome::Winner(fight.home)
    }
}

struct NoPresentation;

impl PresentationService for NoPresentation {
    fn activate_arena(&mut self, _: i32, _: ParticipantId) {}
}

fn config() -> MatchConfig {
    MatchConfig {
        board_width: 8,
        board_height: 4,
        damage_per_loss: 10,
        starting_health: 100,
        ..MatchConfig::default()
    }
}

fn participants(ids: &[ParticipantId]) -> Vec<(ParticipantId, String)> {
    ids.iter().map(|id| (*id, format!("player {id}"))).collect()
}

fn orchestrator<C: CombatResolver, S: ParticipantShuffle>(
    resolver: C,
    shuffle: S,
) -> RoundOrchestrator<GridBoard, C, S> {
    let config = config();
    let board = GridBoard::new(config.board_width, config.board_height, config.arena_count);
    RoundOrchestrator::new(config, board, resolver, shuffle)
}

fn snapshot(owner_id: ParticipantId, units: &[(u32, GridCoord)]) -> ToCoordinator {
    let roster: Vec<RosterUnit> = units
        .iter()
        .map(|(stars, coord)| RosterUnit {
            unit_type_id: "knight".to_string(),
            star_level: *stars,
            location: UnitLocation::Board(*coord),
        })
        .collect();
    ToCoordinator::SendBoardSnapshot {
        owner_id,
        snapshot_json: board_codec::to_json(&board_codec::encode(&roster)).unwrap(),
    }
}

fn broadcasts(commands: Vec<CoordinatorCommand>) -> Vec<Broadcast> {
    commands
        .into_iter()
        .filter_map(|command| match command {
            CoordinatorCommand::Broadcast(message) => Some(message),
            _ => None,
        })
        .collect()
}

fn health<C: CombatResolver, S: ParticipantShuffle>(
    orchestrator: &RoundOrchestrator<GridBoard, C, S>,
) -> Vec<(ParticipantId, i32)> {
    orchestrator
        .ledger()
        .unwrap()
        .iter()
        .map(|s| (s.id, s.health))
        .collect()
}

#[test]
fn four_participants_scripted_order() {
    let config = config();
    let mut orchestrator = orchestrator(HomeAlwaysWins, FixedOrder(vec![3, 1, 4, 2]));
    orchestrator.start(&participants(&[1, 2, 3, 4])).unwrap();
    orchestrator.tick(config.prep_seconds);
    assert_eq!(orchestrator.phase(), Phase::Combat);

    let table = orchestrator.matchups().unwrap();
    for (participant, opponent) in [(3, 1), (1, 3), (4, 2), (2, 4)] {
        assert_eq!(table.opponent_of(participant), Some(Opponent::Participant(opponent)));
    }

    for id in 1..=4 {
        orchestrator.inform_rpc(id, snapshot(id, &[(1, GridCoord::new(0, 0))]));
    }
    orchestrator.tick(config.combat_seconds);
    assert_eq!(orchestrator.phase(), Phase::Results);
    assert_eq!(health(&orchestrator), vec![(1, 90), (2, 90), (3, 100), (4, 100)]);
}

#[test]
fn five_participants_leave_one_bye() {
    let config = config();
    let mut orchestrator = orchestrator(HomeAlwaysWins, FixedOrder(vec![5, 4, 3, 2, 1]));
    orchestrator.start(&participants(&[1, 2, 3, 4, 5])).unwrap();
    orchestrator.tick(config.prep_seconds);

    let table = orchestrator.matchups().unwrap();
    assert_eq!(table.fights().count(), 2);
    assert_eq!(table.records().last(), Some(&Matchup::Bye(1)));
    assert_eq!(table.opponent_of(1), Some(Opponent::Bye));

    // The bye holder is never asked for a board.
    for id in 2..=5 {
        orchestrator.inform_rpc(id, snapshot(id, &[(1, GridCoord::new(1, 1))]));
    }
    orchestrator.tick(config.combat_seconds);
    assert_eq!(orchestrator.phase(), Phase::Results);
    assert_eq!(
        health(&orchestrator),
        vec![(1, 100), (2, 90), (3, 100), (4, 90), (5, 100)]
    );
}

#[test]
fn visiting_unit_is_mirrored_and_seen_per_observer() {
    let config = config();
    let mut orchestrator = orchestrator(StrengthResolver, FixedOrder(Vec::new()));
    let mut home = ObserverView::new(3, GridBoard::new(8, 4, config.arena_count), NoPresentation);
    let mut visitor = ObserverView::new(1, GridBoard::new(8, 4, config.arena_count), NoPresentation);

    orchestrator.start(&participants(&[1, 3])).unwrap();
    orchestrator.tick(config.prep_seconds);
    orchestrator.inform_rpc(3, snapshot(3, &[]));
    orchestrator.inform_rpc(1, snapshot(1, &[(2, GridCoord::new(2, 3))]));

    let messages = broadcasts(orchestrator.drain_commands());
    let configured = messages
        .iter()
        .find_map(|message| match message {
            Broadcast::ConfigureUnit {
                entity_ref,
                owner_id,
                arena_id,
                grid_x,
                grid_y,
            } => Some((*entity_ref, *owner_id, *arena_id, *grid_x, *grid_y)),
            _ => None,
        })
        .unwrap();
    let (entity_ref, owner_id, arena_id, grid_x, grid_y) = configured;
    assert_eq!(owner_id, 1);
    assert_eq!(arena_id, orchestrator.arenas().arena_of(3).unwrap());
    assert_eq!((grid_x, grid_y), (5, 3));

    for message in &messages {
        home.apply(message);
        visitor.apply(message);
    }
    assert_eq!(home.resolved_unit(entity_ref).map(|u| u.team), Some(Team::Enemy));
    assert_eq!(visitor.resolved_unit(entity_ref).map(|u| u.team), Some(Team::Friendly));
    assert_eq!(
        home.resolved_unit(entity_ref).map(|u| u.cell),
        visitor.resolved_unit(entity_ref).map(|u| u.cell)
    );
}

#[test]
fn seeded_match_runs_to_a_single_winner() {
    let config = config();
    let mut rng = StdRng::seed_from_u64(42);
    let mut orchestrator = orchestrator(StrengthResolver, RandomShuffle(StdRng::seed_from_u64(7)));
    let ids = [1, 2, 3, 4, 5, 6];
    let mut observer = ObserverView::new(4, GridBoard::new(8, 4, config.arena_count), NoPresentation);
    let mut late_joiner = None;

    orchestrator.start(&participants(&ids)).unwrap();
    for round in 1..=500 {
        orchestrator.tick(config.prep_seconds);
        if orchestrator.phase() == Phase::Finished {
            break;
        }
        for id in orchestrator.ledger().unwrap().alive() {
            let stars = rng.gen_range(1..=3);
            orchestrator.inform_rpc(id, snapshot(id, &[(stars, GridCoord::new(id, 0))]));
        }
        orchestrator.tick(config.combat_seconds);
        orchestrator.tick(config.results_seconds);
        if round == 2 {
            let mut joiner =
                ObserverView::new(99, GridBoard::new(8, 4, config.arena_count), NoPresentation);
            joiner.apply_full(orchestrator.get_view_state().clone());
            late_joiner = Some(joiner);
        }
        for message in broadcasts(orchestrator.drain_commands()) {
            observer.apply(&message);
            if let Some(joiner) = late_joiner.as_mut()
                && round > 2
            {
                joiner.apply(&message);
            }
        }
    }
    for message in broadcasts(orchestrator.drain_commands()) {
        observer.apply(&message);
        if let Some(joiner) = late_joiner.as_mut() {
            joiner.apply(&message);
        }
    }

    assert_eq!(orchestrator.phase(), Phase::Finished);
    let alive = orchestrator.ledger().unwrap().alive();
    assert!(alive.len() <= 1);
    let view = orchestrator.get_view_state();
    assert_eq!(view.winner_id, alive.first().copied());
    assert_eq!(observer.view(), view);
    assert_eq!(late_joiner.unwrap().view(), view);
}

/// Hands the broadcasts to the observers and their answers back to the coordinator. `deaf` drops the
/// answers of one participant.
fn relay<C: CombatResolver, S: ParticipantShuffle>(
    orchestrator: &mut RoundOrchestrator<GridBoard, C, S>,
    observers: &mut [(ParticipantId, ObserverView<GridBoard, NoPresentation>)],
    deaf: Option<ParticipantId>,
) {
    for message in broadcasts(orchestrator.drain_commands()) {
        for (id, observer) in observers.iter_mut() {
            if let Some(answer) = observer.apply(&message)
                && Some(*id) != deaf
            {
                orchestrator.inform_rpc(*id, answer);
            }
        }
    }
}

#[test]
fn observers_answer_snapshot_requests() {
    let config = config();
    let mut orchestrator = orchestrator(StrengthResolver, FixedOrder(Vec::new()));
    let mut observers: Vec<(ParticipantId, ObserverView<GridBoard, NoPresentation>)> = [(1, 3, 2), (2, 1, 0)]
        .into_iter()
        .map(|(id, stars, x)| {
            let mut observer = ObserverView::new(id, GridBoard::new(8, 4, config.arena_count), NoPresentation);
            observer.set_roster(vec![RosterUnit {
                unit_type_id: "knight".to_string(),
                star_level: stars,
                location: UnitLocation::Board(GridCoord::new(x, 1)),
            }]);
            (id, observer)
        })
        .collect();

    orchestrator.start(&participants(&[1, 2])).unwrap();
    orchestrator.tick(config.prep_seconds);
    assert_eq!(orchestrator.phase(), Phase::Combat);
    let arena = orchestrator.arenas().arena_of(2).unwrap();

    // Participant 2 misses the pairing and only answers the repeated request.
    relay(&mut orchestrator, &mut observers, Some(2));
    assert_eq!(orchestrator.board().units_on(arena).count(), 0);

    orchestrator.tick(config.snapshot_retry_interval);
    relay(&mut orchestrator, &mut observers, None);
    assert_eq!(orchestrator.board().units_on(arena).count(), 2);

    orchestrator.tick(config.combat_seconds);
    assert_eq!(orchestrator.phase(), Phase::Results);
    assert_eq!(health(&orchestrator), vec![(1, 100), (2, 90)]);
}
