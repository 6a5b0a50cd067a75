//! The room task: the single thread of control of a match.
//!
//! All connections of a room talk to this task over one mpsc channel. The task feeds the events into the
//! coordinator, drives its countdowns and translates the drained commands into frames on the room broadcast.
//! As there is only one broadcast per room, all observers receive the messages in the same order.
//!
//! ```text
//! connection tasks ──RoomEvent──► run_room ──Bytes──► broadcast ──► connection tasks
//! ```

use bytes::Bytes;
use protocol::{
    DELTA_UPDATE, FULL_UPDATE, ParticipantId, SERVER_DISCONNECTS, ToCoordinator, encode_frame,
    kick_frame,
};
use round_core::traits::{CoordinatorCommand, CoordinatorLogic};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

/// How often the countdowns of a room advance.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// What the connection tasks report to the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// A connection finished the handshake. The connection has already subscribed to the broadcast.
    Arrival {
        participant: ParticipantId,
        display_name: String,
    },
    Departure(ParticipantId),
    /// A decoded participant message with the trusted sender id.
    Rpc(ParticipantId, ToCoordinator),
}

/// Runs the match until the coordinator terminates it or the event channel closes.
///
/// # Returns
/// A static string describing why the room ended (for logging).
pub async fn run_room<L: CoordinatorLogic>(
    room_id: String,
    mut logic: L,
    mut inbound: mpsc::Receiver<RoomEvent>,
    outbound: broadcast::Sender<Bytes>,
    tick_interval: Duration,
) -> &'static str {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    loop {
        let mut joined = false;
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                logic.tick((now - last_tick).as_secs_f32());
                last_tick = now;
            }
            event = inbound.recv() => match event {
                None => {
                    tracing::info!(room = %room_id, "Event channel closed.");
                    return "Event channel closed.";
                }
                Some(RoomEvent::Arrival { participant, display_name }) => {
                    joined = true;
                    logic.player_arrival(participant, display_name);
                }
                Some(RoomEvent::Departure(participant)) => logic.player_departure(participant),
                Some(RoomEvent::Rpc(participant, payload)) => logic.inform_rpc(participant, payload),
            }
        }
        if !flush(&room_id, &mut logic, &outbound, joined) {
            return "Match terminated.";
        }
    }
}

/// Translates the pending commands into frames. Returns false once the match terminated.
///
/// Kicks go out first, then all broadcasts coalesced into one delta frame. A full update follows if a
/// connection arrived: it is the state right after the deltas, so unsynced connections can skip them.
fn flush<L: CoordinatorLogic>(
    room_id: &str,
    logic: &mut L,
    outbound: &broadcast::Sender<Bytes>,
    joined: bool,
) -> bool {
    let mut deltas = Vec::new();
    let mut terminated = false;
    for command in logic.drain_commands() {
        match command {
            CoordinatorCommand::Broadcast(message) => deltas.push(message),
            CoordinatorCommand::KickPlayer { participant } => {
                tracing::info!(room = %room_id, participant, "Kicking participant.");
                publish(outbound, kick_frame(participant));
            }
            CoordinatorCommand::TerminateMatch => {
                terminated = true;
            }
        }
    }

    if !deltas.is_empty() {
        match encode_frame(DELTA_UPDATE, &deltas) {
            Ok(frame) => publish(outbound, frame),
            Err(error) => tracing::error!(room = %room_id, ?error, "Delta frame could not be encoded."),
        }
    }

    if terminated {
        tracing::info!(room = %room_id, "Match terminated.");
        publish(outbound, Bytes::from_static(&[SERVER_DISCONNECTS]));
        return false;
    }

    if joined {
        match encode_frame(FULL_UPDATE, logic.get_view_state()) {
            Ok(frame) => publish(outbound, frame),
            Err(error) => tracing::error!(room = %room_id, ?error, "Full update could not be encoded."),
        }
    }
    true
}

fn publish(outbound: &broadcast::Sender<Bytes>, frame: Bytes) {
    // An error only means that nobody listens at the moment.
    if let Err(error) = outbound.send(frame) {
        tracing::debug!(?error, "Sending to no connections.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Broadcast, CLIENT_GETS_KICKED, CHANNEL_BUFFER_SIZE, Phase, decode_payload};
    use round_core::combat::StrengthResolver;
    use round_core::config::MatchConfig;
    use round_core::grid_board::GridBoard;
    use round_core::matchmaking::FixedOrder;
    use round_core::round_orchestrator::RoundOrchestrator;
    use round_core::view_state::MatchView;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    struct TestRoom {
        to_room: mpsc::Sender<RoomEvent>,
        from_room: broadcast::Receiver<Bytes>,
        task: JoinHandle<&'static str>,
    }

    fn open(config: MatchConfig) -> TestRoom {
        let board = GridBoard::new(config.board_width, config.board_height, config.arena_count);
        let logic = RoundOrchestrator::new(config, board, StrengthResolver, FixedOrder(Vec::new()));
        let (to_room, inbound) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (outbound, from_room) = broadcast::channel(CHANNEL_BUFFER_SIZE);
        let task = tokio::spawn(run_room(
            "test#standard".to_string(),
            logic,
            inbound,
            outbound,
            Duration::from_millis(10),
        ));
        TestRoom {
            to_room,
            from_room,
            task,
        }
    }

    async fn arrive(room: &TestRoom, participant: ParticipantId) {
        room.to_room
            .send(RoomEvent::Arrival {
                participant,
                display_name: format!("p{participant}"),
            })
            .await
            .unwrap();
    }

    /// Waits for the next frame with the given header, skipping all others.
    async fn next_frame(room: &mut TestRoom, header: u8) -> Bytes {
        timeout(Duration::from_secs(5), async {
            loop {
                let frame = room.from_room.recv().await.unwrap();
                if frame[0] == header {
                    return frame;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn arrival_is_followed_by_a_full_update() {
        let mut room = open(MatchConfig::default());
        arrive(&room, 1).await;
        let frame = next_frame(&mut room, FULL_UPDATE).await;
        let view: MatchView = decode_payload(&frame).unwrap();
        assert_eq!(view.phase, Phase::Waiting);
    }

    #[tokio::test]
    async fn lobby_countdown_starts_the_match() {
        let mut room = open(MatchConfig {
            min_players: 2,
            lobby_seconds: 0.05,
            ..MatchConfig::default()
        });
        arrive(&room, 1).await;
        arrive(&room, 2).await;
        let entered_prep = timeout(Duration::from_secs(5), async {
            loop {
                let frame = next_frame(&mut room, DELTA_UPDATE).await;
                let deltas: Vec<Broadcast> = decode_payload(&frame).unwrap();
                if deltas.contains(&Broadcast::EnterPhase(Phase::Prep)) {
                    return deltas;
                }
            }
        })
        .await
        .unwrap();
        assert!(entered_prep.contains(&Broadcast::SyncRound { round: 1 }));
    }

    #[tokio::test]
    async fn overflow_gets_kicked() {
        let mut room = open(MatchConfig {
            min_players: 1,
            max_players: 1,
            max_spectators: 0,
            ..MatchConfig::default()
        });
        arrive(&room, 1).await;
        arrive(&room, 2).await;
        let frame = next_frame(&mut room, CLIENT_GETS_KICKED).await;
        assert_eq!(frame, kick_frame(2));
    }

    #[tokio::test]
    async fn last_departure_closes_the_room() {
        let mut room = open(MatchConfig::default());
        arrive(&room, 1).await;
        room.to_room.send(RoomEvent::Departure(1)).await.unwrap();
        next_frame(&mut room, SERVER_DISCONNECTS).await;
        let reason = timeout(Duration::from_secs(5), room.task).await.unwrap().unwrap();
        assert_eq!(reason, "Match terminated.");
    }
}
