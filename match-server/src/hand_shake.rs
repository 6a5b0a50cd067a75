//! This module does the whole initialization and handshake thing.
//! The general protocol of connecting is :
//! Client -> Websocket: postcard serialized join request.
//! Websocket -> Client: handshake response with the i32 participant id.
//!
//! The first join request for a room opens it and spawns the room task hosting the coordinator.

use crate::lobby::{AppState, Room, max_connections};
use crate::room::{RoomEvent, TICK_INTERVAL, run_room};
use axum::extract::ws::Message::Binary;
use axum::extract::ws::{Message, WebSocket};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{sink::SinkExt, stream::StreamExt};
use postcard::from_bytes;
use protocol::{
    CHANNEL_BUFFER_SIZE, HAND_SHAKE_RESPONSE, HAND_SHAKE_RESPONSE_SIZE, JoinRequest, ParticipantId,
    SERVER_ERROR,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use round_core::combat::StrengthResolver;
use round_core::config::MatchConfig;
use round_core::grid_board::GridBoard;
use round_core::matchmaking::RandomShuffle;
use round_core::round_orchestrator::RoundOrchestrator;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Is called on error, sends a text message because some clients can not interpret closing messages.
/// This text message is encoded as a binary message.
async fn send_closing_message(sender: &mut SplitSink<WebSocket, Message>, closing_message: String) {
    let raw_data = closing_message.as_bytes();
    let mut msg = BytesMut::with_capacity(1 + raw_data.len());
    msg.put_u8(SERVER_ERROR);
    msg.put_slice(raw_data);

    let _ = sender.send(Message::Binary(msg.into())).await;
    let _ = sender.send(Message::Close(None)).await;
}

/// The handshake result we get for joining the room.
pub struct HandshakeResult {
    /// The id of the participant we serve.
    pub participant: ParticipantId,
    /// The complete identifier of the room as stored in the hashmap.
    pub room_id: String,
    /// Events towards the room task.
    pub to_room: mpsc::Sender<RoomEvent>,
    /// The room broadcast, subscribed before the arrival got announced.
    pub from_room: broadcast::Receiver<Bytes>,
}

/// This data is data we need to keep for the disconnect handling and cleanup.
pub struct DisconnectData {
    pub participant: ParticipantId,
    pub room_id: String,
    pub to_room: mpsc::Sender<RoomEvent>,
}

impl From<&HandshakeResult> for DisconnectData {
    fn from(value: &HandshakeResult) -> Self {
        DisconnectData {
            participant: value.participant,
            room_id: value.room_id.clone(),
            to_room: value.to_room.clone(),
        }
    }
}

/// Reads in the join request from the web socket and looks up the match mode.
async fn get_initial_query(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    state: &Arc<AppState>,
) -> Option<(JoinRequest, MatchConfig)> {
    // The join request is the first binary message we receive.
    let my_data = loop {
        let Some(raw_data) = receiver.next().await else {
            tracing::warn!("WebSocket closed before handshake completed");
            send_closing_message(sender, "Initial error during handshake.".into()).await;
            return None;
        };
        match raw_data {
            Err(err) => {
                tracing::error!(?err, "Initial error during handshake.");
                send_closing_message(sender, "Initial error during handshake.".into()).await;
                return None;
            }
            Ok(Binary(data)) => {
                break data;
            }
            // We do not care about any other message like ping pong messages.
            Ok(_) => {}
        }
    };

    let request = match from_bytes::<JoinRequest>(&my_data) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = ?e, "Failed to parse join request");
            send_closing_message(sender, "Failed to parse join request.".into()).await;
            return None;
        }
    };

    let config = state.configs.read().await.get(&request.mode).cloned();
    let Some(config) = config else {
        tracing::error!(mode = %request.mode, "Requested unknown mode.");
        send_closing_message(sender, format!("Unknown mode {}.", &request.mode)).await;
        return None;
    };
    Some((request, config))
}

/// Creates the room and spawns its task. The room removes itself from the state once the match ended.
fn open_room(state: &Arc<AppState>, room_id: String, config: MatchConfig) -> Room {
    let (to_room_sender, to_room_receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (room_broadcaster, _) = broadcast::channel(CHANNEL_BUFFER_SIZE);
    let board = GridBoard::new(config.board_width, config.board_height, config.arena_count);
    let logic = RoundOrchestrator::new(
        config.clone(),
        board,
        StrengthResolver,
        RandomShuffle(StdRng::from_entropy()),
    );

    let task_state = state.clone();
    let task_room_id = room_id.clone();
    let task_broadcaster = room_broadcaster.clone();
    tokio::spawn(async move {
        let reason = run_room(
            task_room_id.clone(),
            logic,
            to_room_receiver,
            task_broadcaster,
            TICK_INTERVAL,
        )
        .await;
        tracing::info!(room = %task_room_id, reason, "Room closed.");
        task_state.rooms.lock().await.remove(&task_room_id);
    });
    tracing::info!(room = %room_id, mode = %config.name, "Room opened.");

    Room {
        mode: config.name.clone(),
        next_participant_id: 1,
        amount_of_players: 0,
        max_connections: max_connections(&config),
        to_room_sender,
        room_broadcaster,
    }
}

/// Connects and eventually opens the room.
pub async fn init_and_connect(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    state: Arc<AppState>,
) -> Option<HandshakeResult> {
    let (request, config) = get_initial_query(sender, receiver, &state).await?;

    // The final room id is the combination of room and mode.
    let room_id = format!("{}#{}", request.room_id, request.mode);

    let mut rooms = state.rooms.lock().await;
    let local_room = match rooms.entry(room_id.clone()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(open_room(&state, room_id.clone(), config)),
    };

    // Do we fit in?
    if local_room.amount_of_players >= local_room.max_connections {
        let max = local_room.max_connections;
        drop(rooms);
        send_closing_message(
            sender,
            format!("Room {} exceeded max amount of connections {}.", &request.room_id, max),
        )
        .await;
        return None;
    }

    // Save guard against the case, that we have run out of participant ids.
    if local_room.next_participant_id == ParticipantId::MAX {
        drop(rooms);
        send_closing_message(sender, format!("Room {} run out of participant ids.", &request.room_id)).await;
        tracing::error!("Room run out of participant ids.");
        return None;
    }

    local_room.amount_of_players += 1;
    let participant = local_room.next_participant_id;
    local_room.next_participant_id += 1;

    let to_room = local_room.to_room_sender.clone();
    // Subscribe before the arrival, so the full update following it can not be missed.
    let from_room = local_room.room_broadcaster.subscribe();
    drop(rooms);

    let result = to_room
        .send(RoomEvent::Arrival {
            participant,
            display_name: request.display_name,
        })
        .await;
    if let Err(error) = result {
        // We have to leave the room again.
        let mut rooms = state.rooms.lock().await;
        if let Some(room) = rooms.get_mut(&room_id) {
            room.amount_of_players = room.amount_of_players.saturating_sub(1);
        }
        drop(rooms);
        tracing::error!(?error, "Room unexpectedly closed during handshake");
        send_closing_message(sender, "Room unexpectedly closed during handshake".into()).await;
        return None;
    }

    Some(HandshakeResult {
        participant,
        room_id,
        to_room,
        from_room,
    })
}

/// Informs the participant of its id, returns a bool as a success flag.
pub async fn inform_client_of_connection(
    sender: &mut SplitSink<WebSocket, Message>,
    status: &HandshakeResult,
) -> bool {
    let mut msg = BytesMut::with_capacity(HAND_SHAKE_RESPONSE_SIZE);
    msg.put_u8(HAND_SHAKE_RESPONSE);
    msg.put_i32(status.participant);

    let result = sender.send(Message::Binary(msg.into())).await;
    result.is_ok()
}

/// Performs the shutdown of the connection and sends a last message.
pub async fn shutdown_connection(
    wrapped_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    disconnect_data: DisconnectData,
    app_state: Arc<AppState>,
    error_message: &'static str,
) {
    // Inform the room first. It may already be gone.
    let _ = disconnect_data
        .to_room
        .send(RoomEvent::Departure(disconnect_data.participant))
        .await;
    let mut rooms = app_state.rooms.lock().await;
    if let Some(room) = rooms.get_mut(&disconnect_data.room_id) {
        room.amount_of_players = room.amount_of_players.saturating_sub(1);
    }
    drop(rooms);

    let mut sender = wrapped_sender.lock().await;

    tracing::debug!(participant = disconnect_data.participant, error_message, "Connection closed.");
    send_closing_message(&mut sender, error_message.into()).await;
}
