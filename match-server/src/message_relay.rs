//! WebSocket message routing between a participant connection and its room.
//!
//! It spawns paired Tokio tasks for each connection that:
//! - Decode participant RPCs and forward them to the room with the trusted participant id
//! - Deliver the room broadcast to the participant
//! - Manage sync state so participants only receive deltas after a full update

use crate::room::RoomEvent;
use axum::extract::ws::{Message, WebSocket};
use bytes::{Buf, Bytes};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// Spawns bidirectional message handlers for a participant connection.
///
/// Creates two concurrent tasks:
/// - **Send task**: Delivers room broadcasts to this participant (with sync state filtering)
/// - **Receive task**: Forwards participant RPCs to the room (with participant id injection)
///
/// When either task completes (connection lost, protocol error, intentional disconnect),
/// the other is aborted.
///
/// # Returns
/// A static string describing why the connection ended.
pub async fn handle_participant_logic(
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    receiver: SplitStream<WebSocket>,
    internal_receiver: broadcast::Receiver<Bytes>,
    internal_sender: mpsc::Sender<RoomEvent>,
    participant: ParticipantId,
) -> &'static str {
    let mut send_task = tokio::spawn(async move {
        send_logic_participant(sender, internal_receiver, participant).await
    });

    let mut receive_task = tokio::spawn(async move {
        receive_logic_participant(receiver, internal_sender, participant).await
    });

    // If any one of the tasks run to completion, we abort the other.
    let result = tokio::select! {
        res_a = &mut send_task => {receive_task.abort(); res_a},
        res_b = &mut receive_task => {send_task.abort(); res_b},
    };

    result.unwrap_or_else(|err| {
        tracing::error!(?err, "Internal panic in participant logic.");
        "Internal panic in participant logic."
    })
}

/// Receives messages from a participant and forwards them to the room.
///
/// Allowed message types from a participant:
/// - [`SERVER_RPC`]: A [`ToCoordinator`] message, gets the participant id attached
/// - [`CLIENT_DISCONNECTS_SELF`]: Graceful disconnect (triggers cleanup)
async fn receive_logic_participant(
    mut receiver: SplitStream<WebSocket>,
    internal_sender: mpsc::Sender<RoomEvent>,
    participant: ParticipantId,
) -> &'static str {
    while let Some(state) = receiver.next().await {
        match state {
            Ok(Message::Binary(bytes)) => {
                if bytes.is_empty() {
                    tracing::error!(participant, "Illegal empty message received.");
                    return "Illegal empty message received.";
                }
                match bytes[0] {
                    SERVER_RPC => {
                        let payload = match decode_payload::<ToCoordinator>(&bytes) {
                            Ok(payload) => payload,
                            Err(error) => {
                                tracing::error!(participant, ?error, "Malformed RPC from participant.");
                                return "Malformed RPC from participant.";
                            }
                        };
                        let res = internal_sender.send(RoomEvent::Rpc(participant, payload)).await;
                        if let Err(error) = res {
                            tracing::error!(?error, "Error in internal channel.");
                            return "Error in internal channel.";
                        }
                    }
                    CLIENT_DISCONNECTS_SELF => {
                        return "Participant disconnected intentionally";
                    }
                    _ => {
                        tracing::error!(participant, command = ?bytes[0], "Illegal command from participant.");
                        return "Illegal command from participant";
                    }
                }
            }
            Ok(_) => {} // Ignore other messages
            Err(_) => {
                return "Connection lost.";
            }
        }
    }
    "Connection lost."
}

/// Delivers room broadcasts to a specific participant with sync state management.
///
/// # Sync State Machine
/// Participants start unsynced and must receive a [`FULL_UPDATE`] before
/// processing [`DELTA_UPDATE`] messages. This prevents applying
/// deltas to an unknown base state.
///
/// ```text
/// [Unsynced] --FULL_UPDATE--> [Synced] --DELTA_UPDATE--> [Synced]
/// [Synced]   --FULL_UPDATE--> [Synced] (dropped)
/// [Unsynced] --DELTA_UPDATE--> [Unsynced] (dropped)
/// ```
///
/// # Filtered Messages
/// - [`CLIENT_GETS_KICKED`]: Only terminates if `participant` matches
/// - [`SERVER_DISCONNECTS`]: Always terminates
async fn send_logic_participant(
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut internal_receiver: broadcast::Receiver<Bytes>,
    participant: ParticipantId,
) -> &'static str {
    let mut enclosed = sender.lock().await;

    let mut is_synced = false;
    loop {
        let state = internal_receiver.recv().await;
        match state {
            Err(RecvError::Closed) => {
                tracing::error!("Internal channel closed.");
                return "Internal channel closed.";
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    participant,
                    skipped_messages = skipped,
                    "Lagging started on internal channel."
                );
                return "Lagging on internal channel - Computer too slow.";
            }
            Ok(mut bytes) => {
                if bytes.is_empty() {
                    tracing::error!("Illegal empty message received.");
                    return "Illegal empty message received.";
                }
                let forward = match bytes[0] {
                    SERVER_DISCONNECTS => {
                        return "The match has ended.";
                    }
                    CLIENT_GETS_KICKED => {
                        if bytes.len() < CLIENT_GETS_KICKED_MSG_SIZE {
                            tracing::error!("Malformed CLIENT_GETS_KICKED message");
                            return "Malformed message received.";
                        }
                        bytes.get_u8(); // Skip command byte
                        if bytes.get_i32() == participant {
                            return "We got rejected by the match.";
                        }
                        false
                    }
                    DELTA_UPDATE => is_synced,
                    FULL_UPDATE => !std::mem::replace(&mut is_synced, true),
                    _ => {
                        tracing::error!(
                            message = bytes[0],
                            "Illegal message on participant side received."
                        );
                        return "Illegal message on participant side received.";
                    }
                };
                if forward {
                    let res = enclosed.send(Message::Binary(bytes)).await;
                    if let Err(error) = res {
                        tracing::error!(?error, "Error in communication with participant endpoint.");
                        return "Error in communication with participant endpoint.";
                    }
                }
            }
        }
    }
}
