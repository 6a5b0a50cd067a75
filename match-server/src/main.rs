mod hand_shake;
mod lobby;
mod message_relay;
mod room;

use crate::hand_shake::{
    DisconnectData, inform_client_of_connection, init_and_connect, shutdown_connection,
};
use crate::lobby::{AppState, reload_config};
use crate::message_relay::handle_participant_logic;
use axum::Router;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable with the address to listen on.
const BIND_ADDR_VAR: &str = "ARENA_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
/// Activates error tracing, spawns a watch dog task to eliminate eventual dead rooms, then it sets up the routing system to serve the
/// web sockets and listen for the pages enlist and reload.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=trace,round_core=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let app_state = Arc::new(AppState::default());
    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1200)); // 20 Min
        loop {
            interval.tick().await;
            cleanup_dead_rooms(&watchdog_state).await;
        }
    });

    if let Err(message) = reload_config(&app_state).await {
        tracing::error!(error = %message, "Initial load error.");
        return;
    }

    let app = Router::new()
        .route("/reload", get(reload_handler))
        .route("/enlist", get(enlist_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state);

    let address = std::env::var(BIND_ADDR_VAR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(?error, %address, "Could not bind.");
            return;
        }
    };
    tracing::info!(%address, "Match server listening.");

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(?error, "Server stopped.");
    }
}

/// Runs over all rooms and checks if their room task is gone.
/// If so, it cleans them up. This is a fallback solution things should be handled internally otherwise.
async fn cleanup_dead_rooms(state: &Arc<AppState>) {
    let mut rooms = state.rooms.lock().await;
    rooms.retain(|room_id, room| {
        let is_alive = !room.to_room_sender.is_closed();
        if !is_alive {
            tracing::info!("Removing dead room: {}", room_id);
        }
        is_alive
    });
}

/// Generates a list with the current rooms, the amount of connections and info if this is a dead room.
async fn enlist_handler(State(state): State<Arc<AppState>>) -> String {
    let rooms = state.rooms.lock().await;
    rooms
        .iter()
        .map(|(name, room)| {
            format!(
                "Room: {:<30}  Mode: {:<20} Connections: {:03} is alive: {}",
                name,
                room.mode,
                room.amount_of_players,
                !room.to_room_sender.is_closed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Forces the reload of the config file and lists the content. This enables the adding of new modes
/// without restarting the service.
async fn reload_handler(State(state): State<Arc<AppState>>) -> String {
    match reload_config(&state).await {
        Ok(_) => state
            .configs
            .read()
            .await
            .values()
            .map(|config| {
                format!(
                    "Mode: {:<30} Players: {}-{} Arenas: {} Prep/Combat: {}s/{}s",
                    config.name,
                    config.min_players,
                    config.max_players,
                    config.arena_count,
                    config.prep_seconds,
                    config.combat_seconds
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            format!("Config reload failed: {}", e)
        }
    }
}

/// This function gets immediately called and upgrades the web response to a web socket.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket(socket, state))
}

/// Does the whole handling from start to finish: Handshake -> Relaying between participant and room
/// -> Shut down processing.
async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    // By splitting, we can send and receive at the same time.
    let (mut sender, mut receiver) = stream.split();

    let Some(base_data) = init_and_connect(&mut sender, &mut receiver, state.clone()).await else {
        // We quit here, as the handshake did not work out.
        return;
    };

    let disconnect_data = DisconnectData::from(&base_data);
    let success = inform_client_of_connection(&mut sender, &base_data).await;
    let wrapped_sender = Arc::new(Mutex::new(sender));
    let mut error_message = "Connection to room lost";
    if success {
        error_message = handle_participant_logic(
            wrapped_sender.clone(),
            receiver,
            base_data.from_room,
            base_data.to_room,
            base_data.participant,
        )
        .await;
    }

    shutdown_connection(wrapped_sender, disconnect_data, state, error_message).await;
}
