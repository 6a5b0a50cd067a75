//! This module handles the match rooms participants connect to.
//! It provides:
//! - [`Room`]: A match session with its inbound event channel and the broadcast towards the participants
//! - [`AppState`]: Global state holding all active rooms and match modes
//! - [`reload_config`]: Hot-reloading of the match modes from `MatchConfig.json`

use crate::room::RoomEvent;
use bytes::Bytes;
use protocol::ParticipantId;
use round_core::config::MatchConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};

/// The file with the list of match modes, relative to the working directory.
pub const CONFIG_FILE: &str = "MatchConfig.json";

/// The description of the room, the participants play in.
pub struct Room {
    /// The match mode the room was opened with.
    pub mode: String,
    /// The next id a participant gets, this is consecutively counted.
    pub next_participant_id: ParticipantId,
    /// The amount of connections currently in the room.
    pub amount_of_players: u16,
    /// Participants plus spectators.
    pub max_connections: u16,
    /// The sender to send events to the room task.
    pub to_room_sender: mpsc::Sender<RoomEvent>, // Clone-able no Mutex!
    /// The broadcast sender needed to subscribe for the participants.
    pub room_broadcaster: broadcast::Sender<Bytes>, // Clone-able -> no Mutex!
}

/// The application state.
#[derive(Default)]
pub struct AppState {
    /// The rooms we associate with several sessions.
    pub rooms: Mutex<HashMap<String, Room>>,
    /// Contains a mapping from mode name to its configuration.
    pub configs: RwLock<HashMap<String, MatchConfig>>,
}

/// Parses and validates the list of match modes.
pub fn parse_config(json_content: &str) -> Result<HashMap<String, MatchConfig>, String> {
    let raw_data: Vec<MatchConfig> =
        serde_json::from_str(json_content).map_err(|e| format!("Failed to parse JSON: {}", e))?;
    let mut configs = HashMap::with_capacity(raw_data.len());
    for config in raw_data {
        config.validate()?;
        if configs.contains_key(&config.name) {
            return Err(format!("Mode {} is listed twice.", config.name));
        }
        configs.insert(config.name.clone(), config);
    }
    Ok(configs)
}

/// Reloads the configuration file. Running rooms keep the configuration they were opened with.
pub async fn reload_config(state: &Arc<AppState>) -> Result<(), String> {
    let json_content = fs::read_to_string(CONFIG_FILE)
        .await
        .map_err(|e| format!("Failed to read file: {}", e))?;
    let new_configs = parse_config(&json_content)?;

    {
        let mut configs = state.configs.write().await;
        *configs = new_configs; // Replace all.
    }
    Ok(())
}

/// The maximum amount of connections a room of this mode accepts.
pub fn max_connections(config: &MatchConfig) -> u16 {
    config.max_players.saturating_add(config.max_spectators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_keyed_by_name() {
        let configs = parse_config(
            r#"[{"name": "standard"}, {"name": "duel", "maxPlayers": 2, "maxSpectators": 3}]"#,
        )
        .unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(max_connections(&configs["duel"]), 5);
        assert_eq!(configs["standard"].prep_seconds, 30.0);
    }

    #[test]
    fn invalid_modes_are_rejected() {
        assert!(parse_config(r#"[{"name": "broken", "arenaCount": 0}]"#).is_err());
        assert!(parse_config(r#"[{"name": "crowded", "maxPlayers": 9, "arenaCount": 8}]"#).is_err());
        assert!(parse_config(r#"[{"name": "twice"}, {"name": "twice"}]"#).is_err());
        assert!(parse_config("not json").is_err());
    }
}
