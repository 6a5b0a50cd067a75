//! The configuration of one match mode. The match server reads a list of these from `MatchConfig.json`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchConfig {
    /// The name of the mode, used in the join request.
    pub name: String,
    /// Participants beyond this amount become spectators or get kicked. At most one per arena.
    pub max_players: u16,
    /// Amount of participants that starts the lobby countdown.
    pub min_players: u16,
    /// Spectators allowed on top of the participants.
    pub max_spectators: u16,
    /// Lobby countdown once `min_players` arrived.
    pub lobby_seconds: f32,
    pub prep_seconds: f32,
    pub combat_seconds: f32,
    pub results_seconds: f32,
    pub starting_health: i32,
    /// Health a participant loses for a lost or forfeited fight.
    pub damage_per_loss: i32,
    pub board_width: i32,
    pub board_height: i32,
    pub arena_count: u16,
    /// Seconds between two snapshot requests.
    pub snapshot_retry_interval: f32,
    /// `None` keeps asking forever.
    pub max_snapshot_retries: Option<u32>,
    /// Seconds between two countdown broadcasts.
    pub timer_sync_interval: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            name: "standard".to_string(),
            max_players: 8,
            min_players: 2,
            max_spectators: 8,
            lobby_seconds: 10.0,
            prep_seconds: 30.0,
            combat_seconds: 45.0,
            results_seconds: 5.0,
            starting_health: 100,
            damage_per_loss: 10,
            board_width: 8,
            board_height: 4,
            arena_count: 8,
            snapshot_retry_interval: 1.0,
            max_snapshot_retries: Some(10),
            timer_sync_interval: 1.0,
        }
    }
}

impl MatchConfig {
    /// Checks the values for consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Mode without name.".to_string());
        }
        if self.min_players == 0 {
            return Err(format!("Mode {}: minPlayers must be at least 1.", self.name));
        }
        if self.max_players < self.min_players {
            return Err(format!(
                "Mode {}: maxPlayers {} is below minPlayers {}.",
                self.name, self.max_players, self.min_players
            ));
        }
        if self.board_width <= 0 || self.board_height <= 0 {
            return Err(format!("Mode {}: board dimensions must be positive.", self.name));
        }
        if self.arena_count == 0 {
            return Err(format!("Mode {}: at least one arena is required.", self.name));
        }
        if self.max_players > self.arena_count {
            return Err(format!(
                "Mode {}: maxPlayers {} exceeds the {} arenas.",
                self.name, self.max_players, self.arena_count
            ));
        }
        if self.starting_health <= 0 || self.damage_per_loss < 0 {
            return Err(format!("Mode {}: illegal health settings.", self.name));
        }
        let durations = [
            self.prep_seconds,
            self.combat_seconds,
            self.results_seconds,
            self.snapshot_retry_interval,
            self.timer_sync_interval,
        ];
        if durations.iter().any(|d| *d <= 0.0) || self.lobby_seconds < 0.0 {
            return Err(format!("Mode {}: phase durations must be positive.", self.name));
        }
        Ok(())
    }
}
