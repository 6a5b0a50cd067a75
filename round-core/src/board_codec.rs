//! Transcoding between a participant's roster and the snapshot that travels to the coordinator.
//!
//! The codec knows nothing about teams, arenas or networking.

use crate::error::RoundError;
use protocol::GridCoord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Where a unit of a roster currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitLocation {
    /// On the active board.
    Board(GridCoord),
    /// On the bench slot with the index.
    Bench(usize),
}

/// A unit as the local client knows it.
#[derive(Clone, Debug, PartialEq)]
pub struct RosterUnit {
    pub unit_type_id: String,
    pub star_level: u32,
    pub location: UnitLocation,
}

/// A unit on a board at the time of the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnitPlacement {
    pub unit_type_id: String,
    pub star_level: u32,
    pub coord: GridCoord,
}

/// One entry of the serialized snapshot.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRecord {
    pub unit_type_id: String,
    pub star_level: u32,
    pub grid_x: i32,
    pub grid_y: i32,
}

/// The transferable form of a board: `{positions: [{unitTypeId, starLevel, gridX, gridY}]}`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct BoardSnapshot {
    pub positions: Vec<PlacementRecord>,
}

/// Captures the units on the active board. Bench units never end up in the snapshot.
pub fn encode<'a>(roster: impl IntoIterator<Item = &'a RosterUnit>) -> BoardSnapshot {
    let positions = roster
        .into_iter()
        .filter_map(|unit| match unit.location {
            UnitLocation::Board(coord) => Some(PlacementRecord {
                unit_type_id: unit.unit_type_id.clone(),
                star_level: unit.star_level,
                grid_x: coord.x,
                grid_y: coord.y,
            }),
            UnitLocation::Bench(_) => None,
        })
        .collect();
    BoardSnapshot { positions }
}

/// Turns a snapshot back into placements. Duplicate coordinates mean a corrupt or adversarial payload.
pub fn decode(snapshot: &BoardSnapshot) -> Result<Vec<UnitPlacement>, RoundError> {
    let mut seen = HashSet::with_capacity(snapshot.positions.len());
    snapshot
        .positions
        .iter()
        .map(|record| {
            let coord = GridCoord::new(record.grid_x, record.grid_y);
            if !seen.insert(coord) {
                return Err(RoundError::MalformedSnapshot(format!(
                    "duplicate coordinate ({}, {})",
                    coord.x, coord.y
                )));
            }
            if record.star_level == 0 {
                return Err(RoundError::MalformedSnapshot(format!(
                    "unit {} with star level 0",
                    record.unit_type_id
                )));
            }
            Ok(UnitPlacement {
                unit_type_id: record.unit_type_id.clone(),
                star_level: record.star_level,
                coord,
            })
        })
        .collect()
}

pub fn to_json(snapshot: &BoardSnapshot) -> Result<String, RoundError> {
    serde_json::to_string(snapshot).map_err(|e| RoundError::MalformedSnapshot(e.to_string()))
}

pub fn from_json(json: &str) -> Result<BoardSnapshot, RoundError> {
    serde_json::from_str(json).map_err(|e| RoundError::MalformedSnapshot(e.to_string()))
}

/// Parses and validates a snapshot as it arrives over the wire.
pub fn decode_json(json: &str) -> Result<Vec<UnitPlacement>, RoundError> {
    decode(&from_json(json)?)
}
