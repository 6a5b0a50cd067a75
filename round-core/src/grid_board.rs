//! An in-memory board: every arena has a home and a visitor grid of the same size.
//! Used by the match server as the authoritative arena copy and by observers as their local replica.

use crate::traits::{BoardService, Cell, Side, Team, Unit};
use protocol::{ArenaId, EntityRef, GridCoord};
use std::collections::BTreeMap;

/// A spawned unit entity.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnedUnit {
    pub arena: ArenaId,
    pub unit_type_id: String,
    pub star_level: u32,
    pub health: i32,
    pub team: Option<Team>,
    pub cell: Option<Cell>,
}

/// Health of a freshly spawned unit per star level. Real stats live in the unit collaborator.
const HEALTH_PER_STAR: i32 = 100;

impl Unit for SpawnedUnit {
    fn set_owner(&mut self, team: Team) {
        self.team = Some(team);
    }

    fn assign_to_cell(&mut self, cell: Cell) {
        self.cell = Some(cell);
    }

    fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount.max(0)).max(0);
    }

    fn is_alive(&self) -> bool {
        self.health > 0
    }
}

pub struct GridBoard {
    width: i32,
    height: i32,
    arenas: Vec<ArenaId>,
    units: BTreeMap<EntityRef, SpawnedUnit>,
    next_entity: EntityRef,
}

impl GridBoard {
    /// Creates `arena_count` arenas with the ids `0..arena_count`.
    pub fn new(width: i32, height: i32, arena_count: u16) -> Self {
        GridBoard {
            width,
            height,
            arenas: (0..ArenaId::from(arena_count)).collect(),
            units: BTreeMap::new(),
            next_entity: 1,
        }
    }

    fn has_arena(&self, arena: ArenaId) -> bool {
        self.arenas.contains(&arena)
    }

    fn in_bounds(&self, coord: GridCoord) -> bool {
        (0..self.width).contains(&coord.x) && (0..self.height).contains(&coord.y)
    }

    fn side_cells(&self, arena: ArenaId, side: Side) -> Option<Vec<Cell>> {
        if !self.has_arena(arena) {
            return None;
        }
        let cells = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| GridCoord::new(x, y)))
            .map(|coord| Cell { arena, side, coord })
            .collect();
        Some(cells)
    }

    pub fn unit(&self, entity: EntityRef) -> Option<&SpawnedUnit> {
        self.units.get(&entity)
    }

    /// All units of an arena with their entity reference.
    pub fn units_on(&self, arena: ArenaId) -> impl Iterator<Item = (EntityRef, &SpawnedUnit)> {
        self.units
            .iter()
            .filter(move |(_, unit)| unit.arena == arena)
            .map(|(entity, unit)| (*entity, unit))
    }
}

impl BoardService for GridBoard {
    type Unit = SpawnedUnit;

    fn arena_ids(&self) -> Vec<ArenaId> {
        self.arenas.clone()
    }

    fn board_width(&self, arena: ArenaId) -> Option<i32> {
        self.has_arena(arena).then_some(self.width)
    }

    fn home_cells(&self, arena: ArenaId) -> Option<Vec<Cell>> {
        self.side_cells(arena, Side::Home)
    }

    fn visitor_cells(&self, arena: ArenaId) -> Option<Vec<Cell>> {
        self.side_cells(arena, Side::Visitor)
    }

    fn cell_at(&self, arena: ArenaId, side: Side, coord: GridCoord) -> Option<Cell> {
        (self.has_arena(arena) && self.in_bounds(coord)).then_some(Cell { arena, side, coord })
    }

    fn spawn_unit(&mut self, arena: ArenaId, unit_type_id: &str, star_level: u32) -> Option<EntityRef> {
        if !self.has_arena(arena) {
            return None;
        }
        let entity = self.next_entity;
        self.next_entity += 1;
        let stars = i32::try_from(star_level).unwrap_or(i32::MAX / HEALTH_PER_STAR);
        self.units.insert(
            entity,
            SpawnedUnit {
                arena,
                unit_type_id: unit_type_id.to_string(),
                star_level,
                health: HEALTH_PER_STAR.saturating_mul(stars),
                team: None,
                cell: None,
            },
        );
        Some(entity)
    }

    fn unit_mut(&mut self, entity: EntityRef) -> Option<&mut SpawnedUnit> {
        self.units.get_mut(&entity)
    }

    fn clear_arena(&mut self, arena: ArenaId) {
        self.units.retain(|_, unit| unit.arena != arena);
    }
}
