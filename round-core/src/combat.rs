//! A stand-in for the external combat collaborator.

use crate::board_codec::UnitPlacement;
use crate::traits::{CombatOutcome, CombatResolver, Fight};

/// The side with more stars on the arena wins, equal strength is a draw.
#[derive(Default, Debug, Clone, Copy)]
pub struct StrengthResolver;

fn strength(units: &[UnitPlacement]) -> u64 {
    units.iter().map(|u| u64::from(u.star_level)).sum()
}

impl CombatResolver for StrengthResolver {
    fn resolve(&mut self, fight: &Fight) -> CombatOutcome {
        let home = strength(&fight.home_units);
        let visitor = strength(&fight.visitor_units);
        match home.cmp(&visitor) {
            std::cmp::Ordering::Greater => CombatOutcome::Winner(fight.home),
            std::cmp::Ordering::Less => CombatOutcome::Winner(fight.visitor),
            std::cmp::Ordering::Equal => CombatOutcome::Draw,
        }
    }
}
