//! The civilization epoch state machine.
//!
//! ```text
//! Eden -> Pastoral -> Agricultural -> Industrial -> Collapse
//!   ^                                                   |
//!   +------------------- ricorso -----------------------+
//! ```
//!
//! Population thresholds drive the first three transitions. Industrial
//! collapses under heavy pollution and scarce food, and Collapse ends in
//! ricorso once the population dwindles. Ancestral memory survives it.
//!
//! Entering Collapse archives the whole chronicle as a single ancestral
//! memory, so one fall takes one memory slot and earlier eras are kept.

use throng_types::Epoch;
use tracing::info;

use crate::config::EpochConfig;
use crate::world::World;

/// The transition the world is due for, if any.
pub fn next_epoch(world: &World, config: &EpochConfig) -> Option<Epoch> {
    let living = world.living_count();
    match world.epoch {
        Epoch::Eden | Epoch::Pastoral | Epoch::Agricultural => {
            let threshold = config
                .population_thresholds
                .get(usize::from(world.epoch.ordinal()))?;
            (living >= *threshold)
                .then(|| Epoch::from_ordinal(world.epoch.ordinal().saturating_add(1)))
                .flatten()
        }
        Epoch::Industrial => {
            let starving = world.ground_food_count().saturating_mul(4) < living;
            (world.pollution >= config.collapse_pollution && starving).then_some(Epoch::Collapse)
        }
        Epoch::Collapse => (living < config.ricorso_population).then_some(Epoch::Eden),
    }
}

/// Run the periodic epoch check. Returns the transition taken.
pub fn check(world: &mut World, config: &EpochConfig) -> Option<(Epoch, Epoch)> {
    let to = next_epoch(world, config)?;
    let from = world.epoch;
    enter(world, to).then_some((from, to))
}

/// Move the world into `to`, with the collapse and ricorso side effects.
///
/// Used by the periodic check and by plans that force an epoch. Returns
/// `false` if the world is already there.
pub fn enter(world: &mut World, to: Epoch) -> bool {
    let from = world.epoch;
    if from == to {
        return false;
    }

    if to == Epoch::Collapse {
        let archive = world.chronicle.join("; ");
        if archive.is_empty() {
            world.remember(format!("the fall at tick {}", world.tick));
        } else {
            world.remember(format!("before the fall: {archive}"));
        }
    }
    if from == Epoch::Collapse && to == Epoch::Eden {
        world.remember(format!(
            "ricorso at tick {}: {} survivors returned to the garden",
            world.tick,
            world.living_count()
        ));
    }

    world.epoch = to;
    world.push_chronicle(format!("the age of {to} began"));
    info!(tick = world.tick, from = %from, to = %to, "epoch changed");
    true
}
