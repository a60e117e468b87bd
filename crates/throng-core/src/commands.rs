//! Host commands: clicks, tools and petition answers.
//!
//! Commands arrive from the observer as JSON, are queued, and are applied
//! by the frame loop between steps. None of them can fail the simulation;
//! a command that finds nothing to act on reports why and is dropped.

use rand::Rng;
use serde::{Deserialize, Serialize};
use throng_types::{CreatureState, FoodItem, PetitionAction, PetitionId, Tool, VITAL_MAX, clamp_vital};
use tracing::info;

use crate::config::ThrongConfig;
use crate::petition;
use crate::world::World;

/// Height host-spawned food falls from.
const SPAWN_HEIGHT: f32 = 3.0;

/// A command from the host, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Drop a food item at a point.
    SpawnFood {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Collect the nearest bone in reach.
    Harvest {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Use a tool on the nearest living creature in reach.
    ApplyTool {
        /// Which tool.
        tool: Tool,
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Answer a petition entry.
    Petition {
        /// Entry id.
        id: PetitionId,
        /// The answer.
        action: PetitionAction,
    },
}

/// Why a command had no effect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Coordinates were not finite.
    #[error("coordinates are not finite")]
    BadCoordinates,

    /// Nothing of the right kind within reach.
    #[error("nothing in reach of ({x:.1}, {y:.1})")]
    NothingInReach {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },

    /// No active petition with that id.
    #[error("no active petition {0}")]
    UnknownPetition(PetitionId),
}

/// Apply one command to the world.
pub fn apply<R: Rng + ?Sized>(
    world: &mut World,
    command: Command,
    config: &ThrongConfig,
    rng: &mut R,
) -> Result<(), CommandError> {
    match command {
        Command::SpawnFood { x, y } => {
            let (x, y) = point(world, x, y)?;
            world.food.insert(FoodItem::dropped(x, y, SPAWN_HEIGHT, world.tick));
            Ok(())
        }
        Command::Harvest { x, y } => harvest(world, x, y, config.tools.reach),
        Command::ApplyTool { tool, x, y } => apply_tool(world, tool, x, y, config),
        Command::Petition { id, action } => {
            if petition::resolve(world, id, action, &config.petition, rng) {
                Ok(())
            } else {
                Err(CommandError::UnknownPetition(id))
            }
        }
    }
}

fn point(world: &World, x: f32, y: f32) -> Result<(f32, f32), CommandError> {
    if x.is_finite() && y.is_finite() {
        Ok(world.clamp_point(x, y))
    } else {
        Err(CommandError::BadCoordinates)
    }
}

fn harvest(world: &mut World, x: f32, y: f32, reach: f32) -> Result<(), CommandError> {
    let (x, y) = point(world, x, y)?;
    let nearest = world
        .bones
        .iter()
        .map(|(key, b)| (key, (b.x - x).hypot(b.y - y)))
        .filter(|(_, d)| *d <= reach)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key);
    let bone = nearest
        .and_then(|key| world.bones.remove(key))
        .ok_or(CommandError::NothingInReach { x, y })?;
    world.resources.bones = world.resources.bones.saturating_add(1);
    info!(lineage = %bone.lineage, "bone harvested");
    Ok(())
}

fn apply_tool(
    world: &mut World,
    tool: Tool,
    x: f32,
    y: f32,
    config: &ThrongConfig,
) -> Result<(), CommandError> {
    let (x, y) = point(world, x, y)?;
    let tools = &config.tools;
    let creature = world
        .creatures
        .values_mut()
        .filter(|c| c.alive)
        .map(|c| {
            let d = c.distance_to(x, y);
            (c, d)
        })
        .filter(|(_, d)| *d <= tools.reach)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
        .ok_or(CommandError::NothingInReach { x, y })?;

    let (state, note) = match tool {
        Tool::Wash => {
            creature.clean = VITAL_MAX;
            (CreatureState::Bathing, "was washed")
        }
        Tool::Play => {
            creature.happiness = clamp_vital(creature.happiness + tools.play_happiness);
            (CreatureState::Playing, "was played with")
        }
        Tool::Feed => {
            creature.hunger = clamp_vital(creature.hunger + tools.feed_hunger);
            (CreatureState::Eating, "was fed by hand")
        }
    };
    creature.state = state;
    creature.state_timer = tools.state_duration;
    creature.vx = 0.0;
    creature.vy = 0.0;
    creature.event_log.push(note);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use throng_types::{Bone, Creature, CreatureId, PetitionEntry};

    use super::*;

    fn setup() -> (World, ThrongConfig, StdRng) {
        let config = ThrongConfig::default();
        (World::empty(&config), config, StdRng::seed_from_u64(1))
    }

    #[test]
    fn command_json_shape() {
        let raw = r#"{"type": "apply_tool", "tool": "wash", "x": 2.0, "y": 3.5}"#;
        let command: Option<Command> = serde_json::from_str(raw).ok();
        assert_eq!(
            command,
            Some(Command::ApplyTool {
                tool: Tool::Wash,
                x: 2.0,
                y: 3.5
            })
        );
        let raw = r#"{"type": "petition", "id": 3, "action": "deny"}"#;
        assert!(serde_json::from_str::<Command>(raw).is_ok());
    }

    #[test]
    fn spawned_food_is_clamped_into_the_world() {
        let (mut world, config, mut rng) = setup();
        let result = apply(&mut world, Command::SpawnFood { x: 99.0, y: -4.0 }, &config, &mut rng);
        assert!(result.is_ok());
        let item = world.food.values().next().cloned();
        assert!(item.is_some_and(|f| (f.x - world.width).abs() < f32::EPSILON && f.y.abs() < f32::EPSILON));
        assert_eq!(
            apply(&mut world, Command::SpawnFood { x: f32::NAN, y: 1.0 }, &config, &mut rng),
            Err(CommandError::BadCoordinates)
        );
    }

    #[test]
    fn harvest_takes_the_nearest_bone_in_reach() {
        let (mut world, config, mut rng) = setup();
        world.bones.insert(Bone::at(5.0, 5.0, CreatureId::new(), "ABCD"));
        world.bones.insert(Bone::at(9.0, 9.0, CreatureId::new(), "WXYZ"));
        assert!(apply(&mut world, Command::Harvest { x: 5.5, y: 5.0 }, &config, &mut rng).is_ok());
        assert_eq!(world.bones.len(), 1);
        assert_eq!(world.resources.bones, 1);
        assert!(matches!(
            apply(&mut world, Command::Harvest { x: 1.0, y: 1.0 }, &config, &mut rng),
            Err(CommandError::NothingInReach { .. })
        ));
    }

    #[test]
    fn tools_change_vitals_and_state() {
        let (mut world, config, mut rng) = setup();
        let key = world.creatures.insert(Creature::founder("ABCD", 4.0, 4.0));
        world.creatures[key].clean = 10.0;
        world.creatures[key].hunger = 50.0;

        let wash = Command::ApplyTool { tool: Tool::Wash, x: 4.5, y: 4.0 };
        assert!(apply(&mut world, wash, &config, &mut rng).is_ok());
        assert!((world.creatures[key].clean - 100.0).abs() < f32::EPSILON);
        assert_eq!(world.creatures[key].state, CreatureState::Bathing);

        let feed = Command::ApplyTool { tool: Tool::Feed, x: 4.0, y: 4.0 };
        assert!(apply(&mut world, feed, &config, &mut rng).is_ok());
        assert!((world.creatures[key].hunger - 75.0).abs() < f32::EPSILON);

        let play = Command::ApplyTool { tool: Tool::Play, x: 4.0, y: 4.0 };
        assert!(apply(&mut world, play, &config, &mut rng).is_ok());
        assert!((world.creatures[key].happiness - 100.0).abs() < f32::EPSILON);
        assert_eq!(world.creatures[key].state, CreatureState::Playing);
    }

    #[test]
    fn tools_skip_the_dead() {
        let (mut world, config, mut rng) = setup();
        let key = world.creatures.insert(Creature::founder("ABCD", 4.0, 4.0));
        world.creatures[key].alive = false;
        let feed = Command::ApplyTool { tool: Tool::Feed, x: 4.0, y: 4.0 };
        assert!(apply(&mut world, feed, &config, &mut rng).is_err());
    }

    #[test]
    fn unknown_petition_is_reported() {
        let (mut world, config, mut rng) = setup();
        world.petitions.push(PetitionEntry {
            id: 1,
            text: "more trees".to_owned(),
            urgency: 2,
            lineage_scope: "*".to_owned(),
        });
        let answer = Command::Petition { id: 2, action: PetitionAction::Grant };
        assert_eq!(apply(&mut world, answer, &config, &mut rng), Err(CommandError::UnknownPetition(2)));
        let answer = Command::Petition { id: 1, action: PetitionAction::Grant };
        assert!(apply(&mut world, answer, &config, &mut rng).is_ok());
        assert_eq!(world.trees.len(), 3);
    }
}
