//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `throng-config.yaml` at the project
//! root. Every section and field has a default, so an empty file (or no
//! file at all) yields a runnable world. Oracle credentials are not part of
//! this file; see `throng_oracle::OracleConfig`.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `throng-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrongConfig {
    /// World dimensions, seeding and frame timing.
    pub world: WorldConfig,
    /// Needs decay, death and fade.
    pub vitals: VitalsConfig,
    /// Steering, eating and food physics.
    pub movement: MovementConfig,
    /// Reproduction preconditions.
    pub reproduction: ReproductionConfig,
    /// Proximity gates, cooldowns and fallback effects.
    pub interaction: InteractionConfig,
    /// Rule grammar bounds.
    pub behavior: BehaviorConfig,
    /// Epoch thresholds and pollution drift.
    pub epoch: EpochConfig,
    /// Daily holistic evaluation.
    pub schedule: ScheduleConfig,
    /// Petition cadence and grant effects.
    pub petition: PetitionConfig,
    /// Host tool effects.
    pub tools: ToolConfig,
    /// Store and observer endpoints.
    pub infrastructure: InfrastructureConfig,
}

impl ThrongConfig {
    /// Load configuration from a YAML file.
    ///
    /// `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url` when set.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.world.width > 1.0 && self.world.height > 1.0) {
            return Err(ConfigError::Invalid("world must be larger than 1x1".to_owned()));
        }
        if self.epoch.check_interval_ticks == 0 || self.petition.proposal_interval_ticks == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".to_owned()));
        }
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "evaluation time {}:{:02} is not a clock time",
                self.schedule.hour, self.schedule.minute
            )));
        }
        if !self.epoch.population_thresholds.windows(2).all(|w| matches!(w, [a, b] if a < b)) {
            return Err(ConfigError::Invalid(
                "epoch population thresholds must ascend".to_owned(),
            ));
        }
        if self.interaction.cooldown_capacity == 0 {
            return Err(ConfigError::Invalid("cooldown capacity must be positive".to_owned()));
        }
        Ok(())
    }
}

/// World dimensions, seeding and frame timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Save-slot name; keys the persisted snapshot.
    pub world_id: String,
    /// Seed for the simulation's random stream.
    pub seed: u64,
    /// Width in tiles.
    pub width: f32,
    /// Height in tiles.
    pub height: f32,
    /// Creatures in a freshly generated world.
    pub founders: u32,
    /// Trees in a freshly generated world.
    pub initial_trees: u32,
    /// Drops per generated tree.
    pub tree_health: u32,
    /// Regrow time before a tree drops food.
    pub tree_regrow_threshold: f32,
    /// Hard ceiling on living creatures; reproduction pauses above it.
    pub max_population: usize,
    /// Real milliseconds per frame.
    pub frame_interval_ms: u64,
    /// Real milliseconds that count as one unit of `dt`.
    pub frame_unit_ms: f32,
    /// Seconds between periodic snapshots.
    pub snapshot_interval_secs: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_id: "default".to_owned(),
            seed: 42,
            width: 24.0,
            height: 24.0,
            founders: 3,
            initial_trees: 4,
            tree_health: 5,
            tree_regrow_threshold: 600.0,
            max_population: 60,
            frame_interval_ms: 33,
            frame_unit_ms: 16.667,
            snapshot_interval_secs: 60,
        }
    }
}

/// Needs decay, death and fade.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    /// Hunger lost per unit `dt`.
    pub hunger_decay: f32,
    /// Cleanliness lost per unit `dt`.
    pub clean_decay: f32,
    /// Happiness lost per unit `dt`.
    pub happiness_decay: f32,
    /// Hunger and cleanliness above this let happiness regenerate.
    pub content_threshold: f32,
    /// Happiness regained per unit `dt` while content.
    pub happiness_regen: f32,
    /// Ticks a dead creature stays visible.
    pub fade_ticks: u64,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            hunger_decay: 0.08,
            clean_decay: 0.05,
            happiness_decay: 0.03,
            content_threshold: 50.0,
            happiness_regen: 0.05,
            fade_ticks: 300,
        }
    }
}

/// Steering, eating and food physics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// How far a creature notices ground food.
    pub food_search_radius: f32,
    /// Distance at which food is eaten.
    pub contact_distance: f32,
    /// Speed while steering toward food.
    pub seek_speed: f32,
    /// Speed while wandering.
    pub wander_speed: f32,
    /// Hunger restored by one food item.
    pub eat_hunger: f32,
    /// Happiness gained by eating.
    pub eat_happiness: f32,
    /// Time spent in the eating state.
    pub eat_duration: f32,
    /// Hard cap on velocity magnitude.
    pub max_speed: f32,
    /// Downward acceleration on falling food.
    pub gravity: f32,
    /// Fraction of ground velocity kept per unit `dt` on the ground.
    pub ground_friction: f32,
    /// Fraction of vertical speed kept on the single bounce.
    pub bounce: f32,
    /// Ticks before uneaten food rots away.
    pub food_expiry_ticks: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            food_search_radius: 6.0,
            contact_distance: 0.45,
            seek_speed: 0.035,
            wander_speed: 0.02,
            eat_hunger: 35.0,
            eat_happiness: 8.0,
            eat_duration: 45.0,
            max_speed: 2.0,
            gravity: 0.02,
            ground_friction: 0.85,
            bounce: 0.35,
            food_expiry_ticks: 3600,
        }
    }
}

/// Reproduction preconditions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// Happiness must stay above this.
    pub min_happiness: f32,
    /// Hunger must stay above this.
    pub min_hunger: f32,
    /// Cleanliness must stay above this.
    pub min_clean: f32,
    /// How long all three must hold without a break.
    pub duration: f32,
    /// Birth distance from the parent.
    pub birth_offset: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            min_happiness: 60.0,
            min_hunger: 60.0,
            min_clean: 40.0,
            duration: 600.0,
            birth_offset: 0.6,
        }
    }
}

/// Proximity gates, cooldowns and fallback effects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Creature-pair gate distance.
    pub creature_proximity: f32,
    /// Ticks before the same pair may interact again.
    pub creature_cooldown_ticks: u64,
    /// Creature-bone gate distance.
    pub bone_proximity: f32,
    /// Ticks before the same creature may mourn the same bone again.
    pub bone_cooldown_ticks: u64,
    /// Live cooldown stamps held at once; new pairs wait when it is full.
    pub cooldown_capacity: usize,
    /// Happiness both kin gain in the fallback.
    pub kin_happiness: f32,
    /// Hunger below which a creature is in crisis.
    pub crisis_hunger: f32,
    /// Speed of the fallback evasive move.
    pub evasive_speed: f32,
    /// Happiness lost mourning at bones.
    pub mourning_penalty: f32,
    /// Deaths witnessed after which mourning is halved.
    pub mourning_dampen_after: u32,
    /// Bound on each oracle delta.
    pub delta_limit: f32,
    /// How long an oracle narrative stays on screen.
    pub narrative_ticks: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            creature_proximity: 1.2,
            creature_cooldown_ticks: 600,
            bone_proximity: 1.0,
            bone_cooldown_ticks: 900,
            cooldown_capacity: 4096,
            kin_happiness: 3.0,
            crisis_hunger: 20.0,
            evasive_speed: 0.08,
            mourning_penalty: 8.0,
            mourning_dampen_after: 3,
            delta_limit: 15.0,
            narrative_ticks: 240.0,
        }
    }
}

/// Rule grammar bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Most rules a behavior may hold.
    pub max_rules: usize,
    /// Bound on vital adjustment rates.
    pub max_rate: f32,
    /// Bound on each nudge component.
    pub max_nudge: f32,
    /// Bound on steering strength.
    pub max_strength: f32,
    /// How far `kin_nearby` and `food_nearby` look.
    pub sense_radius: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            max_rules: 6,
            max_rate: 0.5,
            max_nudge: 0.2,
            max_strength: 0.3,
            sense_radius: 4.0,
        }
    }
}

/// Epoch thresholds and pollution drift.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    /// Ticks between epoch checks.
    pub check_interval_ticks: u64,
    /// Living population that advances Eden, Pastoral and Agricultural.
    pub population_thresholds: [usize; 3],
    /// Pollution at which Industrial can collapse.
    pub collapse_pollution: f32,
    /// Population below which Collapse ends in ricorso.
    pub ricorso_population: usize,
    /// Pollution change per unit `dt`, indexed by epoch ordinal.
    pub pollution_drift: [f32; 5],
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            check_interval_ticks: 120,
            population_thresholds: [8, 15, 25],
            collapse_pollution: 8.0,
            ricorso_population: 3,
            pollution_drift: [-0.002, -0.001, 0.001, 0.004, -0.003],
        }
    }
}

/// Daily holistic evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Whether the evaluation runs at all.
    pub enabled: bool,
    /// Local hour of day.
    pub hour: u32,
    /// Local minute.
    pub minute: u32,
    /// Creatures sampled into the evaluation context.
    pub sample_size: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 3,
            minute: 0,
            sample_size: 12,
        }
    }
}

/// Petition cadence and grant effects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PetitionConfig {
    /// Ticks between proposal draws.
    pub proposal_interval_ticks: u64,
    /// Most entries on the active list.
    pub max_entries: usize,
    /// Trees planted by a "tree" grant.
    pub grant_trees: u32,
    /// Health of each granted tree.
    pub grant_tree_health: u32,
    /// Stored food added by a "food" grant.
    pub grant_food_ledger: u32,
    /// Food items dropped by a "food" grant.
    pub grant_food_items: u32,
    /// Pollution removed by a "clean" grant.
    pub grant_pollution_relief: f32,
    /// Happiness given by a "play" grant.
    pub grant_joy: f32,
    /// Happiness given by any other grant.
    pub grant_blessing: f32,
    /// Happiness lost by every creature in a denied scope.
    pub deny_penalty: f32,
    /// Bound on a plan's pollution change.
    pub pollution_delta_limit: f32,
}

impl Default for PetitionConfig {
    fn default() -> Self {
        Self {
            proposal_interval_ticks: 900,
            max_entries: 4,
            grant_trees: 3,
            grant_tree_health: 3,
            grant_food_ledger: 5,
            grant_food_items: 6,
            grant_pollution_relief: 3.0,
            grant_joy: 15.0,
            grant_blessing: 5.0,
            deny_penalty: 10.0,
            pollution_delta_limit: 2.0,
        }
    }
}

/// Host tool effects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// How far from the cursor a tool or harvest reaches.
    pub reach: f32,
    /// Happiness from play.
    pub play_happiness: f32,
    /// Hunger from hand-feeding.
    pub feed_hunger: f32,
    /// Time spent in the tool's state.
    pub state_duration: f32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            reach: 1.5,
            play_happiness: 20.0,
            feed_hunger: 25.0,
            state_duration: 60.0,
        }
    }
}

/// Which snapshot store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Dragonfly / Redis.
    #[default]
    Dragonfly,
    /// In-process only; nothing survives a restart.
    Memory,
}

/// Store and observer endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    /// Snapshot store.
    pub store: StoreKind,
    /// Dragonfly (Redis-compatible) URL.
    pub dragonfly_url: String,
    /// Observer bind port.
    pub observer_port: u16,
    /// Optional directory of prompt template overrides.
    pub templates_dir: Option<String>,
}

impl InfrastructureConfig {
    /// Override the store URL with `DRAGONFLY_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Dragonfly,
            dragonfly_url: "redis://localhost:6379".to_owned(),
            observer_port: 8080,
            templates_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ThrongConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world.founders, 3);
        assert_eq!(config.epoch.population_thresholds, [8, 15, 25]);
        assert_eq!(config.interaction.cooldown_capacity, 4096);
        assert_eq!(config.schedule.hour, 3);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = ThrongConfig::parse(include_str!("../../../throng-config.yaml"));
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        let defaults = ThrongConfig::default();
        assert_eq!(config.world, defaults.world);
        assert_eq!(config.vitals, defaults.vitals);
        assert_eq!(config.movement, defaults.movement);
        assert_eq!(config.reproduction, defaults.reproduction);
        assert_eq!(config.interaction, defaults.interaction);
        assert_eq!(config.behavior, defaults.behavior);
        assert_eq!(config.epoch, defaults.epoch);
        assert_eq!(config.schedule, defaults.schedule);
        assert_eq!(config.petition, defaults.petition);
        assert_eq!(config.tools, defaults.tools);
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r"
world:
  world_id: garden
  seed: 7
  founders: 5
vitals:
  hunger_decay: 0.1
schedule:
  hour: 4
  minute: 30
infrastructure:
  store: memory
  observer_port: 9090
";
        let config = ThrongConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.world.world_id, "garden");
        assert_eq!(config.world.founders, 5);
        assert!((config.vitals.hunger_decay - 0.1).abs() < f32::EPSILON);
        // Untouched fields keep defaults.
        assert!((config.vitals.clean_decay - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.schedule.minute, 30);
        assert_eq!(config.infrastructure.store, StoreKind::Memory);
        assert_eq!(config.infrastructure.observer_port, 9090);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(ThrongConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_impossible_clock_time() {
        assert!(ThrongConfig::parse("schedule:\n  hour: 25\n").is_err());
    }

    #[test]
    fn rejects_descending_thresholds() {
        let yaml = "epoch:\n  population_thresholds: [15, 8, 25]\n";
        assert!(ThrongConfig::parse(yaml).is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("throng-config.yaml");
        if path.exists() {
            let config = ThrongConfig::from_file(&path);
            assert!(config.is_ok(), "failed to load project config: {config:?}");
        }
    }
}
