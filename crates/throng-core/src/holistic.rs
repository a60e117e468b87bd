//! Scheduled holistic evaluation of the whole world.
//!
//! Once per local calendar day the oracle is shown a sample of the throng
//! and may answer with a [`ValidatedPlan`]. The plan has already passed
//! validation by the time [`apply_plan`] sees it, so it applies in full.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use rand::seq::IndexedRandom;
use throng_oracle::context::{epoch_label, relationship_label};
use throng_oracle::{CreatureBrief, HolisticContext, ValidatedPlan};
use throng_types::{CreatureKey, Epoch};
use tracing::{debug, info};

use crate::config::{PetitionConfig, ScheduleConfig};
use crate::epoch;
use crate::world::World;

/// When the daily evaluation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    enabled: bool,
    at: NaiveTime,
}

impl DailySchedule {
    /// Build from configuration. An impossible clock time disables it.
    pub fn from_config(config: &ScheduleConfig) -> Self {
        match NaiveTime::from_hms_opt(config.hour, config.minute, 0) {
            Some(at) => Self {
                enabled: config.enabled,
                at,
            },
            None => Self {
                enabled: false,
                at: NaiveTime::default(),
            },
        }
    }

    /// True on the first check at or after the configured time on a day
    /// the evaluation has not yet run.
    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<NaiveDate>) -> bool {
        self.enabled && now.time() >= self.at && last_run != Some(now.date())
    }
}

/// Sample the world for the oracle.
pub fn context<R: Rng + ?Sized>(world: &World, sample_size: usize, rng: &mut R) -> HolisticContext {
    let living: Vec<_> = world.creatures.values().filter(|c| c.alive).collect();
    let sample = living
        .choose_multiple(rng, sample_size)
        .map(|c| CreatureBrief::from(*c))
        .collect();
    HolisticContext {
        tick: world.tick,
        epoch: epoch_label(world.epoch),
        epoch_ordinal: world.epoch.ordinal(),
        population: living.len(),
        pollution: whole(world.pollution),
        chronicle: world.chronicle.clone(),
        principles: world.observed_principles.clone(),
        ancestral_memory: world.ancestral_memory.clone(),
        sample,
        relationship: relationship_label(world.relationship()),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(pollution: f32) -> u32 {
    pollution.clamp(0.0, 10.0).round() as u32
}

/// Apply a validated plan. Returns the living creatures to retarget,
/// with their hints, for the evolution path.
pub fn apply_plan(
    world: &mut World,
    plan: ValidatedPlan,
    config: &PetitionConfig,
) -> Vec<(CreatureKey, String)> {
    if let Some(delta) = plan.pollution_delta {
        let limit = config.pollution_delta_limit;
        world.adjust_pollution(delta.clamp(-limit, limit));
    }
    if let Some(principle) = plan.principle {
        info!(principle = %principle, "principle observed");
        world.add_principle(principle);
    }
    if let Some(event) = plan.event {
        world.push_chronicle(event);
    }
    if let Some(to) = plan.epoch.and_then(Epoch::from_ordinal) {
        epoch::enter(world, to);
    }

    plan.retarget
        .into_iter()
        .filter_map(|(id, hint)| {
            let key = world.find_creature(id).filter(|k| world.living(*k).is_some());
            if key.is_none() {
                debug!(creature_id = %id, "retarget names a creature no longer alive");
            }
            key.map(|k| (k, hint))
        })
        .collect()
}
