//! Interpreter for evolved behaviors.
//!
//! A [`RuleSet`] is validated once when it is installed and evaluated every
//! tick after the built-in update. Validation bounds every parameter, so an
//! installed behavior can only nudge a creature by small amounts per unit
//! `dt`. Runtime faults uninstall the behavior for good.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use throng_types::{Condition, Creature, Effect, Epoch, Rule, RuleSet, Target, VITAL_MAX};

use crate::config::BehaviorConfig;

/// A rule set that cannot be installed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BehaviorError {
    /// No rules at all.
    #[error("rule set is empty")]
    Empty,

    /// More rules than the grammar allows.
    #[error("{count} rules exceeds the limit of {max}")]
    TooManyRules {
        /// Rules supplied.
        count: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// A parameter is outside its bound or not finite.
    #[error("rule {index}: {detail}")]
    OutOfBounds {
        /// Position of the offending rule.
        index: usize,
        /// What was wrong.
        detail: String,
    },
}

/// A failure while evaluating an installed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BehaviorFault {
    /// Steering toward or away from a target at zero distance.
    #[error("degenerate steering direction toward {0:?}")]
    DegenerateDirection(Target),

    /// A vital or velocity left the finite numbers.
    #[error("non-finite result")]
    NonFinite,
}

/// What a creature can perceive this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Senses {
    /// Nearest living kin, if any.
    pub nearest_kin: Option<(f32, f32)>,
    /// Nearest ground food, if any.
    pub nearest_food: Option<(f32, f32)>,
    /// Middle of the world.
    pub center: (f32, f32),
    /// Kin within the sensing radius.
    pub kin_nearby: bool,
    /// Food within the sensing radius.
    pub food_nearby: bool,
    /// World pollution.
    pub pollution: f32,
    /// Current epoch.
    pub epoch: Epoch,
}

impl Senses {
    fn locate(&self, target: Target) -> Option<(f32, f32)> {
        match target {
            Target::Kin => self.nearest_kin,
            Target::Food => self.nearest_food,
            Target::Center => Some(self.center),
        }
    }
}

/// Check a rule set against the grammar bounds.
pub fn validate(rules: &RuleSet, limits: &BehaviorConfig) -> Result<(), BehaviorError> {
    if rules.rules.is_empty() {
        return Err(BehaviorError::Empty);
    }
    if rules.rules.len() > limits.max_rules {
        return Err(BehaviorError::TooManyRules {
            count: rules.rules.len(),
            max: limits.max_rules,
        });
    }
    for (index, rule) in rules.rules.iter().enumerate() {
        check_condition(rule.when).map_err(|detail| BehaviorError::OutOfBounds { index, detail })?;
        check_effect(rule.then, limits)
            .map_err(|detail| BehaviorError::OutOfBounds { index, detail })?;
    }
    Ok(())
}

fn check_condition(condition: Condition) -> Result<(), String> {
    let threshold = match condition {
        Condition::HungerBelow(v)
        | Condition::HungerAbove(v)
        | Condition::CleanBelow(v)
        | Condition::CleanAbove(v)
        | Condition::HappinessBelow(v)
        | Condition::HappinessAbove(v) => v,
        Condition::PollutionAbove(v) => v * (VITAL_MAX / 10.0),
        Condition::EpochAtLeast(ordinal) => {
            return if Epoch::from_ordinal(ordinal).is_some() {
                Ok(())
            } else {
                Err(format!("unknown epoch ordinal {ordinal}"))
            };
        }
        Condition::Always | Condition::AgeAbove(_) | Condition::KinNearby | Condition::FoodNearby => {
            return Ok(());
        }
    };
    if threshold.is_finite() && (0.0..=VITAL_MAX).contains(&threshold) {
        Ok(())
    } else {
        Err(format!("threshold in {condition:?} is out of range"))
    }
}

fn check_effect(effect: Effect, limits: &BehaviorConfig) -> Result<(), String> {
    let within = |value: f32, bound: f32| value.is_finite() && value.abs() <= bound;
    let ok = match effect {
        Effect::AdjustHunger(rate) | Effect::AdjustClean(rate) | Effect::AdjustHappiness(rate) => {
            within(rate, limits.max_rate)
        }
        Effect::Nudge { dx, dy } => within(dx, limits.max_nudge) && within(dy, limits.max_nudge),
        Effect::Approach { strength, .. } | Effect::Avoid { strength, .. } => {
            within(strength, limits.max_strength) && strength >= 0.0
        }
        Effect::Halt => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{effect:?} exceeds its bound"))
    }
}

/// Apply every rule whose condition holds, in order.
///
/// Only mutates `creature` through the rule effects; the caller re-clamps
/// vitals and velocity afterwards. On a fault the creature may have been
/// partly updated and the caller should uninstall the behavior.
pub fn evaluate(
    rules: &RuleSet,
    creature: &mut Creature,
    senses: &Senses,
    dt: f32,
) -> Result<(), BehaviorFault> {
    for rule in &rules.rules {
        if holds(rule.when, creature, senses) {
            apply(rule.then, creature, senses, dt)?;
        }
    }
    let values = [
        creature.hunger,
        creature.clean,
        creature.happiness,
        creature.vx,
        creature.vy,
    ];
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(BehaviorFault::NonFinite)
    }
}

fn holds(condition: Condition, creature: &Creature, senses: &Senses) -> bool {
    match condition {
        Condition::Always => true,
        Condition::HungerBelow(v) => creature.hunger < v,
        Condition::HungerAbove(v) => creature.hunger > v,
        Condition::CleanBelow(v) => creature.clean < v,
        Condition::CleanAbove(v) => creature.clean > v,
        Condition::HappinessBelow(v) => creature.happiness < v,
        Condition::HappinessAbove(v) => creature.happiness > v,
        Condition::AgeAbove(ticks) => creature.age > ticks,
        Condition::PollutionAbove(v) => senses.pollution > v,
        Condition::EpochAtLeast(ordinal) => senses.epoch.ordinal() >= ordinal,
        Condition::KinNearby => senses.kin_nearby,
        Condition::FoodNearby => senses.food_nearby,
    }
}

fn apply(
    effect: Effect,
    creature: &mut Creature,
    senses: &Senses,
    dt: f32,
) -> Result<(), BehaviorFault> {
    match effect {
        Effect::AdjustHunger(rate) => creature.hunger += rate * dt,
        Effect::AdjustClean(rate) => creature.clean += rate * dt,
        Effect::AdjustHappiness(rate) => creature.happiness += rate * dt,
        Effect::Nudge { dx, dy } => {
            creature.vx += dx * dt;
            creature.vy += dy * dt;
        }
        Effect::Approach { target, strength } => steer(creature, senses, target, strength * dt)?,
        Effect::Avoid { target, strength } => steer(creature, senses, target, -strength * dt)?,
        Effect::Halt => {
            creature.vx = 0.0;
            creature.vy = 0.0;
        }
    }
    Ok(())
}

fn steer(
    creature: &mut Creature,
    senses: &Senses,
    target: Target,
    acceleration: f32,
) -> Result<(), BehaviorFault> {
    // Nothing to steer relative to is not a fault.
    let Some((tx, ty)) = senses.locate(target) else {
        return Ok(());
    };
    let (dx, dy) = (tx - creature.x, ty - creature.y);
    let length = dx.hypot(dy);
    if !length.is_finite() {
        return Err(BehaviorFault::NonFinite);
    }
    if length <= f32::EPSILON {
        return Err(BehaviorFault::DegenerateDirection(target));
    }
    creature.vx += dx / length * acceleration;
    creature.vy += dy / length * acceleration;
    Ok(())
}

/// Derive a child rule set from `parent` without the oracle.
///
/// Deterministic in `seed`: the same parent and seed always produce the
/// same child. One rule parameter is perturbed, and occasionally a rule is
/// dropped or added. The result always passes [`validate`].
pub fn mutate(parent: &RuleSet, seed: u64, limits: &BehaviorConfig) -> RuleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rules: Vec<Rule> = parent
        .rules
        .iter()
        .take(limits.max_rules)
        .map(|r| clamp_rule(*r, limits))
        .collect();

    let roll: f32 = rng.random();
    if roll < 0.15 && rules.len() > 1 {
        let index = rng.random_range(0..rules.len());
        rules.remove(index);
    } else if (roll < 0.3 || rules.is_empty()) && rules.len() < limits.max_rules {
        rules.push(random_rule(&mut rng, limits));
    } else if !rules.is_empty() {
        let index = rng.random_range(0..rules.len());
        if let Some(rule) = rules.get_mut(index) {
            *rule = clamp_rule(perturb(*rule, &mut rng), limits);
        }
    }

    RuleSet {
        description: drifted(&parent.description),
        rules,
        seed: rng.random(),
    }
}

fn drifted(description: &str) -> String {
    let base = description.trim().trim_end_matches(", drifted").trim();
    if base.is_empty() {
        "drifted habits".to_owned()
    } else {
        format!("{base}, drifted")
    }
}

fn perturb(rule: Rule, rng: &mut StdRng) -> Rule {
    let scale = rng.random_range(0.7_f32..1.3);
    let then = match rule.then {
        Effect::AdjustHunger(rate) => Effect::AdjustHunger(rate * scale),
        Effect::AdjustClean(rate) => Effect::AdjustClean(rate * scale),
        Effect::AdjustHappiness(rate) => Effect::AdjustHappiness(rate * scale),
        Effect::Nudge { dx, dy } => Effect::Nudge {
            dx: dx * scale,
            dy: dy * scale,
        },
        Effect::Approach { target, strength } => Effect::Approach {
            target,
            strength: strength * scale,
        },
        Effect::Avoid { target, strength } => Effect::Avoid {
            target,
            strength: strength * scale,
        },
        Effect::Halt => Effect::Halt,
    };
    let when = match rule.when {
        Condition::HungerBelow(v) => Condition::HungerBelow(v * scale),
        Condition::HungerAbove(v) => Condition::HungerAbove(v * scale),
        Condition::HappinessBelow(v) => Condition::HappinessBelow(v * scale),
        Condition::HappinessAbove(v) => Condition::HappinessAbove(v * scale),
        other => other,
    };
    Rule { when, then }
}

fn clamp_rule(rule: Rule, limits: &BehaviorConfig) -> Rule {
    let bound = |v: f32, b: f32| if v.is_finite() { v.clamp(-b, b) } else { 0.0 };
    let vital = |v: f32| if v.is_finite() { v.clamp(0.0, VITAL_MAX) } else { 0.0 };
    let when = match rule.when {
        Condition::HungerBelow(v) => Condition::HungerBelow(vital(v)),
        Condition::HungerAbove(v) => Condition::HungerAbove(vital(v)),
        Condition::CleanBelow(v) => Condition::CleanBelow(vital(v)),
        Condition::CleanAbove(v) => Condition::CleanAbove(vital(v)),
        Condition::HappinessBelow(v) => Condition::HappinessBelow(vital(v)),
        Condition::HappinessAbove(v) => Condition::HappinessAbove(vital(v)),
        Condition::PollutionAbove(v) => {
            Condition::PollutionAbove(if v.is_finite() { v.clamp(0.0, 10.0) } else { 0.0 })
        }
        Condition::EpochAtLeast(ordinal) => Condition::EpochAtLeast(ordinal.min(4)),
        other => other,
    };
    let then = match rule.then {
        Effect::AdjustHunger(r) => Effect::AdjustHunger(bound(r, limits.max_rate)),
        Effect::AdjustClean(r) => Effect::AdjustClean(bound(r, limits.max_rate)),
        Effect::AdjustHappiness(r) => Effect::AdjustHappiness(bound(r, limits.max_rate)),
        Effect::Nudge { dx, dy } => Effect::Nudge {
            dx: bound(dx, limits.max_nudge),
            dy: bound(dy, limits.max_nudge),
        },
        Effect::Approach { target, strength } => Effect::Approach {
            target,
            strength: bound(strength, limits.max_strength).abs(),
        },
        Effect::Avoid { target, strength } => Effect::Avoid {
            target,
            strength: bound(strength, limits.max_strength).abs(),
        },
        Effect::Halt => Effect::Halt,
    };
    Rule { when, then }
}

fn random_rule(rng: &mut StdRng, limits: &BehaviorConfig) -> Rule {
    let conditions = [
        Condition::Always,
        Condition::HungerBelow(rng.random_range(20.0..60.0)),
        Condition::HappinessBelow(rng.random_range(20.0..60.0)),
        Condition::KinNearby,
        Condition::FoodNearby,
    ];
    let targets = [Target::Kin, Target::Food, Target::Center];
    let target = targets.choose(rng).copied().unwrap_or(Target::Food);
    let strength = rng.random_range(0.0..=limits.max_strength);
    let effects = [
        Effect::Approach { target, strength },
        Effect::Avoid { target, strength },
        Effect::AdjustHappiness(rng.random_range(-limits.max_rate..=limits.max_rate) / 10.0),
        Effect::Nudge {
            dx: rng.random_range(-limits.max_nudge..=limits.max_nudge),
            dy: rng.random_range(-limits.max_nudge..=limits.max_nudge),
        },
    ];
    Rule {
        when: conditions.choose(rng).copied().unwrap_or(Condition::Always),
        then: effects.choose(rng).copied().unwrap_or(Effect::Halt),
    }
}
