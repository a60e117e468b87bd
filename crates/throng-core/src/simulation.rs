//! The simulation driver: owns the world, steps it, and routes every
//! oracle call off the frame loop.
//!
//! Oracle calls are prepared synchronously (cooldown stamped, budget
//! reserved), then spawned onto the tokio runtime. Each task sends its
//! [`Completion`] back over an unbounded channel, and the next frame
//! applies it before stepping. Completions carry generational keys, so a
//! creature removed in the meantime simply no longer resolves.

use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::de::DeserializeOwned;
use throng_oracle::{
    CallKind, InteractionOutcome, Oracle, OracleError, PetitionList, PreparedCall, WorldPlan,
};
use throng_types::{Epoch, RuleSet, WorldSnapshot, WorldView};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::commands::{self, Command, CommandError};
use crate::config::ThrongConfig;
use crate::epoch;
use crate::evolution::{self, EvolutionRequest};
use crate::holistic::{self, DailySchedule};
use crate::interaction::{self, Meeting};
use crate::petition::{self, PetitionPool};
use crate::tick::{self, TickReport};
use crate::world::World;

/// Highest epoch ordinal a plan may force.
const MAX_EPOCH_ORDINAL: u8 = Epoch::Collapse.ordinal();

/// The answer to one spawned oracle call.
#[derive(Debug)]
enum Completion {
    /// A proximity interaction.
    Interaction {
        /// Who met.
        meeting: Meeting,
        /// Parsed outcome or why there is none.
        result: Result<InteractionOutcome, OracleError>,
    },
    /// A behavior for one creature.
    Evolution {
        /// The request as captured at dispatch.
        request: Box<EvolutionRequest>,
        /// Parsed rule set or why there is none.
        result: Result<RuleSet, OracleError>,
    },
    /// The daily holistic plan.
    Holistic(Result<WorldPlan, OracleError>),
    /// A synthesized petition list.
    Petition {
        /// The pool as captured at dispatch.
        pool: PetitionPool,
        /// Parsed list or why there is none.
        result: Result<PetitionList, OracleError>,
    },
}

/// A running world and everything needed to advance it.
pub struct Simulation {
    world: World,
    config: ThrongConfig,
    oracle: Oracle,
    schedule: DailySchedule,
    rng: StdRng,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    tasks: JoinSet<()>,
}

impl Simulation {
    /// A freshly generated world.
    pub fn new(config: ThrongConfig, oracle: Oracle) -> Self {
        let mut rng = StdRng::seed_from_u64(config.world.seed);
        let world = World::generate(&config, &mut rng);
        info!(
            world_id = %world.world_id,
            founders = world.living_count(),
            trees = world.trees.len(),
            "generated new world"
        );
        Self::assemble(world, config, oracle, rng)
    }

    /// Resume a persisted world.
    pub fn restore(config: ThrongConfig, oracle: Oracle, snapshot: WorldSnapshot) -> Self {
        let rng = StdRng::seed_from_u64(config.world.seed ^ snapshot.tick);
        let world = World::restore(snapshot, &config);
        info!(
            world_id = %world.world_id,
            tick = world.tick,
            population = world.living_count(),
            epoch = %world.epoch,
            "restored world"
        );
        Self::assemble(world, config, oracle, rng)
    }

    /// Run an explicitly built world.
    pub fn with_world(world: World, config: ThrongConfig, oracle: Oracle) -> Self {
        let rng = StdRng::seed_from_u64(config.world.seed);
        Self::assemble(world, config, oracle, rng)
    }

    fn assemble(world: World, config: ThrongConfig, oracle: Oracle, rng: StdRng) -> Self {
        let (completions_tx, completions_rx) = unbounded_channel();
        Self {
            schedule: DailySchedule::from_config(&config.schedule),
            world,
            config,
            oracle,
            rng,
            completions_tx,
            completions_rx,
            tasks: JoinSet::new(),
        }
    }

    /// The world state.
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The world state, mutably.
    pub const fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Active configuration.
    pub const fn config(&self) -> &ThrongConfig {
        &self.config
    }

    /// The oracle handle.
    pub const fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Oracle calls still in flight.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Persistable snapshot of the world.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.snapshot()
    }

    /// The renderer's view.
    pub fn view(&self) -> WorldView {
        self.world.view()
    }

    /// Advance one frame against the local wall clock.
    pub fn step(&mut self, dt: f32) -> TickReport {
        self.step_at(dt, Local::now().naive_local())
    }

    /// Advance one frame with an explicit local time for the schedule.
    pub fn step_at(&mut self, dt: f32, now: NaiveDateTime) -> TickReport {
        self.apply_completions();
        self.reap_tasks();

        let report = tick::advance(&mut self.world, &self.config, &mut self.rng, dt);

        for &(parent, child) in &report.births {
            if let Some(request) =
                evolution::for_birth(&self.world, parent, child, self.config.behavior.max_rules)
            {
                self.request_evolution(request);
            }
        }

        for meeting in interaction::gate(&mut self.world, &self.config.interaction) {
            self.arbitrate(meeting);
        }

        let tick = self.world.tick;
        if every(tick, self.config.petition.proposal_interval_ticks)
            && let Some(key) = petition::propose(&mut self.world, &mut self.rng)
        {
            debug!(tick, ?key, "desire voiced");
        }
        if every(tick, self.config.epoch.check_interval_ticks) {
            epoch::check(&mut self.world, &self.config.epoch);
        }

        if self.schedule.is_due(now, self.world.last_evaluation_date) {
            self.world.last_evaluation_date = Some(now.date());
            info!(tick, "scheduled evaluation");
            self.evaluate_now();
        }
        report
    }

    /// Request the holistic plan and petition synthesis immediately.
    pub fn evaluate_now(&mut self) {
        let context = holistic::context(&self.world, self.config.schedule.sample_size, &mut self.rng);
        match self.oracle.prepare(CallKind::Holistic, &context) {
            Some(call) => self.spawn_call(call, Completion::Holistic),
            None => debug!("holistic evaluation skipped, oracle unavailable"),
        }
        self.synthesize_petitions();
    }

    /// Apply a host command.
    pub fn apply_command(&mut self, command: Command) -> Result<(), CommandError> {
        commands::apply(&mut self.world, command, &self.config, &mut self.rng)
    }

    /// Wait for every outstanding oracle call and apply the results,
    /// including calls those results spawn. Returns completions applied.
    pub async fn drain_pending(&mut self) -> usize {
        let mut applied = 0_usize;
        loop {
            while let Some(joined) = self.tasks.join_next().await {
                log_join(joined);
            }
            let n = self.apply_completions();
            applied = applied.saturating_add(n);
            if n == 0 && self.tasks.is_empty() {
                return applied;
            }
        }
    }

    fn reap_tasks(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            log_join(joined);
        }
    }

    fn spawn_call<T, F>(&mut self, call: PreparedCall, wrap: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, OracleError>) -> Completion + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.tasks.spawn(async move {
            let result = call.run_json::<T>().await;
            if tx.send(wrap(result)).is_err() {
                debug!("simulation gone, completion dropped");
            }
        });
    }

    fn arbitrate(&mut self, meeting: Meeting) {
        let Some(context) = interaction::context(&self.world, meeting) else {
            return;
        };
        match self.oracle.prepare(CallKind::Interaction, &context) {
            Some(call) => self.spawn_call(call, move |result| Completion::Interaction { meeting, result }),
            None => interaction::fallback(&mut self.world, meeting, &self.config.interaction),
        }
    }

    fn request_evolution(&mut self, request: EvolutionRequest) {
        if let Some(call) = self.oracle.prepare(CallKind::Evolution, &request.context) {
            self.spawn_call(call, move |result| Completion::Evolution {
                request: Box::new(request),
                result,
            });
            return;
        }
        let seed = self.rng.random();
        if let Err(e) = evolution::fallback(&mut self.world, &request, seed, &self.config.behavior) {
            debug!(error = %e, "local evolution not installed");
        }
    }

    fn synthesize_petitions(&mut self) {
        let Some(pool) = PetitionPool::gather(&self.world) else {
            return;
        };
        let max_entries = self.config.petition.max_entries;
        let context = pool.context(&self.world, max_entries);
        match self.oracle.prepare(CallKind::Petition, &context) {
            Some(call) => self.spawn_call(call, move |result| Completion::Petition { pool, result }),
            None => {
                let drafts = petition::fallback_rank(&pool, max_entries);
                petition::apply_synthesis(&mut self.world, &pool, drafts, max_entries);
            }
        }
    }

    /// Apply every completion waiting on the channel.
    fn apply_completions(&mut self) -> usize {
        let mut applied = 0_usize;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion);
            applied = applied.saturating_add(1);
        }
        applied
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Interaction { meeting, result } => {
                let outcome = match result.and_then(|o| o.validate().map(|()| o)) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        debug!(error = %e, "interaction call dropped");
                        return;
                    }
                };
                let (actor, other) = match meeting {
                    Meeting::Creatures { actor, other } => (actor, Some(other)),
                    Meeting::Bone { creature, .. } => (creature, None),
                };
                if !interaction::apply_outcome(
                    &mut self.world,
                    actor,
                    other,
                    &outcome,
                    &self.config.interaction,
                    self.config.movement.max_speed,
                ) {
                    debug!("interaction outcome discarded, actor is gone");
                }
            }
            Completion::Evolution { request, result } => {
                let installed = result.map_err(|e| e.to_string()).and_then(|rules| {
                    evolution::install(
                        &mut self.world,
                        request.subject,
                        rules,
                        request.generation,
                        &self.config.behavior,
                    )
                    .map_err(|e| e.to_string())
                });
                if let Err(reason) = installed {
                    debug!(reason = %reason, "evolution call dropped");
                }
            }
            Completion::Holistic(result) => {
                let plan = match result.and_then(|p| {
                    p.validate(MAX_EPOCH_ORDINAL, self.config.schedule.sample_size)
                }) {
                    Ok(plan) => plan,
                    Err(e) => {
                        warn!(error = %e, "holistic plan rejected");
                        return;
                    }
                };
                let retargets = holistic::apply_plan(&mut self.world, plan, &self.config.petition);
                info!(retargets = retargets.len(), "holistic plan applied");
                for (key, hint) in retargets {
                    if let Some(request) =
                        evolution::for_retarget(&self.world, key, hint, self.config.behavior.max_rules)
                    {
                        self.request_evolution(request);
                    }
                }
            }
            Completion::Petition { pool, result } => {
                let list = match result.and_then(|l| l.validate().map(|()| l)) {
                    Ok(list) => list,
                    Err(e) => {
                        debug!(error = %e, "petition synthesis dropped, proposals kept");
                        return;
                    }
                };
                let max_entries = self.config.petition.max_entries;
                let drafts = list.petitions.into_iter().take(max_entries).collect();
                petition::apply_synthesis(&mut self.world, &pool, drafts, max_entries);
            }
        }
    }
}

/// True on every `interval`th tick. A zero interval never fires.
fn every(tick: u64, interval: u64) -> bool {
    tick.checked_rem(interval) == Some(0)
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "oracle task failed");
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("world_id", &self.world.world_id)
            .field("tick", &self.world.tick)
            .field("oracle", &self.oracle.backend_name())
            .field("pending", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn offline(config: ThrongConfig) -> Simulation {
        Simulation::new(config, Oracle::offline().expect("builtin templates"))
    }

    fn at(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M").unwrap_or_default()
    }

    #[test]
    fn same_seed_same_world() {
        let a = offline(ThrongConfig::default());
        let b = offline(ThrongConfig::default());
        let lineages = |s: &Simulation| {
            let mut l: Vec<String> = s.world().creatures.values().map(|c| c.lineage.clone()).collect();
            l.sort();
            l
        };
        assert_eq!(lineages(&a), lineages(&b));
    }

    #[test]
    fn zero_interval_never_fires() {
        assert!(!every(0, 0));
        assert!(every(900, 900));
        assert!(!every(901, 900));
    }

    #[test]
    fn evaluation_runs_once_per_day() {
        let mut sim = offline(ThrongConfig::default());
        sim.step_at(1.0, at("2026-05-01 02:00"));
        assert_eq!(sim.world().last_evaluation_date, None);
        sim.step_at(1.0, at("2026-05-01 03:10"));
        let fired = sim.world().last_evaluation_date;
        assert!(fired.is_some());
        sim.step_at(1.0, at("2026-05-01 09:00"));
        assert_eq!(sim.world().last_evaluation_date, fired);
    }

    #[test]
    fn offline_synthesis_ranks_locally() {
        let mut sim = offline(ThrongConfig::default());
        for key in sim.world().living_keys() {
            if let Some(creature) = sim.world_mut().living_mut(key) {
                creature.propose("more trees");
            }
        }
        sim.evaluate_now();
        let petitions = &sim.world().petitions;
        assert_eq!(petitions.len(), 1);
        assert_eq!(petitions.first().map(|p| p.urgency), Some(3));
        assert!(sim.world().creatures.values().all(|c| c.proposals.is_empty()));
    }

    #[test]
    fn commands_reach_the_world() {
        let mut sim = offline(ThrongConfig::default());
        assert!(sim.apply_command(Command::SpawnFood { x: 1.0, y: 1.0 }).is_ok());
        assert_eq!(sim.world().food.len(), 1);
    }
}
