//! The frame loop: commands in, one step, view out, periodic saves.

use std::sync::Arc;
use std::time::Duration;

use throng_core::{Command, Simulation};
use throng_db::WorldStore;
use throng_observer::AppState;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// How long shutdown waits for in-flight oracle calls.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Convert wall-clock time since the last frame into simulation `dt`.
pub fn frame_dt(elapsed: Duration, frame_unit_ms: f32) -> f32 {
    let elapsed_ms = elapsed.as_secs_f32() * 1000.0;
    elapsed_ms / frame_unit_ms.max(f32::EPSILON)
}

/// Drive the simulation until `shutdown` resolves, then drain pending
/// oracle calls and save once more.
pub async fn run<F>(
    mut sim: Simulation,
    store: &WorldStore,
    state: Arc<AppState>,
    mut commands: mpsc::Receiver<Command>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let world = sim.config().world.clone();
    let mut frames = interval(Duration::from_millis(world.frame_interval_ms.max(1)));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut saves = interval(Duration::from_secs(world.snapshot_interval_secs.max(1)));
    saves.set_missed_tick_behavior(MissedTickBehavior::Delay);
    saves.reset();

    let mut last_frame = Instant::now();
    tokio::pin!(shutdown);
    info!(
        frame_interval_ms = world.frame_interval_ms,
        snapshot_interval_secs = world.snapshot_interval_secs,
        "frame loop started"
    );

    loop {
        tokio::select! {
            _ = frames.tick() => {
                while let Ok(command) = commands.try_recv() {
                    if let Err(e) = sim.apply_command(command) {
                        debug!(?command, error = %e, "command had no effect");
                    }
                }
                let now = Instant::now();
                let dt = frame_dt(now.duration_since(last_frame), world.frame_unit_ms);
                last_frame = now;
                sim.step(dt);
                state.publish(sim.view()).await;
            }
            _ = saves.tick() => save(store, &sim).await,
            () = &mut shutdown => break,
        }
    }

    info!(pending = sim.pending(), "shutting down, draining oracle calls");
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, sim.drain_pending()).await;
    match drained {
        Ok(applied) => debug!(applied, "oracle calls drained"),
        Err(_) => warn!(pending = sim.pending(), "drain timed out, remaining calls dropped"),
    }
    save(store, &sim).await;
    state.publish(sim.view()).await;
}

async fn save(store: &WorldStore, sim: &Simulation) {
    if let Err(e) = store.save(&sim.snapshot()).await {
        warn!(error = %e, store = store.kind(), "snapshot not saved");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use throng_core::ThrongConfig;
    use throng_oracle::Oracle;

    use super::*;

    #[test]
    fn dt_is_measured_in_frame_units() {
        let dt = frame_dt(Duration::from_millis(33), 16.5);
        assert!((dt - 2.0).abs() < 1e-4);
        assert!(frame_dt(Duration::from_millis(10), 0.0).is_finite());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_applies_commands_and_saves_on_shutdown() {
        let mut config = ThrongConfig::default();
        config.schedule.enabled = false;
        let world_id = config.world.world_id.clone();
        let sim = Simulation::new(config, Oracle::offline().expect("builtin templates"));
        let store = WorldStore::memory();
        let (state, rx) = AppState::new(sim.view());
        let state = Arc::new(state);

        state
            .commands
            .try_send(Command::SpawnFood { x: 2.0, y: 2.0 })
            .expect("queue has room");
        run(
            sim,
            &store,
            Arc::clone(&state),
            rx,
            tokio::time::sleep(Duration::from_millis(500)),
        )
        .await;

        let saved = store.load(&world_id).await.expect("saved on shutdown");
        assert!(saved.tick > 0);
        assert_eq!(state.view.read().await.tick, saved.tick);
    }
}
