//! Engine binary for the Throng simulation.
//!
//! Wires configuration, the oracle, the snapshot store and the host
//! boundary around one [`Simulation`] and runs the frame loop until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (`THRONG_CONFIG`, default `throng-config.yaml`)
//! 3. Build the oracle from the environment (offline without a key)
//! 4. Connect the snapshot store (in-memory if `Dragonfly` is unreachable)
//! 5. Load the saved world or generate a new one
//! 6. Start the observer
//! 7. Run frames; on shutdown drain oracle calls and save

mod error;
mod frames;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use throng_core::config::StoreKind;
use throng_core::{Simulation, ThrongConfig};
use throng_db::WorldStore;
use throng_observer::{AppState, ServerConfig};
use throng_oracle::llm::create_backend;
use throng_oracle::{Oracle, OracleConfig, PromptEngine};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file used when `THRONG_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "throng-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, prompt templates, or the observer
/// bind fail at startup.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    init_tracing();
    info!("throng-engine starting");

    let config = load_config(&config_path(|name| std::env::var(name).ok()))?;
    info!(
        world_id = config.world.world_id,
        seed = config.world.seed,
        frame_interval_ms = config.world.frame_interval_ms,
        store = ?config.infrastructure.store,
        "configuration loaded"
    );

    let oracle = build_oracle(&config)?;
    info!(
        backend = oracle.backend_name(),
        budget = %oracle.budget().limit,
        "oracle ready"
    );

    let store = connect_store(&config).await;
    let sim = match store.load(&config.world.world_id).await {
        Some(snapshot) => Simulation::restore(config.clone(), oracle, snapshot),
        None => Simulation::new(config.clone(), oracle),
    };

    let (state, commands) = AppState::new(sim.view());
    let state = Arc::new(state);
    let (stop_observer, observer_stopped) = oneshot::channel::<()>();
    let server_config = ServerConfig::on_port(config.infrastructure.observer_port);
    let observer_state = Arc::clone(&state);
    let observer = tokio::spawn(async move {
        throng_observer::start_server(&server_config, observer_state, async {
            let _ = observer_stopped.await;
        })
        .await
    });

    frames::run(sim, &store, state, commands, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable, stopping");
        }
    })
    .await;

    let _ = stop_observer.send(());
    match observer.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "observer task failed"),
    }
    info!("throng-engine shutdown complete");
    Ok(())
}

/// Logging to stdout. `RUST_LOG` filters (default `info`);
/// `THRONG_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("THRONG_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("THRONG_CONFIG")
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// A missing file means defaults; an unreadable or invalid one is fatal.
fn load_config(path: &Path) -> Result<ThrongConfig, EngineError> {
    if path.exists() {
        Ok(ThrongConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Ok(ThrongConfig::parse("")?)
    }
}

fn build_oracle(config: &ThrongConfig) -> Result<Oracle, EngineError> {
    let oracle_config = OracleConfig::from_env()?;
    let mut prompts = PromptEngine::builtin()?;
    if let Some(dir) = &config.infrastructure.templates_dir {
        prompts = prompts.with_overrides(Path::new(dir))?;
        info!(dir, "prompt template overrides loaded");
    }
    Ok(Oracle::with_backend(
        oracle_config.backend.as_ref().map(create_backend),
        &oracle_config,
        prompts,
    )?)
}

async fn connect_store(config: &ThrongConfig) -> WorldStore {
    match config.infrastructure.store {
        StoreKind::Memory => WorldStore::memory(),
        StoreKind::Dragonfly => {
            match WorldStore::dragonfly(&config.infrastructure.dragonfly_url).await {
                Ok(store) => store,
                Err(e) => {
                    warn!(error = %e, "Dragonfly unavailable, worlds will not survive a restart");
                    WorldStore::memory()
                }
            }
        }
    }
}
