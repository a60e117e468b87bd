//! The `save` / `load` boundary used by the engine at session edges.
//!
//! [`WorldStore`] writes the full snapshot and its lineage aggregate, and
//! reads the snapshot back. Reads never fail: a missing key, an unreachable
//! store or a document that no longer parses all load as `None`, and the
//! caller starts a fresh world.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use throng_types::{LineageSummary, WorldSnapshot};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::dragonfly::{DragonflyPool, lineage_key, world_key};
use crate::error::DbError;
use crate::lineage::summarize;

/// In-process store holding JSON documents. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        self.documents.write().await.insert(key.to_owned(), json);
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let documents = self.documents.read().await;
        documents
            .get(key)
            .map(|s| serde_json::from_str(s))
            .transpose()
            .map_err(DbError::from)
    }

    /// Overwrite a raw document. Lets tests plant unreadable data.
    pub async fn put_raw(&self, key: &str, raw: impl Into<String>) {
        self.documents.write().await.insert(key.to_owned(), raw.into());
    }
}

/// Where snapshots live.
#[derive(Debug, Clone)]
pub enum WorldStore {
    /// `Dragonfly` / Redis.
    Dragonfly(DragonflyPool),
    /// In-process only.
    Memory(MemoryStore),
}

impl WorldStore {
    /// Connect to `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the URL is invalid or the connection fails.
    pub async fn dragonfly(url: &str) -> Result<Self, DbError> {
        Ok(Self::Dragonfly(DragonflyPool::connect(url).await?))
    }

    /// A fresh in-memory store.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    /// Short name for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(pool) => pool.set_json(key, value).await,
            Self::Memory(store) => store.set_json(key, value).await,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.get_json(key).await,
            Self::Memory(store) => store.get_json(key).await,
        }
    }

    /// Write the snapshot and its lineage aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or either write fails.
    pub async fn save(&self, snapshot: &WorldSnapshot) -> Result<(), DbError> {
        let lineages = summarize(snapshot);
        self.set_json(&world_key(&snapshot.world_id), snapshot).await?;
        self.set_json(&lineage_key(&snapshot.world_id), &lineages).await?;
        info!(
            world_id = %snapshot.world_id,
            tick = snapshot.tick,
            creatures = snapshot.creatures.len(),
            lineages = lineages.len(),
            store = self.kind(),
            "world saved"
        );
        Ok(())
    }

    /// Read the snapshot for `world_id`. Any failure reads as `None`.
    pub async fn load(&self, world_id: &str) -> Option<WorldSnapshot> {
        match self.get_json(&world_key(world_id)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(world_id, error = %e, "snapshot unreadable, starting fresh");
                None
            }
        }
    }

    /// Read the lineage aggregate for `world_id`. Any failure reads as empty.
    pub async fn load_lineages(&self, world_id: &str) -> Vec<LineageSummary> {
        match self.get_json(&lineage_key(world_id)).await {
            Ok(lineages) => lineages.unwrap_or_default(),
            Err(e) => {
                warn!(world_id, error = %e, "lineage aggregate unreadable");
                Vec::new()
            }
        }
    }
}
