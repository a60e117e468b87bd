//! `Dragonfly` (Redis-compatible) snapshot storage.
//!
//! Each world owns two string keys, both holding JSON:
//!
//! - `throng:world:{id}`: the full [`WorldSnapshot`]
//! - `throng:world:{id}:lineages`: the `Vec<LineageSummary>` aggregate
//!
//! [`WorldSnapshot`]: throng_types::WorldSnapshot

use fred::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Key holding the snapshot for `world_id`.
pub fn world_key(world_id: &str) -> String {
    format!("throng:world:{world_id}")
}

/// Key holding the lineage aggregate for `world_id`.
pub fn lineage_key(world_id: &str) -> String {
    format!("throng:world:{world_id}:lineages")
}

/// A connected `fred` client speaking JSON documents.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Open a connection to a `redis://host:port[/db]` URL.
    ///
    /// # Errors
    ///
    /// [`DbError::Config`] for a malformed URL, [`DbError::Dragonfly`] when
    /// the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("bad store URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Dragonfly snapshot store connected");
        Ok(Self { client })
    }

    /// Write `value` to `key` as a JSON string, replacing what was there.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        self.client.set::<(), _, _>(key, json, None, None, false).await?;
        Ok(())
    }

    /// Read and decode the JSON at `key`. A missing key is `Ok(None)`; a
    /// document of the wrong shape is [`DbError::Serialization`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let raw: Option<String> = self.client.get(key).await?;
        raw.map(|s| serde_json::from_str(&s)).transpose().map_err(DbError::from)
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        self.client.del::<u32, _>(key).await?;
        Ok(())
    }
}

impl std::fmt::Debug for DragonflyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyPool").finish_non_exhaustive()
    }
}
