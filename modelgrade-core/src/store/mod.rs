//! SQLite-backed artifact and lineage store.
//!
//! A single connection sits behind a mutex; every operation runs on the
//! blocking pool through [`ArtifactStore::with_conn`].

pub mod artifacts;
pub mod lineage;

pub use artifacts::{Artifact, ArtifactData, ArtifactMetadata, ArtifactQuery};
pub use lineage::{
    Adjacency, Direction, EDGE_DERIVED_FROM, LineageEdge, LineageGraph, LineageNode, Neighbor,
    model_node_id, parent_models,
};

use crate::error::StoreError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    url TEXT NOT NULL,
    download_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(kind, url)
);
CREATE INDEX IF NOT EXISTS idx_artifacts_name ON artifacts(name);
CREATE TABLE IF NOT EXISTS lineage_edges (
    pk TEXT NOT NULL,
    sk TEXT NOT NULL,
    direction TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY(pk, sk)
);
";

/// Handle to the artifact database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    conn: Arc<Mutex<Connection>>,
}

impl ArtifactStore {
    /// Open (or create) the database at `path`. `:memory:` opens an in-process database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if path.as_os_str() == ":memory:" {
            return Self::in_memory();
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Task {
                message: format!("Failed to create {}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened artifact store");
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task {
            message: e.to_string(),
        })?
    }

    /// Delete every artifact and lineage edge.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM artifacts; DELETE FROM lineage_edges;")?;
            Ok(())
        })
        .await?;
        debug!("Artifact store reset");
        Ok(())
    }
}
