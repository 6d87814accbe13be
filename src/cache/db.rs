// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Snapshots older than this are dropped by [`CacheDb::cleanup_stale`]
const SNAPSHOT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Handle to the snapshot database for one viewer
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
}

impl CacheDb {
    /// Open or create the database for a viewer.
    /// Path: ~/.local/share/tapgol/{viewer_id}/cache.db
    pub fn open(viewer_id: &str) -> Result<Self, CacheError> {
        let path = Self::cache_path(viewer_id)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(&path)?;
        Self::migrate(&conn)?;
        tracing::debug!(path = %path.display(), "opened snapshot cache");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), CacheError> {
        // All CREATE IF NOT EXISTS
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn cache_path(viewer_id: &str) -> Result<PathBuf, CacheError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacheError::Path("could not find data directory".to_string()))?;

        // Viewer ids are opaque; keep them to one path segment
        let safe_id: String = viewer_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if safe_id.is_empty() {
            return Err(CacheError::Path("empty viewer id".to_string()));
        }

        Ok(data_dir.join("tapgol").join(safe_id).join("cache.db"))
    }

    /// Access connection for operations
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("cache lock poisoned")
    }

    /// Current unix timestamp
    pub fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Drop snapshot rows older than 24 hours. Returns the number removed.
    pub fn cleanup_stale(&self) -> Result<usize, CacheError> {
        self.cleanup_older_than(Self::now() - SNAPSHOT_MAX_AGE_SECS)
    }

    pub(crate) fn cleanup_older_than(&self, cutoff: i64) -> Result<usize, CacheError> {
        let removed = self
            .conn()
            .execute("DELETE FROM feed_snapshot WHERE fetched_at < ?", [cutoff])?;
        if removed > 0 {
            tracing::debug!(removed, "dropped stale snapshot rows");
        }
        Ok(removed)
    }
}
