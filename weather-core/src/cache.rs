//! Snapshot cache: one row per location, at most one flagged as the current
//! location.
//!
//! Observers subscribe through [`CacheStore::read_current`]. Every mutation
//! re-reads the flagged row after committing and publishes it when it changed,
//! so readers never depend on the write call path.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tokio::sync::watch;

use crate::{error::StorageError, model::WeatherSnapshot};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Subscribe to the current-location row. The receiver starts with the
    /// present value (or `None`) and sees every later change.
    fn read_current(&self) -> watch::Receiver<Option<WeatherSnapshot>>;

    async fn read_by_key(&self, location_key: &str) -> Result<Option<WeatherSnapshot>, StorageError>;

    /// Insert or fully replace the row with the same `location_key`.
    async fn write(&self, snapshot: &WeatherSnapshot) -> Result<(), StorageError>;

    /// Unflag whichever row holds the current-location flag. No-op if none does.
    async fn clear_current_flag(&self) -> Result<(), StorageError>;

    /// Remove rows with `fetched_at_millis < epoch_millis`. Returns the number removed.
    async fn delete_older_than(&self, epoch_millis: i64) -> Result<usize, StorageError>;

    async fn delete(&self, location_key: &str) -> Result<(), StorageError>;

    async fn count(&self) -> Result<usize, StorageError>;
}

const SNAPSHOT_COLUMNS: &str = "location_key, fetched_at_millis, payload, is_current_location";

/// SQLite-backed [`CacheStore`].
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    current_tx: watch::Sender<Option<WeatherSnapshot>>,
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore").finish_non_exhaustive()
    }
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!(path = %path.display(), "Opening weather cache");
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory cache.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        init_schema(&conn)?;
        let current = query_current(&conn)?;
        let (current_tx, _) = watch::channel(current);
        Ok(Self { conn: Mutex::new(conn), current_tx })
    }

    /// Runs `op` under the connection lock, then publishes the current row.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.conn.lock();
        let out = op(&mut conn)?;
        // Already committed; a failed re-read is logged, not returned.
        let current = match query_current(&conn) {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "Could not re-read current-location snapshot");
                return Ok(out);
            }
        };
        drop(conn);

        self.current_tx.send_if_modified(|slot| {
            if *slot == current {
                false
            } else {
                tracing::debug!(
                    location = current.as_ref().map(|s| s.location_key.as_str()),
                    "Current-location snapshot changed"
                );
                *slot = current;
                true
            }
        });
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS weather_snapshots (
            location_key TEXT PRIMARY KEY,
            fetched_at_millis INTEGER NOT NULL,
            payload TEXT NOT NULL,
            is_current_location INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_fetched_at
            ON weather_snapshots(fetched_at_millis);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_single_current
            ON weather_snapshots(is_current_location) WHERE is_current_location = 1;
        "#,
    )?;
    Ok(())
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<WeatherSnapshot> {
    Ok(WeatherSnapshot {
        location_key: row.get(0)?,
        fetched_at_millis: row.get(1)?,
        payload: row.get(2)?,
        is_current_location: row.get(3)?,
    })
}

fn query_current(conn: &Connection) -> Result<Option<WeatherSnapshot>, StorageError> {
    let sql =
        format!("SELECT {SNAPSHOT_COLUMNS} FROM weather_snapshots WHERE is_current_location = 1 LIMIT 1");
    Ok(conn.query_row(&sql, [], row_to_snapshot).optional()?)
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn read_current(&self) -> watch::Receiver<Option<WeatherSnapshot>> {
        let mut rx = self.current_tx.subscribe();
        // Mark the present value unseen so the first `changed()` yields it.
        rx.mark_changed();
        rx
    }

    async fn read_by_key(&self, location_key: &str) -> Result<Option<WeatherSnapshot>, StorageError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM weather_snapshots WHERE location_key = ?1");
        Ok(conn.query_row(&sql, params![location_key], row_to_snapshot).optional()?)
    }

    async fn write(&self, snapshot: &WeatherSnapshot) -> Result<(), StorageError> {
        self.mutate(|conn| {
            let tx = conn.transaction()?;
            if snapshot.is_current_location {
                tx.execute(
                    "UPDATE weather_snapshots SET is_current_location = 0 \
                     WHERE is_current_location = 1 AND location_key <> ?1",
                    params![snapshot.location_key],
                )?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO weather_snapshots \
                 (location_key, fetched_at_millis, payload, is_current_location) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    snapshot.location_key,
                    snapshot.fetched_at_millis,
                    snapshot.payload,
                    snapshot.is_current_location,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn clear_current_flag(&self) -> Result<(), StorageError> {
        self.mutate(|conn| {
            conn.execute(
                "UPDATE weather_snapshots SET is_current_location = 0 WHERE is_current_location = 1",
                [],
            )?;
            Ok(())
        })
    }

    async fn delete_older_than(&self, epoch_millis: i64) -> Result<usize, StorageError> {
        self.mutate(|conn| {
            Ok(conn.execute(
                "DELETE FROM weather_snapshots WHERE fetched_at_millis < ?1",
                params![epoch_millis],
            )?)
        })
    }

    async fn delete(&self, location_key: &str) -> Result<(), StorageError> {
        self.mutate(|conn| {
            conn.execute(
                "DELETE FROM weather_snapshots WHERE location_key = ?1",
                params![location_key],
            )?;
            Ok(())
        })
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM weather_snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}
