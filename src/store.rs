use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;
use crate::models::{normalize, Application, StoredApplication};

pub const APPLICATIONS_KEY: &str = "applications";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS storage (
    area TEXT NOT NULL CHECK (area IN ('sync', 'local')),
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (area, key)
);
"#;

/// Named groups of slots. `Sync` holds shared data, `Local` per-surface preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    pub const ALL: [StorageArea; 2] = [StorageArea::Sync, StorageArea::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store shared by every process that opens the same file.
/// Values are whole JSON documents; there are no partial updates.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobsync") {
            proj_dirs.data_dir().join("jobsync.db")
        } else {
            PathBuf::from("jobsync.db")
        }
    }

    /// Create the schema and instance id. `force` wipes all slots and
    /// rotates the instance id, which invalidates pages loaded earlier.
    pub fn init(&self, force: bool) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        if force {
            self.conn
                .execute_batch("DELETE FROM storage; DELETE FROM meta WHERE key = 'instance_id';")?;
        }
        let instance_id = format!("{:016x}", rand::thread_rng().r#gen::<u64>());
        self.conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('instance_id', ?1)",
            [instance_id],
        )?;
        Ok(())
    }

    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('storage', 'meta')",
            [],
            |row| row.get(0),
        )?;
        Ok(tables == 2)
    }

    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(StoreError::NotInitialized(self.path.clone()))
        }
    }

    pub fn instance_id(&self) -> Result<Option<String>, StoreError> {
        self.ensure_initialized()?;
        let id = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'instance_id'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Changes whenever another connection commits to the file.
    pub fn data_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?)
    }

    pub fn get(&self, area: StorageArea, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM storage WHERE area = ?1 AND key = ?2",
                params![area.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn get_area(&self, area: StorageArea) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM storage WHERE area = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map([area.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, text)| -> Result<(String, Value), StoreError> {
                Ok((key, serde_json::from_str(&text)?))
            })
            .collect()
    }

    pub fn set(&self, area: StorageArea, key: &str, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO storage (area, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(area, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = datetime('now')",
            params![area.as_str(), key, text],
        )?;
        tracing::debug!(area = %area, key, bytes = text.len(), "slot written");
        Ok(())
    }

    pub fn remove(&self, area: StorageArea, key: &str) -> Result<bool, StoreError> {
        let n = self.conn.execute(
            "DELETE FROM storage WHERE area = ?1 AND key = ?2",
            params![area.as_str(), key],
        )?;
        Ok(n > 0)
    }
}

/// The application list, read and written only as a whole.
///
/// Every mutation is get-all, modify, replace-all. Two writers doing that
/// concurrently race and the last write wins.
pub trait ApplicationStore {
    fn get_all(&self) -> Result<Vec<Application>, StoreError>;
    fn replace_all(&self, apps: &[Application]) -> Result<(), StoreError>;
}

/// [`ApplicationStore`] kept in the `sync` area under [`APPLICATIONS_KEY`].
pub struct ApplicationRepository<'a> {
    store: &'a Store,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl ApplicationStore for ApplicationRepository<'_> {
    fn get_all(&self) -> Result<Vec<Application>, StoreError> {
        match self.store.get(StorageArea::Sync, APPLICATIONS_KEY)? {
            None => Ok(Vec::new()),
            Some(value) => Ok(decode_applications(value)?),
        }
    }

    fn replace_all(&self, apps: &[Application]) -> Result<(), StoreError> {
        let value = serde_json::to_value(apps)?;
        self.store.set(StorageArea::Sync, APPLICATIONS_KEY, &value)?;
        tracing::info!(count = apps.len(), "application list replaced");
        Ok(())
    }
}

/// Decode a stored list, coercing records written by older clients.
pub fn decode_applications(value: Value) -> Result<Vec<Application>, serde_json::Error> {
    let records: Vec<StoredApplication> = match value {
        Value::Null => Vec::new(),
        other => serde_json::from_value(other)?,
    };
    Ok(normalize(records, Utc::now()))
}
