// fieldforge-store/src/store.rs
// ============================================================================
// Module: SQLite Object Store
// Description: Durable key/value backend for the Storage capability.
// Purpose: Implement fieldforge_core::interfaces::Storage over SQLite WAL.
// Dependencies: fieldforge-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A flat `objects(key, value, updated_at)` table behind a mutex-guarded
//! connection, opened with WAL journaling, full synchronous durability,
//! foreign keys on, and a bounded busy timeout. Writes are full replacements
//! (`INSERT OR REPLACE`): `write_object` always replaces any prior value at
//! a key. There is no versioned history at this layer; immutable-history
//! artifacts (`output/.../published/...`) are themselves just object keys
//! the runner never overwrites, not a store-level feature.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fieldforge_core::interfaces::Storage;
use fieldforge_core::interfaces::StorageError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the object store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms) before a locked connection gives up.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum total path length accepted for the database file itself.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite`-backed object store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStorageConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` object store errors.
#[derive(Debug, Error)]
pub enum SqliteStorageError {
    /// Store I/O error (path validation, directory creation).
    #[error("object store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("object store db error: {0}")]
    Db(String),
    /// Invalid store configuration or path.
    #[error("object store invalid: {0}")]
    Invalid(String),
}

impl From<SqliteStorageError> for StorageError {
    fn from(error: SqliteStorageError) -> Self {
        match error {
            SqliteStorageError::Io(message) | SqliteStorageError::Invalid(message) => {
                Self::Backend(message)
            }
            SqliteStorageError::Db(message) => Self::Backend(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`Storage`].
#[derive(Clone)]
pub struct SqliteStorage {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens a `SQLite`-backed object store at `config.path`, creating
    /// parent directories and the schema if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStorageError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStorageConfig) -> Result<Self, SqliteStorageError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Opens an in-memory object store, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStorageError`] when the in-memory database cannot be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, SqliteStorageError> {
        let mut connection =
            Connection::open_in_memory().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }
}

impl Storage for SqliteStorage {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let guard = lock(&self.connection)?;
        let value: Option<Vec<u8>> = guard
            .query_row("SELECT value FROM objects WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        value.ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn read_text(&self, key: &str) -> Result<String, StorageError> {
        let bytes = self.read_object(key)?;
        String::from_utf8(bytes)
            .map_err(|err| StorageError::Backend(format!("object {key} is not valid utf-8: {err}")))
    }

    fn read_json_or_null(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        match self.read_object(key) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| StorageError::Backend(format!("object {key} is not valid json: {err}"))),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn write_object(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let guard = lock(&self.connection)?;
        let updated_at = unix_timestamp();
        guard
            .execute(
                "INSERT INTO objects (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, bytes, updated_at],
            )
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = lock(&self.connection)?;
        let like_pattern = escape_like(prefix);
        let mut statement = guard
            .prepare("SELECT key FROM objects WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key ASC")
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        let rows = statement
            .query_map(params![like_pattern], |row| row.get::<_, String>(0))
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|err| StorageError::Backend(err.to_string()))?);
        }
        Ok(keys)
    }
}

/// Locks the connection, translating mutex poisoning into a backend error.
fn lock(
    connection: &Arc<Mutex<Connection>>,
) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    connection.lock().map_err(|_| StorageError::Backend("object store mutex poisoned".to_string()))
}

/// Escapes `%`, `_`, and `\` in `prefix` for use in a `LIKE ... ESCAPE '\'` clause.
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Seconds since the Unix epoch, clamped to zero on clock error.
fn unix_timestamp() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_secs()).unwrap_or(0) as i64
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStorageError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStorageError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStorageError::Io(err.to_string()))
}

/// Validates the store path against length limits and directory collisions.
fn validate_store_path(path: &Path) -> Result<(), SqliteStorageError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStorageError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStorageError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens a `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStorageConfig) -> Result<Connection, SqliteStorageError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStorageConfig,
) -> Result<(), SqliteStorageError> {
    connection
        .execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA synchronous = FULL;")
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema, creating the `objects` table if absent.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStorageError> {
    let tx = connection.transaction().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    if version.is_none() {
        tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
            .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
             );",
        )
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    }
    tx.commit().map_err(|err| SqliteStorageError::Db(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::SqliteStorage;
    use fieldforge_core::interfaces::Storage;
    use fieldforge_core::interfaces::StorageError;

    #[test]
    fn write_then_read_round_trips() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        store.write_object("specs/inputs/mouse/products/a.json", b"{\"ok\":true}").expect("write");
        let bytes = store.read_object("specs/inputs/mouse/products/a.json").expect("read");
        assert_eq!(bytes, b"{\"ok\":true}");
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        let error = store.read_object("does/not/exist").expect_err("should be missing");
        assert!(matches!(error, StorageError::NotFound(_)));
    }

    #[test]
    fn read_json_or_null_distinguishes_absent_from_present() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        assert_eq!(store.read_json_or_null("absent").expect("no error"), None);
        store.write_object("present", b"{\"a\":1}").expect("write");
        let value = store.read_json_or_null("present").expect("read").expect("present");
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn write_object_replaces_prior_value() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        store.write_object("k", b"first").expect("write first");
        store.write_object("k", b"second").expect("write second");
        assert_eq!(store.read_object("k").expect("read"), b"second");
    }

    #[test]
    fn list_keys_filters_by_prefix_and_sorts() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        store.write_object("specs/outputs/mouse/a/latest/normalized.json", b"{}").expect("write a");
        store.write_object("specs/outputs/mouse/b/latest/normalized.json", b"{}").expect("write b");
        store.write_object("specs/inputs/mouse/products/a.json", b"{}").expect("write input");
        let keys = store.list_keys("specs/outputs/mouse/").expect("list");
        assert_eq!(
            keys,
            vec![
                "specs/outputs/mouse/a/latest/normalized.json".to_string(),
                "specs/outputs/mouse/b/latest/normalized.json".to_string(),
            ]
        );
    }

    #[test]
    fn list_keys_escapes_like_wildcards_in_prefix() {
        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        store.write_object("specs/a_b/x.json", b"{}").expect("write underscore key");
        store.write_object("specs/aXb/x.json", b"{}").expect("write lookalike key");
        let keys = store.list_keys("specs/a_b/").expect("list");
        assert_eq!(keys, vec!["specs/a_b/x.json".to_string()]);
    }

    #[test]
    fn resolve_input_and_output_keys_follow_the_documented_layout() {
        use fieldforge_core::model::identifiers::Category;
        use fieldforge_core::model::identifiers::ProductId;

        let store = SqliteStorage::open_in_memory().expect("open in-memory store");
        let category = Category::new("mouse");
        let product_id = ProductId::new("mouse-logitech-g-pro-x-superlight".to_string());
        assert_eq!(
            store.resolve_input_key(&category, &product_id),
            "specs/inputs/mouse/products/mouse-logitech-g-pro-x-superlight.json"
        );
        assert_eq!(
            store.resolve_output_key(&category, &product_id, "normalized.json"),
            "specs/outputs/mouse/mouse-logitech-g-pro-x-superlight/latest/normalized.json"
        );
    }
}
