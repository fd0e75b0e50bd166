// Storage schema and database management

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StoreError;

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path
    pub db_path: String,

    /// Whether to enable WAL mode
    pub wal_enabled: bool,

    /// Cache size in pages
    pub cache_size_pages: Option<usize>,

    /// Fixed embedding dimensionality for the deployment.
    ///
    /// When set, writes carrying an embedding of a different length are
    /// rejected; mixing dimensionalities in one store is illegal.
    pub embedding_dimension: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "corpus.db".to_string(),
            wal_enabled: true,
            cache_size_pages: Some(10000),
            embedding_dimension: None,
        }
    }
}

/// Main storage interface owning a single SQLite connection.
///
/// Multi-connection access goes through [`crate::pool::StorePool`], which
/// opens one `Storage` per pooled connection against the same WAL database.
pub struct Storage {
    conn: Connection,
    config: StorageConfig,
}

impl Storage {
    /// Open storage with default config
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let config = StorageConfig {
            db_path: path.as_ref().display().to_string(),
            ..StorageConfig::default()
        };
        Self::open_with_config(config)
    }

    /// Open storage with custom config
    pub fn open_with_config(config: StorageConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(&config.db_path)?;

        // WAL mode allows concurrent readers alongside one writer
        if config.wal_enabled {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        if let Some(cache_size) = config.cache_size_pages {
            conn.pragma_update(None, "cache_size", cache_size)?;
        }

        let storage = Self { conn, config };
        storage.initialize_schema()?;

        Ok(storage)
    }

    /// Initialize database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS content_records (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                content_type TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS search_query_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_text TEXT NOT NULL,
                mode TEXT NOT NULL,
                results_found INTEGER NOT NULL,
                response_time_ms REAL NOT NULL,
                user_id TEXT,
                project_id TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS search_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_query TEXT NOT NULL,
                result_id TEXT NOT NULL,
                feedback_type TEXT NOT NULL,
                rating INTEGER,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Indexes for query performance
        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_content_type ON content_records(content_type)",
            "CREATE INDEX IF NOT EXISTS idx_content_created ON content_records(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_content_title ON content_records(title)",
            "CREATE INDEX IF NOT EXISTS idx_query_log_created ON search_query_log(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_query_log_user ON search_query_log(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_query_log_project ON search_query_log(project_id)",
            "CREATE INDEX IF NOT EXISTS idx_feedback_result ON search_feedback(result_id)",
        ];
        for index_sql in indexes {
            self.conn.execute(index_sql, [])?;
        }

        Ok(())
    }

    /// Insert or replace a content record, enforcing the configured
    /// embedding dimensionality.
    ///
    /// This is the sanctioned write path; writers that bypass it must pass
    /// the deployment dimension to [`crate::content::upsert_record`]
    /// themselves.
    pub fn upsert(&self, record: &crate::content::ContentRecord) -> Result<(), StoreError> {
        crate::content::upsert_record(&self.conn, record, self.config.embedding_dimension)
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the storage configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Checkpoint the WAL and release file locks.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.config.wal_enabled {
            self.conn.execute("PRAGMA wal_checkpoint(TRUNCATE)", [])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_storage_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path());
        assert!(storage.is_ok());
    }

    #[test]
    fn test_schema_initialization() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        let table_count: i64 = storage
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('content_records', 'search_query_log', 'search_feedback')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 3);
    }

    #[test]
    fn test_upsert_applies_configured_dimension() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = StorageConfig {
            db_path: temp_file.path().display().to_string(),
            embedding_dimension: Some(3),
            ..StorageConfig::default()
        };
        let storage = Storage::open_with_config(config).unwrap();

        let mut record = crate::content::ContentRecord {
            id: "adr-1".to_string(),
            title: "Use SQLite".to_string(),
            body: "body".to_string(),
            content_type: "decision-record".to_string(),
            tags: Vec::new(),
            metadata: serde_json::Map::new(),
            embedding: Some(vec![0.1, 0.2]),
            created_at: 1,
            updated_at: 1,
        };

        assert!(matches!(
            storage.upsert(&record),
            Err(StoreError::DimensionMismatch { expected: 3, got: 2 })
        ));

        record.embedding = Some(vec![0.1, 0.2, 0.3]);
        storage.upsert(&record).unwrap();
        assert!(crate::content::lookup_by_id(storage.conn(), "adr-1")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();
        {
            let storage = Storage::open(&path).unwrap();
            storage.close().unwrap();
        }
        // Re-opening runs initialize_schema again against existing tables
        let storage = Storage::open(&path);
        assert!(storage.is_ok());
    }
}
