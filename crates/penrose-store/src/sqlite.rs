//! SQLite result store backend.
//!
//! Documents are stored as JSON text in three containers, each carrying the
//! partition key of the job they belong to:
//!
//! - `jobs`: one document per job, indexed by source id and status
//! - `sources`: one document per result row, ordered by row index
//! - `constellations`: user-drawn figures over a job's stars
//!
//! The schema is provisioned lazily and exactly once, on the first operation,
//! behind a `tokio::sync::OnceCell`. All SQL runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use tokio::sync::OnceCell;
use tokio::task;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::{Constellation, Job, JobFilter, JobId, PartitionKey, StarRecord};
use crate::{ResultStore, validate_chunk};

/// SQLite result store.
#[derive(Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
    provisioned: Arc<OnceCell<()>>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    ///
    /// No schema work happens here; tables are created on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(conn)),
            provisioned: Arc::new(OnceCell::new()),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                partition_key TEXT NOT NULL,
                source_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                partition_key TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS constellations (
                id TEXT PRIMARY KEY,
                partition_key TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_sources_partition ON sources(partition_key, row_index);
            CREATE INDEX IF NOT EXISTS idx_constellations_partition ON constellations(partition_key);",
        )?;
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool, provisioning the
    /// schema first if this is the first call.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        self.provisioned
            .get_or_try_init(|| {
                let conn = self.connection.clone();
                async move {
                    task::spawn_blocking(move || {
                        let conn = conn
                            .lock()
                            .map_err(|_| StoreError::Storage("database lock poisoned".into()))?;
                        Self::init_schema(&conn)?;
                        debug!("Provisioned SQLite result store schema");
                        Ok::<(), StoreError>(())
                    })
                    .await
                    .map_err(|e| StoreError::Storage(format!("task join error: {}", e)))?
                }
            })
            .await?;

        let conn = self.connection.clone();
        task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Storage("database lock poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Storage(format!("task join error: {}", e)))?
    }
}

/// Map a uniqueness violation to [`StoreError::Conflict`].
fn conflict_or(err: rusqlite::Error, what: String) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(what)
        }
        _ => StoreError::from(err),
    }
}

fn decode<T: serde::de::DeserializeOwned>(documents: Vec<String>) -> Result<Vec<T>> {
    documents
        .iter()
        .map(|doc| serde_json::from_str(doc).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn get_job(&self, source_id: &str) -> Result<Option<Job>> {
        let source_id = source_id.to_string();

        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM jobs WHERE source_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![source_id],
                    |row| row.get(0),
                )
                .optional()?;

            document
                .map(|doc| serde_json::from_str(&doc).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn get_job_by_id(&self, job_id: &JobId) -> Result<Option<Job>> {
        let job_id = job_id.to_string();

        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM jobs WHERE id = ?1",
                    params![job_id],
                    |row| row.get(0),
                )
                .optional()?;

            document
                .map(|doc| serde_json::from_str(&doc).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let filter = filter.clone();

        self.with_conn(move |conn| {
            let mut query = String::from("SELECT document FROM jobs");
            let statuses: Vec<&'static str> = filter.statuses.iter().map(|s| s.as_str()).collect();

            if !statuses.is_empty() {
                let placeholders = vec!["?"; statuses.len()].join(", ");
                query.push_str(&format!(" WHERE status IN ({placeholders})"));
            }
            query.push_str(" ORDER BY created_at ASC, id ASC");
            if let Some(limit) = filter.limit {
                query.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = conn.prepare(&query)?;
            let documents = stmt
                .query_map(params_from_iter(statuses), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            decode(documents)
        })
        .await
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let job = job.clone();

        self.with_conn(move |conn| {
            let document = serde_json::to_string(&job)?;
            conn.execute(
                "INSERT INTO jobs (id, partition_key, source_id, status, created_at, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.id.to_string(),
                    job.partition_key().as_str(),
                    job.source_id,
                    job.status.as_str(),
                    job.created_at.timestamp_micros(),
                    document,
                ],
            )
            .map_err(|e| conflict_or(e, format!("job {} already exists", job.id)))?;
            Ok(())
        })
        .await
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let job = job.clone();

        self.with_conn(move |conn| {
            let document = serde_json::to_string(&job)?;
            let changed = conn.execute(
                "INSERT OR REPLACE INTO jobs (id, partition_key, source_id, status, created_at, document)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.id.to_string(),
                    job.partition_key().as_str(),
                    job.source_id,
                    job.status.as_str(),
                    job.created_at.timestamp_micros(),
                    document,
                ],
            )?;

            if changed == 0 {
                return Err(StoreError::Storage(format!(
                    "upsert of job {} was not acknowledged",
                    job.id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn insert_result_chunk(
        &self,
        partition: &PartitionKey,
        records: &[StarRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_chunk(partition, records)?;

        let partition = partition.clone();
        let records = records.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR REPLACE INTO sources (id, partition_key, row_index, document)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for record in &records {
                    let document = serde_json::to_string(record)?;
                    stmt.execute(params![
                        record.id,
                        partition.as_str(),
                        record.index as i64,
                        document,
                    ])?;
                }
            }
            // Dropping an uncommitted transaction rolls it back.
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn count_results(&self, job_id: &JobId) -> Result<usize> {
        let partition = job_id.partition_key();

        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sources WHERE partition_key = ?1",
                params![partition.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn list_results(
        &self,
        job_id: &JobId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StarRecord>> {
        let partition = job_id.partition_key();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document FROM sources WHERE partition_key = ?1
                 ORDER BY row_index ASC LIMIT ?2 OFFSET ?3",
            )?;
            let documents = stmt
                .query_map(
                    params![partition.as_str(), limit as i64, offset as i64],
                    |row| row.get::<_, String>(0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            decode(documents)
        })
        .await
    }

    async fn create_constellation(&self, constellation: &Constellation) -> Result<()> {
        let constellation = constellation.clone();

        self.with_conn(move |conn| {
            let job_exists = conn
                .query_row(
                    "SELECT 1 FROM jobs WHERE id = ?1",
                    params![constellation.job_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !job_exists {
                return Err(StoreError::JobNotFound(constellation.job_id.to_string()));
            }

            let document = serde_json::to_string(&constellation)?;
            conn.execute(
                "INSERT INTO constellations (id, partition_key, document) VALUES (?1, ?2, ?3)",
                params![
                    constellation.id.to_string(),
                    constellation.partition_key().as_str(),
                    document,
                ],
            )
            .map_err(|e| {
                conflict_or(
                    e,
                    format!("constellation {} already exists", constellation.id),
                )
            })?;
            Ok(())
        })
        .await
    }

    async fn list_constellations(&self, job_id: &JobId) -> Result<Vec<Constellation>> {
        let partition = job_id.partition_key();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document FROM constellations WHERE partition_key = ?1 ORDER BY rowid",
            )?;
            let documents = stmt
                .query_map(params![partition.as_str()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            decode(documents)
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
