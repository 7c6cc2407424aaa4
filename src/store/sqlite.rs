//! SQLite-backed chunked blob store.
//!
//! Two tables mirror the classic files/chunks split:
//!
//! ```text
//! report_files  (id, filename, folder, length, chunk_size, upload_ms)
//! report_chunks (files_id, n, data)        PRIMARY KEY (files_id, n)
//! ```
//!
//! SQLite calls are blocking, so every statement runs on the blocking pool
//! through an r2d2 connection. Reads fetch one chunk per poll, which gives
//! callers natural backpressure.

use super::{BlobStore, ByteStream};
use crate::artifact::{ArtifactId, ArtifactInfo, ArtifactStat, Folder};
use crate::error::ReportError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS report_files (
    id          TEXT PRIMARY KEY,
    filename    TEXT NOT NULL,
    folder      INTEGER NOT NULL CHECK (folder BETWEEN 1 AND 15),
    length      INTEGER NOT NULL,
    chunk_size  INTEGER NOT NULL,
    upload_ms   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_report_files_upload
    ON report_files(upload_ms DESC);
CREATE INDEX IF NOT EXISTS idx_report_files_folder
    ON report_files(folder, upload_ms DESC);
CREATE TABLE IF NOT EXISTS report_chunks (
    files_id    TEXT NOT NULL,
    n           INTEGER NOT NULL,
    data        BLOB NOT NULL,
    PRIMARY KEY (files_id, n)
);
";

/// Chunked blob store in a single SQLite database file.
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: SqlitePool,
    chunk_size: usize,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBlobStore")
            .field("path", &self.path)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl SqliteBlobStore {
    /// Open (creating if needed) the database at `path` and migrate the schema.
    ///
    /// Chunks left behind by a write that never committed are deleted here.
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();

        let pool = tokio::task::spawn_blocking(move || -> Result<SqlitePool, ReportError> {
            if let Some(parent) = open_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| ReportError::Store {
                        detail: format!("create {}: {e}", parent.display()),
                    })?;
                }
            }
            let manager = SqliteConnectionManager::file(&open_path).with_init(|c| {
                c.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
            });
            let pool = r2d2::Pool::builder().max_size(8).build(manager)?;
            let conn = pool.get()?;
            conn.execute_batch(SCHEMA)?;
            let orphans = conn.execute(
                "DELETE FROM report_chunks
                 WHERE files_id NOT IN (SELECT id FROM report_files)",
                [],
            )?;
            if orphans > 0 {
                warn!("Removed {} orphan chunks from an interrupted write", orphans);
            }
            Ok(pool)
        })
        .await
        .map_err(|e| ReportError::Internal(format!("store open task panicked: {e}")))??;

        info!("Blob store open: {} (chunk size {} bytes)", path.display(), chunk_size);
        Ok(Self {
            pool,
            chunk_size: chunk_size.max(1),
            path,
        })
    }

    async fn insert_chunk(&self, id: ArtifactId, n: u32, data: Bytes) -> Result<(), ReportError> {
        let key = id.to_string();
        with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO report_chunks (files_id, n, data) VALUES (?1, ?2, ?3)",
                params![key, n, &data[..]],
            )?;
            Ok(())
        })
        .await
    }

    async fn discard_chunks(&self, id: ArtifactId) {
        let key = id.to_string();
        let result = with_conn(&self.pool, move |conn| {
            conn.execute("DELETE FROM report_chunks WHERE files_id = ?1", params![key])?;
            Ok(())
        })
        .await;
        if let Err(e) = result {
            warn!("Could not discard chunks of failed write {}: {}", id, e);
        }
    }

    async fn stream_into_chunks(
        &self,
        id: ArtifactId,
        mut content: ByteStream,
    ) -> Result<(u64, u32), ReportError> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let mut n: u32 = 0;
        let mut length: u64 = 0;

        while let Some(piece) = content.next().await {
            let mut piece = piece?;
            length += piece.len() as u64;
            while !piece.is_empty() {
                let take = (self.chunk_size - buf.len()).min(piece.len());
                buf.extend_from_slice(&piece.split_to(take));
                if buf.len() == self.chunk_size {
                    self.insert_chunk(id, n, buf.split().freeze()).await?;
                    n += 1;
                }
            }
        }
        if !buf.is_empty() {
            self.insert_chunk(id, n, buf.freeze()).await?;
            n += 1;
        }
        Ok((length, n))
    }
}

/// Run `f` against a pooled connection on the blocking thread pool.
async fn with_conn<T, F>(pool: &SqlitePool, f: F) -> Result<T, ReportError>
where
    F: FnOnce(&mut Connection) -> Result<T, ReportError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ReportError::Internal(format!("store task panicked: {e}")))?
}

async fn fetch_chunk(pool: &SqlitePool, id: ArtifactId, n: u32) -> Result<Bytes, ReportError> {
    let key = id.to_string();
    let data: Option<Vec<u8>> = with_conn(pool, move |conn| {
        Ok(conn
            .query_row(
                "SELECT data FROM report_chunks WHERE files_id = ?1 AND n = ?2",
                params![key, n],
                |row| row.get(0),
            )
            .optional()?)
    })
    .await?;
    data.map(Bytes::from)
        .ok_or_else(|| ReportError::store(format!("chunk {n} of {id} is missing")))
}

/// Raw `report_files` row before validation.
struct FileRow {
    id: String,
    filename: String,
    folder: i64,
    upload_ms: i64,
    length: i64,
    chunk_size: i64,
}

impl FileRow {
    const COLUMNS: &'static str = "id, filename, folder, upload_ms, length, chunk_size";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            filename: row.get(1)?,
            folder: row.get(2)?,
            upload_ms: row.get(3)?,
            length: row.get(4)?,
            chunk_size: row.get(5)?,
        })
    }

    fn into_info(self) -> Result<ArtifactInfo, ReportError> {
        let id: ArtifactId = self
            .id
            .parse()
            .map_err(|_| ReportError::store(format!("corrupt id '{}'", self.id)))?;
        let folder = Folder::new(self.folder)
            .ok_or_else(|| ReportError::store(format!("corrupt folder {} on {}", self.folder, id)))?;
        let upload_date = DateTime::<Utc>::from_timestamp_millis(self.upload_ms)
            .ok_or_else(|| ReportError::store(format!("corrupt timestamp on {}", id)))?;
        Ok(ArtifactInfo {
            id,
            filename: self.filename,
            folder,
            upload_date,
        })
    }

    fn into_stat(self) -> Result<ArtifactStat, ReportError> {
        let length = self.length.max(0) as u64;
        let chunk_size = self.chunk_size.max(1) as usize;
        Ok(ArtifactStat {
            info: self.into_info()?,
            length,
            chunk_size,
        })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn write(
        &self,
        filename: &str,
        folder: Folder,
        content: ByteStream,
    ) -> Result<ArtifactId, ReportError> {
        let start = Instant::now();
        let id = ArtifactId::generate();

        let (length, chunks) = match self.stream_into_chunks(id, content).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Write of {} aborted: {}", id, e);
                self.discard_chunks(id).await;
                return Err(e);
            }
        };

        let key = id.to_string();
        let name = filename.to_string();
        let chunk_size = self.chunk_size as i64;
        let upload_ms = Utc::now().timestamp_millis();
        let committed = with_conn(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO report_files (id, filename, folder, length, chunk_size, upload_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![key, name, folder.get(), length as i64, chunk_size, upload_ms],
            )?;
            Ok(())
        })
        .await;
        if let Err(e) = committed {
            warn!("Metadata commit for {} failed: {}", id, e);
            self.discard_chunks(id).await;
            return Err(e);
        }

        info!(
            "Stored {} ({} bytes, {} chunks, folder {}) in {}ms",
            id,
            length,
            chunks,
            folder,
            start.elapsed().as_millis()
        );
        Ok(id)
    }

    async fn list(&self, folder: Option<Folder>) -> Result<Vec<ArtifactInfo>, ReportError> {
        let filter = folder.map(|f| f.get() as i64);
        let rows = with_conn(&self.pool, move |conn| {
            let sql = format!(
                "SELECT {} FROM report_files
                 WHERE (?1 IS NULL OR folder = ?1)
                 ORDER BY upload_ms DESC, id DESC",
                FileRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![filter], FileRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?;

        debug!("Listed {} reports (folder filter {:?})", rows.len(), filter);
        rows.into_iter().map(FileRow::into_info).collect()
    }

    async fn stat(&self, id: &ArtifactId) -> Result<ArtifactStat, ReportError> {
        let key = id.to_string();
        let row = with_conn(&self.pool, move |conn| {
            let sql = format!("SELECT {} FROM report_files WHERE id = ?1", FileRow::COLUMNS);
            Ok(conn
                .query_row(&sql, params![key], FileRow::from_row)
                .optional()?)
        })
        .await?;

        row.ok_or_else(|| ReportError::NotFound { id: id.to_string() })?
            .into_stat()
    }

    async fn read(&self, id: &ArtifactId) -> Result<ByteStream, ReportError> {
        let stat = self.stat(id).await?;
        let total = stat.length.div_ceil(stat.chunk_size as u64) as u32;
        let pool = self.pool.clone();
        let id = *id;
        debug!("Opening {} ({} chunks)", id, total);

        let chunks = stream::try_unfold(0u32, move |n| {
            let pool = pool.clone();
            async move {
                if n >= total {
                    return Ok(None);
                }
                fetch_chunk(&pool, id, n).await.map(|data| Some((data, n + 1)))
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn delete(&self, id: &ArtifactId) -> Result<(), ReportError> {
        let key = id.to_string();
        let removed = with_conn(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let files = tx.execute("DELETE FROM report_files WHERE id = ?1", params![key])?;
            let chunks = tx.execute("DELETE FROM report_chunks WHERE files_id = ?1", params![key])?;
            tx.commit()?;
            Ok((files, chunks))
        })
        .await?;

        match removed {
            (0, _) => Err(ReportError::NotFound { id: id.to_string() }),
            (_, chunks) => {
                info!("Deleted {} ({} chunks)", id, chunks);
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), ReportError> {
        with_conn(&self.pool, |conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;
        info!("Blob store closed: {}", self.path.display());
        Ok(())
    }
}
