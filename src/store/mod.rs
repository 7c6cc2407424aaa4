//! Chunked blob storage for rendered reports.
//!
//! Payloads are split into fixed-size chunks on write and streamed back one
//! chunk at a time on read, so neither direction holds a whole PDF in memory
//! inside the store. Each object carries its `{folder}` metadata, a
//! store-generated [`ArtifactId`], and an upload timestamp.
//!
//! ## Visibility
//!
//! Chunks are written first and the metadata row last, GridFS-style. An
//! object becomes listable and readable only once its metadata row commits,
//! so a write that fails part-way leaves nothing visible; its orphan chunks
//! are removed immediately, or at the next [`sqlite::SqliteBlobStore::open`]
//! if the process died.

pub mod sqlite;

use crate::artifact::{ArtifactId, ArtifactInfo, ArtifactStat, Folder};
use crate::error::ReportError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::pin::Pin;
use tokio_stream::Stream;

pub use sqlite::SqliteBlobStore;

/// A boxed stream of payload bytes, in order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ReportError>> + Send>>;

/// Storage operations used by the report service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under a fresh id. The object is visible to
    /// [`list`](Self::list) and [`read`](Self::read) as soon as this returns
    /// `Ok`, and not at all if it returns `Err`.
    async fn write(
        &self,
        filename: &str,
        folder: Folder,
        content: ByteStream,
    ) -> Result<ArtifactId, ReportError>;

    /// All objects, optionally restricted to one folder, newest first.
    async fn list(&self, folder: Option<Folder>) -> Result<Vec<ArtifactInfo>, ReportError>;

    /// Metadata for one object, or [`ReportError::NotFound`].
    async fn stat(&self, id: &ArtifactId) -> Result<ArtifactStat, ReportError>;

    /// Open a lazy stream over an object's chunks, or [`ReportError::NotFound`].
    async fn read(&self, id: &ArtifactId) -> Result<ByteStream, ReportError>;

    /// Remove an object and its chunks. A second delete of the same id is
    /// [`ReportError::NotFound`].
    async fn delete(&self, id: &ArtifactId) -> Result<(), ReportError>;

    /// Flush and release storage resources.
    async fn close(&self) -> Result<(), ReportError>;
}

/// Wrap an in-memory buffer as a single-item [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn collect_bytes(stream: ByteStream) -> Result<Vec<u8>, ReportError> {
    stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
}

/// Split `data` into `chunk_size` pieces, streamed one per item.
pub fn chunked_stream(data: Vec<u8>, chunk_size: usize) -> ByteStream {
    let chunks: Vec<Result<Bytes, ReportError>> = data
        .chunks(chunk_size.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks).boxed()
}
