//! Object store seam.
//!
//! The worker only needs three primitives from a bucket: read an object as a
//! byte stream, write one through a sequential sink, and delete one. Anything
//! implementing [`ObjectStore`] can back a job; [`s3::StorageService`] is the
//! production implementation.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

pub mod error;
pub mod s3;

pub use error::{StorageError, StorageResult};

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Result of a delete request that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Sequential, append-only destination for one remote object.
///
/// Bytes land in the order they were appended. `close` is called exactly
/// once, after the final append, and publishes the object.
#[async_trait]
pub trait OutputSink: Send {
    async fn append(&mut self, chunk: Bytes) -> StorageResult<()>;

    /// Finishes the upload and returns the number of bytes published.
    async fn close(self: Box<Self>) -> StorageResult<u64>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader>;

    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn OutputSink>>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<DeleteOutcome>;
}
